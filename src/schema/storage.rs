//! Schema snapshot storage
//!
//! Single-slot storage for the last-applied schema and its content hash,
//! kept in the database itself. The table bootstraps itself on first
//! access; every write replaces whatever was there (no history).
//!
//! Reads and writes are not guarded against a second process syncing
//! concurrently; the boot sequence is expected to serialize them.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::connection::DatabaseConnection;
use crate::db::dialect::SchemaDialect;
use crate::error::{Error, Result};
use crate::schema::types::{Schema, Table};

/// Name of the snapshot storage table
pub const SCHEMA_TABLE: &str = "strapi_database_schema";

/// Serialization contract version for stored snapshots
const DOCUMENT_VERSION: u32 = 1;

// Stable serialization envelope so older snapshots stay parseable.
#[derive(Serialize)]
struct SchemaDocumentRef<'a> {
    version: u32,
    tables: &'a [Table],
}

#[derive(Deserialize)]
struct SchemaDocument {
    version: u32,
    tables: Vec<Table>,
}

#[derive(FromRow)]
struct SchemaRow {
    schema: Option<String>,
    time: NaiveDateTime,
    hash: String,
}

/// The most recent snapshot read back from storage
#[derive(Debug, Clone)]
pub struct StoredSchema {
    pub time: NaiveDateTime,
    pub hash: String,
    pub schema: Schema,
}

/// Snapshot storage over the schema table
pub struct SchemaStorage {
    connection: DatabaseConnection,
    dialect: Arc<dyn SchemaDialect>,
}

impl SchemaStorage {
    /// Create storage over the given connection
    pub fn new(connection: DatabaseConnection, dialect: Arc<dyn SchemaDialect>) -> Self {
        Self {
            connection,
            dialect,
        }
    }

    /// Deterministic content hash of a schema. Fast equality checks
    /// only, nothing security-relevant.
    pub fn hash_schema(schema: &Schema) -> String {
        let serialized = serialize_schema(schema);
        format!("{:x}", md5::compute(serialized))
    }

    /// Read the most recent snapshot, `None` when the table is empty
    pub async fn read(&self) -> Result<Option<StoredSchema>> {
        self.ensure_table().await?;

        let sql = format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {} DESC LIMIT 1",
            self.dialect.quote("schema"),
            self.dialect.quote("time"),
            self.dialect.quote("hash"),
            self.dialect.quote(SCHEMA_TABLE),
            self.dialect.quote("time"),
        );

        let row: Option<SchemaRow> = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query_as(&sql).fetch_optional(pool).await?
            }
            DatabaseConnection::MySql(pool) => sqlx::query_as(&sql).fetch_optional(pool).await?,
            DatabaseConnection::Sqlite(pool) => sqlx::query_as(&sql).fetch_optional(pool).await?,
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let raw = row.schema.ok_or_else(|| {
            Error::StorageError("Stored schema row has no schema payload".to_string())
        })?;

        let document: SchemaDocument = serde_json::from_str(&raw)?;
        if document.version != DOCUMENT_VERSION {
            return Err(Error::StorageError(format!(
                "Unsupported stored schema version {}",
                document.version
            )));
        }

        Ok(Some(StoredSchema {
            time: row.time,
            hash: row.hash,
            schema: Schema {
                tables: document.tables,
            },
        }))
    }

    /// Replace the stored snapshot with this schema. Deletes any
    /// existing rows first; only one slot is ever kept.
    pub async fn add(&self, schema: &Schema) -> Result<()> {
        self.ensure_table().await?;

        let serialized = serialize_schema(schema);
        let hash = Self::hash_schema(schema);
        let now = chrono::Utc::now().naive_utc();

        let delete = format!("DELETE FROM {}", self.dialect.quote(SCHEMA_TABLE));
        self.connection.execute(&delete).await?;

        match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3)",
                    self.dialect.quote(SCHEMA_TABLE),
                    self.dialect.quote("schema"),
                    self.dialect.quote("time"),
                    self.dialect.quote("hash"),
                );
                sqlx::query(&sql)
                    .bind(&serialized)
                    .bind(now)
                    .bind(&hash)
                    .execute(pool)
                    .await?;
            }
            DatabaseConnection::MySql(pool) => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
                    self.dialect.quote(SCHEMA_TABLE),
                    self.dialect.quote("schema"),
                    self.dialect.quote("time"),
                    self.dialect.quote("hash"),
                );
                sqlx::query(&sql)
                    .bind(&serialized)
                    .bind(now)
                    .bind(&hash)
                    .execute(pool)
                    .await?;
            }
            DatabaseConnection::Sqlite(pool) => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?)",
                    self.dialect.quote(SCHEMA_TABLE),
                    self.dialect.quote("schema"),
                    self.dialect.quote("time"),
                    self.dialect.quote("hash"),
                );
                sqlx::query(&sql)
                    .bind(&serialized)
                    .bind(now)
                    .bind(&hash)
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    /// Remove every stored snapshot
    pub async fn clear(&self) -> Result<()> {
        self.ensure_table().await?;

        let sql = format!("DELETE FROM {}", self.dialect.quote(SCHEMA_TABLE));
        self.connection.execute(&sql).await
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = self.dialect.schema_storage_ddl(SCHEMA_TABLE);
        self.connection.execute(&sql).await
    }
}

fn serialize_schema(schema: &Schema) -> String {
    let document = SchemaDocumentRef {
        version: DOCUMENT_VERSION,
        tables: &schema.tables,
    };

    // Serialization of the document cannot fail: the types hold plain
    // strings and numbers.
    serde_json::to_string(&document).expect("schema document serialization")
}
