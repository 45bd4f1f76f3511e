//! Versioned migration management
//!
//! Runs operator-authored `.sql` migrations from a directory, tracking
//! applied entries in a dedicated table. Migrations run before schema
//! sync so the differ always sees their effects.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx::FromRow;

use crate::db::connection::DatabaseConnection;
use crate::db::dialect::SchemaDialect;
use crate::error::Result;

/// Tracking table for operator-authored migrations
pub const MIGRATIONS_TABLE: &str = "strapi_migrations";
/// Tracking table for engine-internal migrations
pub const INTERNAL_MIGRATIONS_TABLE: &str = "strapi_migrations_internal";

#[derive(FromRow)]
struct NameRow {
    name: String,
}

/// A migration read from the migrations directory
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

/// Runner for versioned migrations
pub struct MigrationRunner {
    connection: DatabaseConnection,
    dialect: Arc<dyn SchemaDialect>,
    directory: PathBuf,
}

impl MigrationRunner {
    /// Create a runner over the given migrations directory
    pub fn new(
        connection: DatabaseConnection,
        dialect: Arc<dyn SchemaDialect>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connection,
            dialect,
            directory: directory.into(),
        }
    }

    /// Whether any local migration has not been applied yet
    pub async fn has_pending(&self) -> Result<bool> {
        self.ensure_table().await?;

        let applied = self.applied().await?;
        Ok(self
            .local_migrations()?
            .iter()
            .any(|m| !applied.contains(&m.name)))
    }

    /// Apply every pending migration, each inside its own transaction
    pub async fn run_pending(&self) -> Result<()> {
        self.ensure_table().await?;

        let applied = self.applied().await?;

        for migration in self.local_migrations()? {
            if applied.contains(&migration.name) {
                continue;
            }

            tracing::info!(migration = %migration.name, "Applying migration");

            let record = format!(
                "INSERT INTO {} ({}, {}) VALUES ('{}', CURRENT_TIMESTAMP);",
                self.dialect.quote(MIGRATIONS_TABLE),
                self.dialect.quote("name"),
                self.dialect.quote("time"),
                migration.name.replace('\'', "''")
            );

            let statements = vec![migration.sql.clone(), record];
            self.connection.execute_in_transaction(&statements).await?;

            tracing::info!(migration = %migration.name, "Migration applied");
        }

        Ok(())
    }

    /// Migrations found on disk, in lexicographic order
    fn local_migrations(&self) -> Result<Vec<Migration>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }

        let mut migrations = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }

            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };

            migrations.push(Migration {
                name,
                sql: fs::read_to_string(&path)?,
            });
        }

        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(migrations)
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {},\n  {} varchar(255),\n  {} datetime\n);",
            self.dialect.quote(MIGRATIONS_TABLE),
            self.dialect.increments_definition("id"),
            self.dialect.quote("name"),
            self.dialect.quote("time")
        );

        self.connection.execute(&sql).await
    }

    async fn applied(&self) -> Result<HashSet<String>> {
        let sql = format!(
            "SELECT {} AS name FROM {}",
            self.dialect.quote("name"),
            self.dialect.quote(MIGRATIONS_TABLE)
        );

        let rows: Vec<NameRow> = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query_as(&sql).fetch_all(pool).await?
            }
            DatabaseConnection::MySql(pool) => sqlx::query_as(&sql).fetch_all(pool).await?,
            DatabaseConnection::Sqlite(pool) => sqlx::query_as(&sql).fetch_all(pool).await?,
        };

        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}
