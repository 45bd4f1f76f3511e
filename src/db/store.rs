//! Core store access
//!
//! Read-only view over the application key-value store, used to look up
//! the `persisted_tables` registry.

use sqlx::FromRow;

use crate::db::connection::DatabaseConnection;
use crate::error::Result;

/// Name of the application key-value store table
pub const CORE_STORE_TABLE: &str = "strapi_core_store_settings";

#[derive(FromRow)]
struct ValueRow {
    value: Option<String>,
}

/// Key-value reader over the core store table
#[derive(Clone)]
pub struct CoreStore {
    connection: DatabaseConnection,
}

impl CoreStore {
    /// Create a store reader over the given connection
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Read a JSON value for `{type, key}`, `None` when absent. The
    /// caller is responsible for checking that the store table exists.
    pub async fn get(&self, store_type: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let full_key = format!("{}_{}", store_type, key);

        let row = match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                let sql = format!("SELECT \"value\" FROM \"{}\" WHERE \"key\" = $1", CORE_STORE_TABLE);
                sqlx::query_as::<_, ValueRow>(&sql)
                    .bind(&full_key)
                    .fetch_optional(pool)
                    .await?
            }
            DatabaseConnection::MySql(pool) => {
                let sql = format!("SELECT `value` FROM `{}` WHERE `key` = ?", CORE_STORE_TABLE);
                sqlx::query_as::<_, ValueRow>(&sql)
                    .bind(&full_key)
                    .fetch_optional(pool)
                    .await?
            }
            DatabaseConnection::Sqlite(pool) => {
                let sql = format!("SELECT \"value\" FROM \"{}\" WHERE \"key\" = ?", CORE_STORE_TABLE);
                sqlx::query_as::<_, ValueRow>(&sql)
                    .bind(&full_key)
                    .fetch_optional(pool)
                    .await?
            }
        };

        match row.and_then(|r| r.value) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
