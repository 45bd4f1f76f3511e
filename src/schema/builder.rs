//! Schema builder
//!
//! Applies planned DDL against the database. Every top-level operation
//! runs inside a single transaction: a half-applied table alteration
//! must never be visible, so the whole batch commits or rolls back.

use std::sync::Arc;

use crate::db::connection::DatabaseConnection;
use crate::db::dialect::SchemaDialect;
use crate::error::Result;
use crate::schema::ddl::DdlPlanner;
use crate::schema::diff::SchemaDiff;
use crate::schema::types::Schema;

/// Options for dropping a schema
#[derive(Debug, Clone, Copy, Default)]
pub struct DropOptions {
    /// The caller intends to drop the whole database out-of-band;
    /// skip per-table drops entirely.
    pub drop_database: bool,
}

/// Applies schemas and schema diffs as DDL
pub struct SchemaBuilder {
    connection: DatabaseConnection,
    planner: DdlPlanner,
}

impl SchemaBuilder {
    /// Create a builder
    pub fn new(
        connection: DatabaseConnection,
        dialect: Arc<dyn SchemaDialect>,
        force_migration: bool,
    ) -> Self {
        Self {
            connection,
            planner: DdlPlanner::new(dialect, force_migration),
        }
    }

    /// Create every table, then every foreign key, in one transaction
    pub async fn create_schema(&self, schema: &Schema) -> Result<()> {
        let statements = self.planner.create_schema_plan(schema);

        tracing::debug!(statements = statements.len(), "Creating schema");
        self.connection.execute_in_transaction(&statements).await
    }

    /// Drop every table in reverse declaration order, in one
    /// transaction. A no-op without `force_migration`.
    pub async fn drop_schema(&self, schema: &Schema, options: DropOptions) -> Result<()> {
        if options.drop_database {
            // The whole database goes away out-of-band.
            return Ok(());
        }

        let statements = self.planner.drop_schema_plan(schema);
        if statements.is_empty() {
            return Ok(());
        }

        tracing::debug!(statements = statements.len(), "Dropping schema");
        self.connection.execute_in_transaction(&statements).await
    }

    /// Apply an incremental diff inside the dialect's schema-update
    /// bracket. The bracket's closing statements run even when the
    /// transaction fails, so constraint checks are never left disabled.
    pub async fn update_schema(&self, diff: &SchemaDiff) -> Result<()> {
        let plan = self.planner.update_schema_plan(diff)?;

        tracing::debug!(statements = plan.statements.len(), "Updating schema");

        self.connection.execute_batch(&plan.pre).await?;

        let applied = self
            .connection
            .execute_in_transaction(&plan.statements)
            .await;
        let bracket_closed = self.connection.execute_batch(&plan.post).await;

        applied?;
        bracket_closed
    }
}
