//! DDL planning
//!
//! Turns a schema or a schema diff into ordered statement lists. Planning
//! is pure so the exact DDL an operation would run can be inspected and
//! tested without a database; execution lives in the builder.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::dialect::SchemaDialect;
use crate::error::Result;
use crate::schema::diff::{SchemaDiff, TableUpdate};
use crate::schema::types::{ColumnType, ForeignKey, Index, IndexType, Schema, Table};

/// The alteration steps for one table, in the only order that does not
/// trip over constraint dependencies. Foreign keys go first (their
/// backing indexes cannot be dropped while referenced) and new
/// constraints come after the columns they cover exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterPhase {
    DropForeignKeys,
    DropColumns,
    DropIndexes,
    AlterColumns,
    RecreateConstraints,
    AddColumns,
    AddForeignKeys,
    AddIndexes,
}

/// Phase execution order. Do not reorder.
pub const ALTER_PHASES: [AlterPhase; 8] = [
    AlterPhase::DropForeignKeys,
    AlterPhase::DropColumns,
    AlterPhase::DropIndexes,
    AlterPhase::AlterColumns,
    AlterPhase::RecreateConstraints,
    AlterPhase::AddColumns,
    AlterPhase::AddForeignKeys,
    AlterPhase::AddIndexes,
];

/// A planned schema update: statements to run before, inside, and after
/// the update transaction
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub pre: Vec<String>,
    pub statements: Vec<String>,
    pub post: Vec<String>,
}

/// Pure DDL planner for one dialect
pub struct DdlPlanner {
    dialect: Arc<dyn SchemaDialect>,
    force_migration: bool,
}

impl DdlPlanner {
    /// Create a planner
    pub fn new(dialect: Arc<dyn SchemaDialect>, force_migration: bool) -> Self {
        Self {
            dialect,
            force_migration,
        }
    }

    /// Statements creating every table, then every foreign key once all
    /// tables exist (avoids forward references between tables)
    pub fn create_schema_plan(&self, schema: &Schema) -> Vec<String> {
        let mut statements = Vec::new();

        for table in &schema.tables {
            statements.extend(self.create_table_statements(table));
        }

        if self.dialect.can_alter_constraints() && self.dialect.uses_foreign_keys() {
            for table in &schema.tables {
                for fk in &table.foreign_keys {
                    statements.push(self.add_foreign_key_sql(&table.name, fk));
                }
            }
        }

        statements
    }

    /// Statements dropping every table in reverse declaration order.
    /// Empty unless destructive migrations are forced.
    pub fn drop_schema_plan(&self, schema: &Schema) -> Vec<String> {
        if !self.force_migration {
            tracing::debug!("Skipping schema drop: forceMigration is not set");
            return Vec::new();
        }

        schema
            .tables
            .iter()
            .rev()
            .map(|table| format!("DROP TABLE IF EXISTS {};", self.dialect.quote(&table.name)))
            .collect()
    }

    /// Plan an incremental update from a diff
    pub fn update_schema_plan(&self, diff: &SchemaDiff) -> Result<UpdatePlan> {
        let mut statements = Vec::new();

        for table in &diff.tables.added {
            statements.extend(self.create_table_statements(table));
        }
        if self.dialect.can_alter_constraints() && self.dialect.uses_foreign_keys() {
            for table in &diff.tables.added {
                for fk in &table.foreign_keys {
                    statements.push(self.add_foreign_key_sql(&table.name, fk));
                }
            }
        }

        if self.force_migration {
            // Foreign keys first, so no removed table is still referenced
            // when its turn comes.
            if self.dialect.uses_foreign_keys() && self.dialect.can_alter_constraints() {
                for table in &diff.tables.removed {
                    for fk in &table.foreign_keys {
                        statements.push(self.dialect.drop_foreign_key_sql(&table.name, &fk.name));
                    }
                }
            }
            for table in &diff.tables.removed {
                tracing::debug!(table = %table.name, "Dropping removed table");
                statements.push(format!(
                    "DROP TABLE IF EXISTS {};",
                    self.dialect.quote(&table.name)
                ));
            }
        } else if !diff.tables.removed.is_empty() {
            tracing::debug!(
                count = diff.tables.removed.len(),
                "Skipping removed tables: forceMigration is not set"
            );
        }

        for table_update in &diff.tables.updated {
            statements.extend(self.alter_table_statements(table_update)?);
        }

        Ok(UpdatePlan {
            pre: self.dialect.start_schema_update(),
            statements: statements.into_iter().filter(|s| !s.is_empty()).collect(),
            post: self.dialect.end_schema_update(),
        })
    }

    fn alter_table_statements(&self, update: &TableUpdate) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        let mut dropped_fk_names: HashSet<&str> = HashSet::new();

        for phase in ALTER_PHASES {
            self.phase_statements(update, phase, &mut dropped_fk_names, &mut statements)?;
        }

        Ok(statements)
    }

    fn phase_statements<'a>(
        &self,
        update: &'a TableUpdate,
        phase: AlterPhase,
        dropped_fk_names: &mut HashSet<&'a str>,
        statements: &mut Vec<String>,
    ) -> Result<()> {
        let table_name = &update.name;
        let manages_fks =
            self.dialect.uses_foreign_keys() && self.dialect.can_alter_constraints();

        match phase {
            AlterPhase::DropForeignKeys => {
                if !manages_fks {
                    return Ok(());
                }

                for fk in &update.foreign_keys.removed {
                    tracing::debug!(table = %table_name, fk = %fk.name, "Dropping foreign key");
                    statements.push(self.dialect.drop_foreign_key_sql(table_name, &fk.name));
                    dropped_fk_names.insert(fk.name.as_str());
                }
                // Updated foreign keys are dropped here and recreated
                // with their new definition later.
                for fk in &update.foreign_keys.updated {
                    tracing::debug!(table = %table_name, fk = %fk.name, "Dropping updated foreign key");
                    statements.push(self.dialect.drop_foreign_key_sql(table_name, &fk.name));
                    dropped_fk_names.insert(fk.name.as_str());
                }
            }
            AlterPhase::DropColumns => {
                if !self.force_migration {
                    if !update.columns.removed.is_empty() {
                        tracing::debug!(
                            table = %table_name,
                            count = update.columns.removed.len(),
                            "Skipping removed columns: forceMigration is not set"
                        );
                    }
                    return Ok(());
                }

                for column in &update.columns.removed {
                    tracing::debug!(table = %table_name, column = %column.name, "Dropping column");
                    statements.push(format!(
                        "ALTER TABLE {} DROP COLUMN {};",
                        self.dialect.quote(table_name),
                        self.dialect.quote(&column.name)
                    ));
                }
            }
            AlterPhase::DropIndexes => {
                let skip_dropped_with_fk = self.dialect.drops_index_with_foreign_key();

                for index in &update.indexes.removed {
                    if skip_dropped_with_fk && dropped_fk_names.contains(index.name.as_str()) {
                        continue;
                    }
                    tracing::debug!(table = %table_name, index = %index.name, "Dropping index");
                    statements.push(self.dialect.drop_index_sql(table_name, &index.name));
                }
                for index in &update.indexes.updated {
                    if skip_dropped_with_fk && dropped_fk_names.contains(index.name.as_str()) {
                        continue;
                    }
                    tracing::debug!(table = %table_name, index = %index.name, "Dropping updated index");
                    statements.push(self.dialect.drop_index_sql(table_name, &index.name));
                }
            }
            AlterPhase::AlterColumns => {
                for column_update in &update.columns.updated {
                    // `increments` is not independently alterable; alter
                    // the column as a plain integer instead.
                    let column = if column_update.object.column_type.is_increments() {
                        let mut column = column_update.object.clone();
                        column.column_type = ColumnType::Integer;
                        column.unsigned = Some(true);
                        column
                    } else {
                        column_update.object.clone()
                    };

                    tracing::debug!(table = %table_name, column = %column.name, "Altering column");
                    statements.extend(self.dialect.alter_column_sql(table_name, &column)?);
                }
            }
            AlterPhase::RecreateConstraints => {
                if manages_fks {
                    for fk in &update.foreign_keys.updated {
                        tracing::debug!(table = %table_name, fk = %fk.name, "Recreating foreign key");
                        statements.push(self.add_foreign_key_sql(table_name, &fk.object));
                    }
                }
                for index in &update.indexes.updated {
                    tracing::debug!(table = %table_name, index = %index.name, "Recreating index");
                    statements.push(self.create_index_sql(table_name, &index.object));
                }
            }
            AlterPhase::AddColumns => {
                for column in &update.columns.added {
                    tracing::debug!(table = %table_name, column = %column.name, "Adding column");

                    if column.column_type.is_increments() && !self.dialect.can_add_increments() {
                        // Fall back to a plain integer column promoted to
                        // primary key in a second statement.
                        let mut plain = column.clone();
                        plain.column_type = ColumnType::Integer;
                        plain.unsigned = Some(true);
                        statements.push(format!(
                            "ALTER TABLE {} ADD COLUMN {};",
                            self.dialect.quote(table_name),
                            self.dialect.column_definition(&plain)
                        ));
                        statements.push(
                            self.dialect
                                .add_primary_key_sql(table_name, &[column.name.clone()]),
                        );
                    } else {
                        statements.push(format!(
                            "ALTER TABLE {} ADD COLUMN {};",
                            self.dialect.quote(table_name),
                            self.dialect.column_definition(column)
                        ));
                    }
                }
            }
            AlterPhase::AddForeignKeys => {
                if !manages_fks {
                    return Ok(());
                }

                for fk in &update.foreign_keys.added {
                    tracing::debug!(table = %table_name, fk = %fk.name, "Adding foreign key");
                    statements.push(self.add_foreign_key_sql(table_name, fk));
                }
            }
            AlterPhase::AddIndexes => {
                for index in &update.indexes.added {
                    tracing::debug!(table = %table_name, index = %index.name, "Adding index");
                    statements.push(self.create_index_sql(table_name, index));
                }
            }
        }

        Ok(())
    }

    fn create_table_statements(&self, table: &Table) -> Vec<String> {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| format!("  {}", self.dialect.column_definition(column)))
            .collect();

        for index in &table.indexes {
            if index.index_type == Some(IndexType::Primary) {
                definitions.push(format!("  PRIMARY KEY ({})", self.quoted_list(&index.columns)));
            }
        }

        if !self.dialect.can_alter_constraints() {
            // Constraints cannot be added later on this engine; inline
            // the foreign keys at creation time.
            for fk in &table.foreign_keys {
                definitions.push(format!(
                    "  CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}){}{}",
                    self.dialect.quote(&fk.name),
                    self.quoted_list(&fk.columns),
                    self.dialect.quote(&fk.referenced_table),
                    self.quoted_list(&fk.referenced_columns),
                    fk.on_delete
                        .as_deref()
                        .map(|a| format!(" ON DELETE {}", a))
                        .unwrap_or_default(),
                    fk.on_update
                        .as_deref()
                        .map(|a| format!(" ON UPDATE {}", a))
                        .unwrap_or_default(),
                ));
            }
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.dialect.quote(&table.name),
            definitions.join(",\n")
        )];

        for index in &table.indexes {
            if index.index_type != Some(IndexType::Primary) {
                statements.push(self.create_index_sql(&table.name, index));
            }
        }

        statements
    }

    fn create_index_sql(&self, table_name: &str, index: &Index) -> String {
        match index.index_type {
            Some(IndexType::Primary) => self
                .dialect
                .add_primary_key_sql(table_name, &index.columns),
            Some(IndexType::Unique) => format!(
                "CREATE UNIQUE INDEX {} ON {} ({});",
                self.dialect.quote(&index.name),
                self.dialect.quote(table_name),
                self.quoted_list(&index.columns)
            ),
            None => format!(
                "CREATE INDEX {} ON {} ({});",
                self.dialect.quote(&index.name),
                self.dialect.quote(table_name),
                self.quoted_list(&index.columns)
            ),
        }
    }

    fn add_foreign_key_sql(&self, table_name: &str, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {};",
            self.dialect.quote(table_name),
            self.dialect.quote(&fk.name),
            self.quoted_list(&fk.columns),
            self.dialect.quote(&fk.referenced_table),
            self.quoted_list(&fk.referenced_columns),
            fk.on_delete.as_deref().unwrap_or("NO ACTION"),
            fk.on_update.as_deref().unwrap_or("NO ACTION"),
        )
    }

    fn quoted_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
