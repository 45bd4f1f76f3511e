//! Dialect capabilities and SQL rendering
//!
//! Engine-specific behavior lives behind the [`SchemaDialect`] trait: one
//! implementation per supported database, injected at startup.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::types::{Column, ColumnType, DefaultValue};

/// Capability flags and rendering hooks for one database engine
pub trait SchemaDialect: Send + Sync {
    /// Engine name as used in configuration (`postgres`, `mysql`, `sqlite`)
    fn name(&self) -> &'static str;

    /// Whether foreign keys are diffed and managed at all on this engine
    fn uses_foreign_keys(&self) -> bool {
        true
    }

    /// Whether constraints can be added or dropped after table creation.
    /// When false, foreign keys are inlined at creation time instead of
    /// added in a second pass.
    fn can_alter_constraints(&self) -> bool {
        true
    }

    /// Whether an auto-increment column can be added via a simple alter
    fn can_add_increments(&self) -> bool {
        true
    }

    /// Whether unsigned integer types exist on this engine
    fn supports_unsigned(&self) -> bool {
        false
    }

    /// Whether dropping a foreign key implicitly drops its backing index
    fn drops_index_with_foreign_key(&self) -> bool {
        false
    }

    /// Statements to run before a schema update transaction
    fn start_schema_update(&self) -> Vec<String> {
        Vec::new()
    }

    /// Statements to run after a schema update transaction
    fn end_schema_update(&self) -> Vec<String> {
        Vec::new()
    }

    /// Quote an identifier
    fn quote(&self, identifier: &str) -> String;

    /// Resolve a logical column type to this engine's SQL type. Used both
    /// for rendering and for comparison against introspected types.
    fn sql_type(&self, column_type: &ColumnType) -> String;

    /// Render a default value for DDL
    fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Literal(value) => format!("'{}'", value.replace('\'', "''")),
            DefaultValue::Expression(expression) => expression.clone(),
        }
    }

    /// Render a full column definition for CREATE TABLE / ADD COLUMN
    fn column_definition(&self, column: &Column) -> String {
        if column.column_type.is_increments() {
            return self.increments_definition(&column.name);
        }

        let mut definition = format!(
            "{} {}",
            self.quote(&column.name),
            self.sql_type(&column.column_type)
        );

        if column.unsigned == Some(true) && self.supports_unsigned() {
            definition.push_str(" unsigned");
        }

        if let Some(default) = &column.default_to {
            definition.push_str(&format!(" DEFAULT {}", self.render_default(default)));
        }

        match column.not_nullable {
            Some(true) => definition.push_str(" NOT NULL"),
            Some(false) => definition.push_str(" NULL"),
            None => {}
        }

        definition
    }

    /// Render the auto-increment primary key column definition
    fn increments_definition(&self, name: &str) -> String;

    /// Statements altering an existing column in place to match `column`
    fn alter_column_sql(&self, table_name: &str, column: &Column) -> Result<Vec<String>>;

    /// Statement dropping an index
    fn drop_index_sql(&self, table_name: &str, index_name: &str) -> String;

    /// Statement dropping a foreign key. May be empty on engines where
    /// foreign keys are not managed; callers gate on `uses_foreign_keys`.
    fn drop_foreign_key_sql(&self, table_name: &str, fk_name: &str) -> String;

    /// Statement declaring a primary key on existing columns
    fn add_primary_key_sql(&self, table_name: &str, columns: &[String]) -> String {
        let columns = columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({});",
            self.quote(table_name),
            columns
        )
    }

    /// DDL bootstrapping the schema-storage table
    fn schema_storage_ddl(&self, table_name: &str) -> String;
}

/// Resolve the dialect for a configured driver name
pub fn dialect_from_driver(driver: &str) -> Result<Arc<dyn SchemaDialect>> {
    match driver {
        "postgres" => Ok(Arc::new(PostgresDialect)),
        "mysql" => Ok(Arc::new(MySqlDialect)),
        "sqlite" => Ok(Arc::new(SqliteDialect)),
        _ => Err(Error::ConfigError(format!(
            "Unsupported database driver: {}",
            driver
        ))),
    }
}

/// PostgreSQL dialect
pub struct PostgresDialect;

impl SchemaDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier)
    }

    fn sql_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer => "integer".to_string(),
            ColumnType::String => "varchar(255)".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Decimal { precision, scale } => {
                format!("decimal({}, {})", precision, scale)
            }
            ColumnType::Date => "date".to_string(),
            ColumnType::Time { precision } => format!("time({})", precision),
            ColumnType::Datetime { use_tz, precision }
            | ColumnType::Timestamp { use_tz, precision } => {
                if *use_tz {
                    format!("timestamptz({})", precision)
                } else {
                    format!("timestamp({})", precision)
                }
            }
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Unknown(native) => native.clone(),
        }
    }

    fn increments_definition(&self, name: &str) -> String {
        format!("{} serial PRIMARY KEY", self.quote(name))
    }

    fn alter_column_sql(&self, table_name: &str, column: &Column) -> Result<Vec<String>> {
        let table = self.quote(table_name);
        let name = self.quote(&column.name);
        let sql_type = self.sql_type(&column.column_type);

        let mut statements = vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
            table, name, sql_type, name, sql_type
        )];

        match column.not_nullable {
            Some(true) => statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL;",
                table, name
            )),
            Some(false) => statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL;",
                table, name
            )),
            None => {}
        }

        match &column.default_to {
            Some(default) => statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                table,
                name,
                self.render_default(default)
            )),
            None => statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                table, name
            )),
        }

        Ok(statements)
    }

    fn drop_index_sql(&self, _table_name: &str, index_name: &str) -> String {
        format!("DROP INDEX IF EXISTS {};", self.quote(index_name))
    }

    fn drop_foreign_key_sql(&self, table_name: &str, fk_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
            self.quote(table_name),
            self.quote(fk_name)
        )
    }

    fn schema_storage_ddl(&self, table_name: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  \"id\" serial PRIMARY KEY,\n  \"schema\" text,\n  \"time\" timestamp(6),\n  \"hash\" varchar(255)\n);",
            self.quote(table_name)
        )
    }
}

/// MySQL dialect
pub struct MySqlDialect;

impl SchemaDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_unsigned(&self) -> bool {
        true
    }

    fn drops_index_with_foreign_key(&self) -> bool {
        true
    }

    fn start_schema_update(&self) -> Vec<String> {
        vec!["SET FOREIGN_KEY_CHECKS = 0;".to_string()]
    }

    fn end_schema_update(&self) -> Vec<String> {
        vec!["SET FOREIGN_KEY_CHECKS = 1;".to_string()]
    }

    fn quote(&self, identifier: &str) -> String {
        format!("`{}`", identifier)
    }

    fn sql_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer => "integer".to_string(),
            ColumnType::String => "varchar(255)".to_string(),
            ColumnType::Text => "longtext".to_string(),
            ColumnType::Jsonb => "json".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Decimal { precision, scale } => {
                format!("decimal({}, {})", precision, scale)
            }
            ColumnType::Date => "date".to_string(),
            ColumnType::Time { precision } => format!("time({})", precision),
            ColumnType::Datetime { precision, .. } => format!("datetime({})", precision),
            ColumnType::Timestamp { precision, .. } => format!("timestamp({})", precision),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Unknown(native) => native.clone(),
        }
    }

    fn increments_definition(&self, name: &str) -> String {
        format!(
            "{} integer unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY",
            self.quote(name)
        )
    }

    fn alter_column_sql(&self, table_name: &str, column: &Column) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            self.quote(table_name),
            self.column_definition(column)
        )])
    }

    fn drop_index_sql(&self, table_name: &str, index_name: &str) -> String {
        format!(
            "DROP INDEX {} ON {};",
            self.quote(index_name),
            self.quote(table_name)
        )
    }

    fn drop_foreign_key_sql(&self, table_name: &str, fk_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {};",
            self.quote(table_name),
            self.quote(fk_name)
        )
    }

    fn schema_storage_ddl(&self, table_name: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  `id` integer unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY,\n  `schema` longtext,\n  `time` datetime(6),\n  `hash` varchar(255)\n);",
            self.quote(table_name)
        )
    }
}

/// SQLite dialect. Constraints cannot be altered after creation, so
/// foreign keys are inlined at table creation and excluded from diffing.
pub struct SqliteDialect;

impl SchemaDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn uses_foreign_keys(&self) -> bool {
        false
    }

    fn can_alter_constraints(&self) -> bool {
        false
    }

    fn can_add_increments(&self) -> bool {
        false
    }

    fn start_schema_update(&self) -> Vec<String> {
        vec!["PRAGMA foreign_keys = OFF;".to_string()]
    }

    fn end_schema_update(&self) -> Vec<String> {
        vec!["PRAGMA foreign_keys = ON;".to_string()]
    }

    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier)
    }

    fn sql_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer => "integer".to_string(),
            ColumnType::String => "varchar(255)".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Jsonb => "json".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Decimal { precision, scale } => {
                format!("decimal({}, {})", precision, scale)
            }
            ColumnType::Date => "date".to_string(),
            ColumnType::Time { .. } => "time".to_string(),
            ColumnType::Datetime { .. } => "datetime".to_string(),
            ColumnType::Timestamp { .. } => "timestamp".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Unknown(native) => native.clone(),
        }
    }

    fn increments_definition(&self, name: &str) -> String {
        format!(
            "{} integer PRIMARY KEY AUTOINCREMENT NOT NULL",
            self.quote(name)
        )
    }

    fn alter_column_sql(&self, _table_name: &str, column: &Column) -> Result<Vec<String>> {
        Err(Error::MigrationError(format!(
            "SQLite does not support altering column definitions directly \
             (column `{}`). The table must be recreated with the new definition.",
            column.name
        )))
    }

    fn drop_index_sql(&self, _table_name: &str, index_name: &str) -> String {
        format!("DROP INDEX IF EXISTS {};", self.quote(index_name))
    }

    fn drop_foreign_key_sql(&self, _table_name: &str, _fk_name: &str) -> String {
        // Constraints cannot be dropped; callers gate on uses_foreign_keys.
        String::new()
    }

    fn schema_storage_ddl(&self, table_name: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  \"id\" integer PRIMARY KEY AUTOINCREMENT NOT NULL,\n  \"schema\" text,\n  \"time\" datetime,\n  \"hash\" varchar(255)\n);",
            self.quote(table_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn type_rendering_differs_per_engine() {
        let text = ColumnType::Text;
        assert_eq!(PostgresDialect.sql_type(&text), "text");
        assert_eq!(MySqlDialect.sql_type(&text), "longtext");

        let datetime = ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        };
        assert_eq!(PostgresDialect.sql_type(&datetime), "timestamp(6)");
        assert_eq!(MySqlDialect.sql_type(&datetime), "datetime(6)");
        assert_eq!(SqliteDialect.sql_type(&datetime), "datetime");
    }

    #[test]
    fn unsigned_is_rendered_only_where_supported() {
        let column = Column::new("count", ColumnType::Integer).unsigned(true);

        assert_eq!(
            MySqlDialect.column_definition(&column),
            "`count` integer unsigned"
        );
        assert_eq!(
            PostgresDialect.column_definition(&column),
            "\"count\" integer"
        );
    }

    #[test]
    fn literal_defaults_are_quoted_expressions_are_raw() {
        let literal = Column::new("status", ColumnType::String)
            .default_to(DefaultValue::Literal("draft".to_string()));
        let expression = Column::new("created_at", ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        })
        .default_to(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()));

        assert_eq!(
            PostgresDialect.column_definition(&literal),
            "\"status\" varchar(255) DEFAULT 'draft'"
        );
        assert_eq!(
            PostgresDialect.column_definition(&expression),
            "\"created_at\" timestamp(6) DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn sqlite_rejects_column_alteration() {
        let column = Column::new("title", ColumnType::String);
        let result = SqliteDialect.alter_column_sql("articles", &column);

        assert!(matches!(result, Err(Error::MigrationError(_))));
    }
}
