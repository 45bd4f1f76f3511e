//! Live database schema introspection
//!
//! Reads the actual shape of the database into the logical schema model.
//! The result is ground truth for diffing and is read fresh on every
//! sync; other processes may have altered the database in between.

use async_trait::async_trait;
use sqlx::{FromRow, MySql, Pool, Postgres, Row, Sqlite};
use std::collections::HashMap;

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::schema::types::{Column, ColumnType, DefaultValue, ForeignKey, Index, IndexType, Schema, Table};
use crate::utils::naming;

/// Engine-specific schema introspection
#[async_trait]
pub trait Introspector {
    /// Read the full database schema
    async fn introspect_schema(&self) -> Result<Schema>;
}

/// Schema introspector dispatching to the engine implementation
pub struct SchemaIntrospector {
    connection: DatabaseConnection,
    schema_name: Option<String>,
}

impl SchemaIntrospector {
    /// Create an introspector. `schema_name` scopes Postgres queries
    /// (defaults to `public`) and is ignored elsewhere.
    pub fn new(connection: DatabaseConnection, schema_name: Option<String>) -> Self {
        Self {
            connection,
            schema_name,
        }
    }

    /// Read the current database schema
    pub async fn introspect(&self) -> Result<Schema> {
        match &self.connection {
            DatabaseConnection::Postgres(pool) => {
                PostgresIntrospector {
                    pool,
                    schema: self.schema_name.as_deref().unwrap_or("public"),
                }
                .introspect_schema()
                .await
            }
            DatabaseConnection::MySql(pool) => {
                MySqlIntrospector { pool }.introspect_schema().await
            }
            DatabaseConnection::Sqlite(pool) => {
                SqliteIntrospector { pool }.introspect_schema().await
            }
        }
    }
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
}

#[derive(FromRow)]
struct PgIndexRow {
    index_name: String,
    column_name: String,
    is_unique: bool,
    is_primary: bool,
}

#[derive(FromRow)]
struct ForeignKeyRow {
    constraint_name: String,
    column_name: String,
    referenced_table: String,
    referenced_column: String,
    delete_rule: String,
    update_rule: String,
}

fn observed_default(raw: Option<String>) -> Option<DefaultValue> {
    raw.map(DefaultValue::Expression)
}

/// PostgreSQL introspector
struct PostgresIntrospector<'a> {
    pool: &'a Pool<Postgres>,
    schema: &'a str,
}

fn parse_postgres_type(data_type: &str) -> ColumnType {
    match data_type {
        "character varying" => ColumnType::String,
        "text" => ColumnType::Text,
        "jsonb" => ColumnType::Jsonb,
        "integer" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "double precision" => ColumnType::Double,
        "numeric" => ColumnType::Decimal {
            precision: 10,
            scale: 2,
        },
        "date" => ColumnType::Date,
        "time without time zone" => ColumnType::Time { precision: 3 },
        "timestamp without time zone" => ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        },
        "timestamp with time zone" => ColumnType::Datetime {
            use_tz: true,
            precision: 6,
        },
        "boolean" => ColumnType::Boolean,
        other => ColumnType::Unknown(other.to_string()),
    }
}

#[async_trait]
impl<'a> Introspector for PostgresIntrospector<'a> {
    async fn introspect_schema(&self) -> Result<Schema> {
        let mut schema = Schema::new();

        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let table_rows = sqlx::query_as::<_, TableRow>(sql)
            .bind(self.schema)
            .fetch_all(self.pool)
            .await?;

        for row in table_rows {
            let table_name = row.table_name;
            let mut table = Table::new(&table_name);

            let sql = r#"
                SELECT column_name, data_type, is_nullable, column_default
                FROM information_schema.columns
                WHERE table_schema = $1 AND table_name = $2
                ORDER BY ordinal_position
            "#;

            let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
                .bind(self.schema)
                .bind(&table_name)
                .fetch_all(self.pool)
                .await?;

            for col in column_rows {
                let mut column = Column::new(&col.column_name, parse_postgres_type(&col.data_type));
                column.not_nullable = Some(col.is_nullable == "NO");
                column.default_to = observed_default(col.column_default);
                table.add_column(column);
            }

            let sql = r#"
                SELECT
                    i.relname AS index_name,
                    a.attname AS column_name,
                    ix.indisunique AS is_unique,
                    ix.indisprimary AS is_primary
                FROM pg_index ix
                JOIN pg_class i ON i.oid = ix.indexrelid
                JOIN pg_class t ON t.oid = ix.indrelid
                JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
                JOIN pg_namespace n ON n.oid = t.relnamespace
                WHERE t.relname = $1 AND n.nspname = $2
                ORDER BY i.relname, a.attnum
            "#;

            let index_rows = sqlx::query_as::<_, PgIndexRow>(sql)
                .bind(&table_name)
                .bind(self.schema)
                .fetch_all(self.pool)
                .await?;

            let mut indexes: HashMap<String, Index> = HashMap::new();
            for row in index_rows {
                let index_type = if row.is_primary {
                    Some(IndexType::Primary)
                } else if row.is_unique {
                    Some(IndexType::Unique)
                } else {
                    None
                };

                indexes
                    .entry(row.index_name.clone())
                    .or_insert_with(|| Index {
                        name: row.index_name.clone(),
                        columns: Vec::new(),
                        index_type,
                    })
                    .columns
                    .push(row.column_name);
            }

            let mut indexes: Vec<Index> = indexes.into_values().collect();
            indexes.sort_by(|a, b| a.name.cmp(&b.name));
            table.indexes = indexes;

            let sql = r#"
                SELECT
                    tc.constraint_name,
                    kcu.column_name,
                    ccu.table_name AS referenced_table,
                    ccu.column_name AS referenced_column,
                    rc.delete_rule,
                    rc.update_rule
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                JOIN information_schema.constraint_column_usage ccu
                    ON ccu.constraint_name = tc.constraint_name
                    AND ccu.table_schema = tc.table_schema
                JOIN information_schema.referential_constraints rc
                    ON tc.constraint_name = rc.constraint_name
                    AND tc.table_schema = rc.constraint_schema
                WHERE tc.constraint_type = 'FOREIGN KEY'
                    AND tc.table_schema = $1
                    AND tc.table_name = $2
                ORDER BY tc.constraint_name, kcu.ordinal_position
            "#;

            let fk_rows = sqlx::query_as::<_, ForeignKeyRow>(sql)
                .bind(self.schema)
                .bind(&table_name)
                .fetch_all(self.pool)
                .await?;

            table.foreign_keys = group_foreign_keys(fk_rows);

            schema.add_table(table);
        }

        Ok(schema)
    }
}

/// MySQL introspector
struct MySqlIntrospector<'a> {
    pool: &'a Pool<MySql>,
}

fn parse_mysql_type(data_type: &str) -> ColumnType {
    match data_type {
        "varchar" | "char" => ColumnType::String,
        "text" | "mediumtext" | "longtext" => ColumnType::Text,
        "json" => ColumnType::Jsonb,
        "int" | "integer" => ColumnType::Integer,
        "bigint" => ColumnType::BigInteger,
        "double" | "float" => ColumnType::Double,
        "decimal" => ColumnType::Decimal {
            precision: 10,
            scale: 2,
        },
        "date" => ColumnType::Date,
        "time" => ColumnType::Time { precision: 3 },
        "datetime" => ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        },
        "timestamp" => ColumnType::Timestamp {
            use_tz: false,
            precision: 6,
        },
        "tinyint" | "boolean" => ColumnType::Boolean,
        other => ColumnType::Unknown(other.to_string()),
    }
}

#[derive(FromRow)]
struct MySqlColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
    column_type: String,
}

#[derive(FromRow)]
struct MySqlIndexRow {
    index_name: String,
    column_name: String,
    non_unique: i64,
}

#[async_trait]
impl<'a> Introspector for MySqlIntrospector<'a> {
    async fn introspect_schema(&self) -> Result<Schema> {
        let mut schema = Schema::new();

        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let table_rows = sqlx::query_as::<_, TableRow>(sql).fetch_all(self.pool).await?;

        for row in table_rows {
            let table_name = row.table_name;
            let mut table = Table::new(&table_name);

            let sql = r#"
                SELECT column_name, data_type, is_nullable, column_default, column_type
                FROM information_schema.columns
                WHERE table_schema = DATABASE() AND table_name = ?
                ORDER BY ordinal_position
            "#;

            let column_rows = sqlx::query_as::<_, MySqlColumnRow>(sql)
                .bind(&table_name)
                .fetch_all(self.pool)
                .await?;

            for col in column_rows {
                let mut column = Column::new(&col.column_name, parse_mysql_type(&col.data_type));
                column.not_nullable = Some(col.is_nullable == "NO");
                column.default_to = observed_default(col.column_default);
                column.unsigned = Some(col.column_type.contains("unsigned"));
                table.add_column(column);
            }

            let sql = r#"
                SELECT index_name, column_name, non_unique
                FROM information_schema.statistics
                WHERE table_schema = DATABASE() AND table_name = ?
                ORDER BY index_name, seq_in_index
            "#;

            let index_rows = sqlx::query_as::<_, MySqlIndexRow>(sql)
                .bind(&table_name)
                .fetch_all(self.pool)
                .await?;

            let mut indexes: HashMap<String, Index> = HashMap::new();
            for row in index_rows {
                let index_type = if row.index_name == "PRIMARY" {
                    Some(IndexType::Primary)
                } else if row.non_unique == 0 {
                    Some(IndexType::Unique)
                } else {
                    None
                };

                indexes
                    .entry(row.index_name.clone())
                    .or_insert_with(|| Index {
                        name: row.index_name.clone(),
                        columns: Vec::new(),
                        index_type,
                    })
                    .columns
                    .push(row.column_name);
            }

            let mut indexes: Vec<Index> = indexes.into_values().collect();
            indexes.sort_by(|a, b| a.name.cmp(&b.name));
            table.indexes = indexes;

            let sql = r#"
                SELECT
                    rc.constraint_name,
                    kcu.column_name,
                    kcu.referenced_table_name AS referenced_table,
                    kcu.referenced_column_name AS referenced_column,
                    rc.delete_rule,
                    rc.update_rule
                FROM information_schema.referential_constraints rc
                JOIN information_schema.key_column_usage kcu
                    ON rc.constraint_name = kcu.constraint_name
                WHERE rc.constraint_schema = DATABASE() AND kcu.table_name = ?
                ORDER BY rc.constraint_name, kcu.ordinal_position
            "#;

            let fk_rows = sqlx::query_as::<_, ForeignKeyRow>(sql)
                .bind(&table_name)
                .fetch_all(self.pool)
                .await?;

            table.foreign_keys = group_foreign_keys(fk_rows);

            schema.add_table(table);
        }

        Ok(schema)
    }
}

/// SQLite introspector
struct SqliteIntrospector<'a> {
    pool: &'a Pool<Sqlite>,
}

fn parse_sqlite_type(declared: &str) -> ColumnType {
    let lowered = declared.to_lowercase();

    if lowered.starts_with("varchar") || lowered.starts_with("char") {
        ColumnType::String
    } else if lowered == "text" {
        ColumnType::Text
    } else if lowered == "json" {
        ColumnType::Jsonb
    } else if lowered == "integer" || lowered == "int" {
        ColumnType::Integer
    } else if lowered == "bigint" {
        ColumnType::BigInteger
    } else if lowered == "double" || lowered == "float" || lowered == "real" {
        ColumnType::Double
    } else if lowered.starts_with("decimal") || lowered.starts_with("numeric") {
        ColumnType::Decimal {
            precision: 10,
            scale: 2,
        }
    } else if lowered == "date" {
        ColumnType::Date
    } else if lowered.starts_with("time") && !lowered.starts_with("timestamp") && lowered != "datetime" {
        ColumnType::Time { precision: 3 }
    } else if lowered == "datetime" {
        ColumnType::Datetime {
            use_tz: false,
            precision: 6,
        }
    } else if lowered.starts_with("timestamp") {
        ColumnType::Timestamp {
            use_tz: false,
            precision: 6,
        }
    } else if lowered == "boolean" {
        ColumnType::Boolean
    } else {
        ColumnType::Unknown(declared.to_string())
    }
}

#[async_trait]
impl<'a> Introspector for SqliteIntrospector<'a> {
    async fn introspect_schema(&self) -> Result<Schema> {
        let mut schema = Schema::new();

        let sql = r#"
            SELECT name AS table_name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let table_rows = sqlx::query_as::<_, TableRow>(sql).fetch_all(self.pool).await?;

        for row in table_rows {
            let table_name = row.table_name;
            let mut table = Table::new(&table_name);

            let pragma = format!("PRAGMA table_info(\"{}\")", table_name);
            let column_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

            for col in column_rows {
                let name: String = col.try_get("name")?;
                let declared_type: String = col.try_get("type")?;
                let notnull: i64 = col.try_get("notnull")?;
                let dflt_value: Option<String> = col.try_get("dflt_value")?;
                let pk: i64 = col.try_get("pk")?;

                let mut column = Column::new(&name, parse_sqlite_type(&declared_type));
                column.not_nullable = Some(notnull != 0 || pk > 0);
                column.default_to = observed_default(dflt_value);
                column.primary = pk > 0;
                table.add_column(column);
            }

            let pragma = format!("PRAGMA index_list(\"{}\")", table_name);
            let index_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

            for index_row in index_rows {
                let index_name: String = index_row.try_get("name")?;
                // Autoindexes back inline constraints and are not managed.
                if index_name.starts_with("sqlite_autoindex") {
                    continue;
                }

                let unique: i64 = index_row.try_get("unique")?;
                let origin: String = index_row.try_get("origin")?;

                let pragma = format!("PRAGMA index_info(\"{}\")", index_name);
                let info_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

                let mut columns: Vec<(i64, String)> = Vec::new();
                for info in info_rows {
                    let seqno: i64 = info.try_get("seqno")?;
                    let column_name: String = info.try_get("name")?;
                    columns.push((seqno, column_name));
                }
                columns.sort_by_key(|(seqno, _)| *seqno);

                let index_type = if origin == "pk" {
                    Some(IndexType::Primary)
                } else if unique != 0 {
                    Some(IndexType::Unique)
                } else {
                    None
                };

                table.add_index(Index {
                    name: index_name,
                    columns: columns.into_iter().map(|(_, name)| name).collect(),
                    index_type,
                });
            }

            let pragma = format!("PRAGMA foreign_key_list(\"{}\")", table_name);
            let fk_rows = sqlx::query(&pragma).fetch_all(self.pool).await?;

            let mut foreign_keys: HashMap<i64, ForeignKey> = HashMap::new();
            for fk_row in fk_rows {
                let id: i64 = fk_row.try_get("id")?;
                let referenced_table: String = fk_row.try_get("table")?;
                let from: String = fk_row.try_get("from")?;
                let to: String = fk_row.try_get("to")?;
                let on_update: String = fk_row.try_get("on_update")?;
                let on_delete: String = fk_row.try_get("on_delete")?;

                // SQLite constraints are anonymous; derive the shared
                // foreign-key name from the first local column.
                let entry = foreign_keys.entry(id).or_insert_with(|| ForeignKey {
                    name: naming::foreign_key_name(&table_name, &from),
                    columns: Vec::new(),
                    referenced_table,
                    referenced_columns: Vec::new(),
                    on_delete: Some(on_delete),
                    on_update: Some(on_update),
                });
                entry.columns.push(from);
                entry.referenced_columns.push(to);
            }

            let mut foreign_keys: Vec<ForeignKey> = foreign_keys.into_values().collect();
            foreign_keys.sort_by(|a, b| a.name.cmp(&b.name));
            table.foreign_keys = foreign_keys;

            schema.add_table(table);
        }

        Ok(schema)
    }
}

fn group_foreign_keys(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKey> {
    let mut foreign_keys: HashMap<String, ForeignKey> = HashMap::new();

    for row in rows {
        let entry = foreign_keys
            .entry(row.constraint_name.clone())
            .or_insert_with(|| ForeignKey {
                name: row.constraint_name.clone(),
                columns: Vec::new(),
                referenced_table: row.referenced_table.clone(),
                referenced_columns: Vec::new(),
                on_delete: Some(row.delete_rule.clone()),
                on_update: Some(row.update_rule.clone()),
            });
        entry.columns.push(row.column_name);
        entry.referenced_columns.push(row.referenced_column);
    }

    let mut foreign_keys: Vec<ForeignKey> = foreign_keys.into_values().collect();
    foreign_keys.sort_by(|a, b| a.name.cmp(&b.name));
    foreign_keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_connection() -> DatabaseConnection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        DatabaseConnection::Sqlite(pool)
    }

    #[tokio::test]
    async fn reads_tables_columns_and_indexes() {
        let connection = memory_connection().await;
        connection
            .execute(
                "CREATE TABLE articles (\n  id integer PRIMARY KEY AUTOINCREMENT NOT NULL,\n  title varchar(255),\n  body text NOT NULL,\n  published boolean DEFAULT 0\n);",
            )
            .await
            .unwrap();
        connection
            .execute("CREATE UNIQUE INDEX articles_title_unique ON articles (title);")
            .await
            .unwrap();

        let schema = SchemaIntrospector::new(connection, None)
            .introspect()
            .await
            .unwrap();

        let table = schema.get_table("articles").expect("articles introspected");

        let id = table.get_column("id").unwrap();
        assert_eq!(id.column_type, ColumnType::Integer);
        assert!(id.primary);

        let title = table.get_column("title").unwrap();
        assert_eq!(title.column_type, ColumnType::String);
        assert_eq!(title.not_nullable, Some(false));

        let body = table.get_column("body").unwrap();
        assert_eq!(body.column_type, ColumnType::Text);
        assert_eq!(body.not_nullable, Some(true));

        let published = table.get_column("published").unwrap();
        assert_eq!(
            published.default_to,
            Some(DefaultValue::Expression("0".to_string()))
        );

        let index = table.get_index("articles_title_unique").unwrap();
        assert_eq!(index.columns, vec!["title".to_string()]);
        assert_eq!(index.index_type, Some(IndexType::Unique));
    }

    #[tokio::test]
    async fn reads_foreign_keys_with_derived_names() {
        let connection = memory_connection().await;
        connection
            .execute("CREATE TABLE authors (id integer PRIMARY KEY AUTOINCREMENT NOT NULL);")
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE articles (\n  id integer PRIMARY KEY AUTOINCREMENT NOT NULL,\n  author_id integer,\n  CONSTRAINT articles_author_id_fk FOREIGN KEY (author_id) REFERENCES authors (id) ON DELETE SET NULL\n);",
            )
            .await
            .unwrap();

        let schema = SchemaIntrospector::new(connection, None)
            .introspect()
            .await
            .unwrap();

        let table = schema.get_table("articles").unwrap();
        let fk = table.get_foreign_key("articles_author_id_fk").unwrap();

        assert_eq!(fk.columns, vec!["author_id".to_string()]);
        assert_eq!(fk.referenced_table, "authors");
        assert_eq!(fk.referenced_columns, vec!["id".to_string()]);
        assert_eq!(fk.on_delete.as_deref(), Some("SET NULL"));
    }

    #[test]
    fn sqlite_type_parsing_covers_declared_types() {
        assert_eq!(parse_sqlite_type("varchar(255)"), ColumnType::String);
        assert_eq!(parse_sqlite_type("TEXT"), ColumnType::Text);
        assert_eq!(parse_sqlite_type("integer"), ColumnType::Integer);
        assert_eq!(
            parse_sqlite_type("decimal(10, 2)"),
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert_eq!(parse_sqlite_type("time"), ColumnType::Time { precision: 3 });
        assert_eq!(
            parse_sqlite_type("datetime"),
            ColumnType::Datetime {
                use_tz: false,
                precision: 6
            }
        );
        assert_eq!(
            parse_sqlite_type("geometry"),
            ColumnType::Unknown("geometry".to_string())
        );
    }
}
