//! Three-way schema differ
//!
//! Compares the previously tracked snapshot, the live database schema,
//! and the freshly computed user schema, and classifies every table,
//! column, index, and foreign key as added, updated, unchanged, or
//! removed.
//!
//! Removal obeys an ownership rule: anything absent from the tracked
//! snapshot was never managed by this engine and is left alone, no
//! matter what the user schema says.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::db::dialect::SchemaDialect;
use crate::db::migrations::{INTERNAL_MIGRATIONS_TABLE, MIGRATIONS_TABLE};
use crate::db::store::{CoreStore, CORE_STORE_TABLE};
use crate::error::Result;
use crate::schema::storage::SCHEMA_TABLE;
use crate::schema::types::{
    Column, DefaultValue, ForeignKey, Index, PersistedTable, Schema, Table,
};

/// Internal table names never eligible for automatic removal
pub static RESERVED_TABLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([MIGRATIONS_TABLE, INTERNAL_MIGRATIONS_TABLE, SCHEMA_TABLE])
});

/// Overall diff outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Changed,
    Unchanged,
}

/// Four-way partition of one collection. `updated` entries carry the new
/// target definition; `unchanged` entries keep the database-observed one.
#[derive(Debug, Clone)]
pub struct Buckets<T, U = T> {
    pub added: Vec<T>,
    pub updated: Vec<U>,
    pub unchanged: Vec<T>,
    pub removed: Vec<T>,
}

impl<T, U> Default for Buckets<T, U> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T, U> Buckets<T, U> {
    /// Whether applying this partition would change anything
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }
}

/// An updated column: name plus the full new definition to apply
#[derive(Debug, Clone)]
pub struct ColumnUpdate {
    pub name: String,
    pub object: Column,
}

/// An updated index: name plus the full new definition to apply
#[derive(Debug, Clone)]
pub struct IndexUpdate {
    pub name: String,
    pub object: Index,
}

/// An updated foreign key: name plus the full new definition to apply
#[derive(Debug, Clone)]
pub struct ForeignKeyUpdate {
    pub name: String,
    pub object: ForeignKey,
}

/// Per-table update: the three sub-collection partitions
#[derive(Debug, Clone)]
pub struct TableUpdate {
    pub name: String,
    pub columns: Buckets<Column, ColumnUpdate>,
    pub indexes: Buckets<Index, IndexUpdate>,
    pub foreign_keys: Buckets<ForeignKey, ForeignKeyUpdate>,
}

impl TableUpdate {
    /// Whether any sub-collection changed
    pub fn has_changes(&self) -> bool {
        self.columns.has_changes()
            || self.indexes.has_changes()
            || self.foreign_keys.has_changes()
    }
}

/// The computed diff between the three schemas
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    pub status: DiffStatus,
    pub tables: Buckets<Table, TableUpdate>,
}

/// Three-way schema differ
pub struct SchemaDiffer {
    dialect: Arc<dyn SchemaDialect>,
    store: CoreStore,
}

impl SchemaDiffer {
    /// Create a differ for the given dialect and core store
    pub fn new(dialect: Arc<dyn SchemaDialect>, store: CoreStore) -> Self {
        Self { dialect, store }
    }

    /// Diff the three schemas. `previous` is absent on first run.
    pub async fn diff(
        &self,
        previous: Option<&Schema>,
        database: &Schema,
        user: &Schema,
    ) -> Result<SchemaDiff> {
        let persisted = self.persisted_tables(database).await?;
        Ok(self.compute(previous, database, user, &persisted))
    }

    /// Read the persisted-tables registry. Only consulted when the core
    /// store table itself exists, to avoid bootstrapping cycles.
    async fn persisted_tables(&self, database: &Schema) -> Result<Vec<PersistedTable>> {
        if !database.has_table(CORE_STORE_TABLE) {
            return Ok(Vec::new());
        }

        match self.store.get("core", "persisted_tables").await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn compute(
        &self,
        previous: Option<&Schema>,
        database: &Schema,
        user: &Schema,
        persisted: &[PersistedTable],
    ) -> SchemaDiff {
        let mut tables: Buckets<Table, TableUpdate> = Buckets::default();

        for user_table in &user.tables {
            match database.get_table(&user_table.name) {
                Some(database_table) => {
                    let previous_table = previous.and_then(|p| p.get_table(&user_table.name));
                    let update = self.diff_table(user_table, database_table, previous_table);

                    if update.has_changes() {
                        tables.updated.push(update);
                    } else {
                        tables.unchanged.push(database_table.clone());
                    }
                }
                None => tables.added.push(user_table.clone()),
            }
        }

        let persisted_names: HashSet<&str> =
            persisted.iter().map(|t| t.name.as_str()).collect();

        for database_table in &database.tables {
            if user.has_table(&database_table.name) {
                continue;
            }

            // Tables we never tracked might be hand-created; leave them.
            let tracked = previous.is_some_and(|p| p.has_table(&database_table.name));
            if !tracked {
                continue;
            }

            if RESERVED_TABLES.contains(database_table.name.as_str())
                || persisted_names.contains(database_table.name.as_str())
            {
                continue;
            }

            tables.removed.push(database_table.clone());
        }

        // A persisted table follows any table it depends on out of the
        // schema; dependents no longer present are silently skipped.
        let removed_names: HashSet<String> =
            tables.removed.iter().map(|t| t.name.clone()).collect();

        for persisted_table in persisted {
            let Some(depends_on) = &persisted_table.depends_on else {
                continue;
            };

            if depends_on.iter().any(|dep| removed_names.contains(&dep.name))
                && !removed_names.contains(&persisted_table.name)
            {
                if let Some(table) = database.get_table(&persisted_table.name) {
                    tracing::debug!(
                        table = %persisted_table.name,
                        "Cascading removal of dependent persisted table"
                    );
                    tables.removed.push(table.clone());
                }
            }
        }

        let status = if tables.has_changes() {
            DiffStatus::Changed
        } else {
            DiffStatus::Unchanged
        };

        SchemaDiff { status, tables }
    }

    fn diff_table(
        &self,
        user_table: &Table,
        database_table: &Table,
        previous_table: Option<&Table>,
    ) -> TableUpdate {
        TableUpdate {
            name: user_table.name.clone(),
            columns: self.diff_columns(user_table, database_table, previous_table),
            indexes: self.diff_indexes(user_table, database_table, previous_table),
            foreign_keys: self.diff_foreign_keys(user_table, database_table, previous_table),
        }
    }

    fn diff_columns(
        &self,
        user_table: &Table,
        database_table: &Table,
        previous_table: Option<&Table>,
    ) -> Buckets<Column, ColumnUpdate> {
        let mut buckets = Buckets::default();

        for user_column in &user_table.columns {
            match database_table.get_column(&user_column.name) {
                Some(database_column) => {
                    if self.column_changed(user_column, database_column) {
                        buckets.updated.push(ColumnUpdate {
                            name: user_column.name.clone(),
                            object: user_column.clone(),
                        });
                    } else {
                        buckets.unchanged.push(database_column.clone());
                    }
                }
                None => buckets.added.push(user_column.clone()),
            }
        }

        for database_column in &database_table.columns {
            if user_table.get_column(&database_column.name).is_some() {
                continue;
            }

            let tracked = previous_table
                .is_some_and(|t| t.get_column(&database_column.name).is_some());
            if tracked {
                buckets.removed.push(database_column.clone());
            }
        }

        buckets
    }

    fn column_changed(&self, user_column: &Column, database_column: &Column) -> bool {
        // Auto-increment columns report native integer types that never
        // match the literal `increments` type, so they are exempt.
        let type_changed = !user_column.column_type.is_increments()
            && self.dialect.sql_type(&user_column.column_type)
                != self.dialect.sql_type(&database_column.column_type);

        let not_nullable_changed = user_column.not_nullable != database_column.not_nullable;

        let default_changed =
            !defaults_match(user_column.default_to.as_ref(), database_column.default_to.as_ref());

        let unsigned_changed = self.dialect.supports_unsigned()
            && user_column.unsigned != database_column.unsigned;

        type_changed || not_nullable_changed || default_changed || unsigned_changed
    }

    fn diff_indexes(
        &self,
        user_table: &Table,
        database_table: &Table,
        previous_table: Option<&Table>,
    ) -> Buckets<Index, IndexUpdate> {
        let mut buckets = Buckets::default();

        for user_index in &user_table.indexes {
            match database_table.get_index(&user_index.name) {
                Some(database_index) => {
                    if index_changed(user_index, database_index) {
                        buckets.updated.push(IndexUpdate {
                            name: user_index.name.clone(),
                            object: user_index.clone(),
                        });
                    } else {
                        buckets.unchanged.push(database_index.clone());
                    }
                }
                None => buckets.added.push(user_index.clone()),
            }
        }

        for database_index in &database_table.indexes {
            if user_table.get_index(&database_index.name).is_some() {
                continue;
            }

            let tracked = previous_table
                .is_some_and(|t| t.get_index(&database_index.name).is_some());
            if tracked {
                buckets.removed.push(database_index.clone());
            }
        }

        buckets
    }

    fn diff_foreign_keys(
        &self,
        user_table: &Table,
        database_table: &Table,
        previous_table: Option<&Table>,
    ) -> Buckets<ForeignKey, ForeignKeyUpdate> {
        // Engines that don't manage foreign keys get an all-empty result.
        if !self.dialect.uses_foreign_keys() {
            return Buckets::default();
        }

        let mut buckets = Buckets::default();

        for user_fk in &user_table.foreign_keys {
            match database_table.get_foreign_key(&user_fk.name) {
                Some(database_fk) => {
                    if foreign_key_changed(user_fk, database_fk) {
                        buckets.updated.push(ForeignKeyUpdate {
                            name: user_fk.name.clone(),
                            object: user_fk.clone(),
                        });
                    } else {
                        buckets.unchanged.push(database_fk.clone());
                    }
                }
                None => buckets.added.push(user_fk.clone()),
            }
        }

        for database_fk in &database_table.foreign_keys {
            if user_table.get_foreign_key(&database_fk.name).is_some() {
                continue;
            }

            let tracked = previous_table
                .is_some_and(|t| t.get_foreign_key(&database_fk.name).is_some());
            if tracked {
                buckets.removed.push(database_fk.clone());
            }
        }

        buckets
    }
}

/// Normalize a default for comparison. `None` and the literal string
/// `"null"` both mean "no default".
fn normalize_default(value: Option<&DefaultValue>) -> Option<String> {
    let raw = match value? {
        DefaultValue::Literal(v) | DefaultValue::Expression(v) => v,
    };

    if raw.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(raw.clone())
    }
}

fn defaults_match(user: Option<&DefaultValue>, database: Option<&DefaultValue>) -> bool {
    match (normalize_default(user), normalize_default(database)) {
        (None, None) => true,
        (Some(user), Some(database)) => {
            user.eq_ignore_ascii_case(&database)
                // Engines report string defaults quoted; retry with the
                // database's default wrapped in single quotes.
                || user.eq_ignore_ascii_case(&format!("'{}'", database))
        }
        _ => false,
    }
}

fn index_changed(user_index: &Index, database_index: &Index) -> bool {
    // Column order matters for an index.
    if user_index.columns != database_index.columns {
        return true;
    }

    match (user_index.index_type, database_index.index_type) {
        (Some(user_type), Some(database_type)) => user_type != database_type,
        _ => false,
    }
}

fn normalize_action(action: Option<&str>) -> String {
    match action {
        None => "no action".to_string(),
        Some(a) => a.to_lowercase(),
    }
}

fn foreign_key_changed(user_fk: &ForeignKey, database_fk: &ForeignKey) -> bool {
    let as_set = |columns: &[String]| -> HashSet<String> { columns.iter().cloned().collect() };

    if as_set(&user_fk.columns) != as_set(&database_fk.columns) {
        return true;
    }

    if as_set(&user_fk.referenced_columns) != as_set(&database_fk.referenced_columns) {
        return true;
    }

    if user_fk.referenced_table != database_fk.referenced_table {
        return true;
    }

    if normalize_action(user_fk.on_delete.as_deref())
        != normalize_action(database_fk.on_delete.as_deref())
    {
        return true;
    }

    normalize_action(user_fk.on_update.as_deref())
        != normalize_action(database_fk.on_update.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;
    use crate::db::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use crate::schema::types::{ColumnType, IndexType};
    use pretty_assertions::assert_eq;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> CoreStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        CoreStore::new(DatabaseConnection::Sqlite(pool))
    }

    async fn differ() -> SchemaDiffer {
        SchemaDiffer::new(Arc::new(PostgresDialect), sqlite_store().await)
    }

    fn table_named(name: &str) -> Table {
        let mut table = Table::new(name);
        table.add_column(Column::new("id", ColumnType::Increments).not_nullable(true));
        table
    }

    fn schema_of(tables: Vec<Table>) -> Schema {
        Schema { tables }
    }

    #[tokio::test]
    async fn added_table_when_database_is_empty() {
        let differ = differ().await;
        let user = schema_of(vec![table_named("articles")]);

        let diff = differ
            .diff(None, &Schema::new(), &user)
            .await
            .unwrap();

        assert_eq!(diff.status, DiffStatus::Changed);
        assert_eq!(diff.tables.added.len(), 1);
        assert_eq!(diff.tables.added[0].name, "articles");
        assert!(diff.tables.updated.is_empty());
        assert!(diff.tables.unchanged.is_empty());
        assert!(diff.tables.removed.is_empty());
    }

    #[tokio::test]
    async fn tracked_table_absent_from_user_schema_is_removed() {
        let differ = differ().await;
        let existing = schema_of(vec![table_named("articles")]);

        let diff = differ
            .diff(Some(&existing), &existing, &Schema::new())
            .await
            .unwrap();

        assert_eq!(diff.status, DiffStatus::Changed);
        assert_eq!(diff.tables.removed.len(), 1);
        assert_eq!(diff.tables.removed[0].name, "articles");
    }

    #[tokio::test]
    async fn identical_schemas_are_unchanged() {
        let differ = differ().await;
        let schema = schema_of(vec![table_named("articles")]);

        let diff = differ
            .diff(Some(&schema), &schema, &schema)
            .await
            .unwrap();

        assert_eq!(diff.status, DiffStatus::Unchanged);
        assert_eq!(diff.tables.unchanged.len(), 1);
        assert!(diff.tables.removed.is_empty());
    }

    #[tokio::test]
    async fn gaining_a_column_reports_table_updated() {
        let differ = differ().await;
        let database = schema_of(vec![Table::new("articles")]);

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("test_column", ColumnType::Text).not_nullable(true));
        let user = schema_of(vec![user_table]);

        let diff = differ.diff(None, &database, &user).await.unwrap();

        assert_eq!(diff.status, DiffStatus::Changed);
        assert_eq!(diff.tables.updated.len(), 1);

        let update = &diff.tables.updated[0];
        assert_eq!(update.columns.added.len(), 1);
        assert_eq!(update.columns.added[0].name, "test_column");
        assert!(update.columns.updated.is_empty());
        assert!(update.columns.removed.is_empty());
        assert!(update.indexes.has_changes() == false);
        assert!(update.foreign_keys.has_changes() == false);
    }

    #[tokio::test]
    async fn untracked_tables_are_never_removed() {
        let differ = differ().await;
        // Present in the database, absent from both user and previous.
        let database = schema_of(vec![table_named("operator_notes")]);

        let diff = differ
            .diff(Some(&Schema::new()), &database, &Schema::new())
            .await
            .unwrap();

        assert_eq!(diff.status, DiffStatus::Unchanged);
        assert!(diff.tables.removed.is_empty());
    }

    #[tokio::test]
    async fn reserved_tables_are_never_removed() {
        let differ = differ().await;
        let schema = schema_of(vec![
            table_named(MIGRATIONS_TABLE),
            table_named(INTERNAL_MIGRATIONS_TABLE),
            table_named(SCHEMA_TABLE),
        ]);

        let diff = differ
            .diff(Some(&schema), &schema, &Schema::new())
            .await
            .unwrap();

        assert!(diff.tables.removed.is_empty());
    }

    #[tokio::test]
    async fn persisted_tables_are_protected_and_cascade_with_dependencies() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let connection = DatabaseConnection::Sqlite(pool);
        connection
            .execute(
                "CREATE TABLE strapi_core_store_settings (\"key\" varchar(255), \"value\" text);",
            )
            .await
            .unwrap();
        connection
            .execute(
                "INSERT INTO strapi_core_store_settings (\"key\", \"value\") VALUES \
                 ('core_persisted_tables', '[\"my_table\", \"table2\"]');",
            )
            .await
            .unwrap();

        let differ = SchemaDiffer::new(
            Arc::new(PostgresDialect),
            CoreStore::new(connection),
        );

        let database = schema_of(vec![
            table_named("my_table"),
            table_named("my_table_1"),
            table_named(CORE_STORE_TABLE),
        ]);
        let user = schema_of(vec![table_named(CORE_STORE_TABLE)]);

        let diff = differ
            .diff(Some(&database), &database, &user)
            .await
            .unwrap();

        // `my_table` is persisted and protected; `my_table_1` is not.
        let removed: Vec<&str> = diff.tables.removed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(removed, vec!["my_table_1"]);
    }

    #[tokio::test]
    async fn dependent_persisted_table_is_cascade_removed() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let connection = DatabaseConnection::Sqlite(pool);
        connection
            .execute(
                "CREATE TABLE strapi_core_store_settings (\"key\" varchar(255), \"value\" text);",
            )
            .await
            .unwrap();
        connection
            .execute(
                "INSERT INTO strapi_core_store_settings (\"key\", \"value\") VALUES \
                 ('core_persisted_tables', \
                  '[{\"name\": \"feature_links\", \"dependsOn\": [{\"name\": \"features\"}]}, \
                    {\"name\": \"ghost_links\", \"dependsOn\": [{\"name\": \"features\"}]}]');",
            )
            .await
            .unwrap();

        let differ = SchemaDiffer::new(
            Arc::new(PostgresDialect),
            CoreStore::new(connection),
        );

        // `features` is tracked and dropped by the user schema;
        // `feature_links` depends on it. `ghost_links` is registered but
        // no longer exists in the database, so it is silently skipped.
        let database = schema_of(vec![
            table_named("features"),
            table_named("feature_links"),
            table_named(CORE_STORE_TABLE),
        ]);
        let previous = schema_of(vec![table_named("features")]);
        let user = schema_of(vec![table_named(CORE_STORE_TABLE)]);

        let diff = differ
            .diff(Some(&previous), &database, &user)
            .await
            .unwrap();

        let removed: Vec<&str> = diff.tables.removed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(removed, vec!["features", "feature_links"]);
    }

    #[tokio::test]
    async fn increments_is_exempt_from_type_comparison() {
        let differ = differ().await;

        let mut database_table = Table::new("articles");
        database_table.add_column(Column::new("id", ColumnType::Integer).not_nullable(true));
        let database = schema_of(vec![database_table]);

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("id", ColumnType::Increments).not_nullable(true));
        let user = schema_of(vec![user_table]);

        let diff = differ.diff(None, &database, &user).await.unwrap();

        assert_eq!(diff.status, DiffStatus::Unchanged);
    }

    #[tokio::test]
    async fn type_change_marks_column_updated_with_new_object() {
        let differ = differ().await;

        let mut database_table = Table::new("articles");
        database_table.add_column(Column::new("body", ColumnType::String));
        let database = schema_of(vec![database_table]);

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("body", ColumnType::Text));
        let user = schema_of(vec![user_table]);

        let diff = differ.diff(None, &database, &user).await.unwrap();

        let update = &diff.tables.updated[0];
        assert_eq!(update.columns.updated.len(), 1);
        assert_eq!(update.columns.updated[0].name, "body");
        assert_eq!(update.columns.updated[0].object.column_type, ColumnType::Text);
    }

    #[test]
    fn default_comparison_normalizes_null_and_quoting() {
        let none: Option<&DefaultValue> = None;
        let null_literal = DefaultValue::Literal("null".to_string());
        let draft = DefaultValue::Expression("'draft'".to_string());
        let draft_unquoted = DefaultValue::Literal("draft".to_string());

        assert!(defaults_match(none, Some(&null_literal)));
        assert!(defaults_match(Some(&null_literal), none));
        // Database reports the bare value; user declared it quoted.
        assert!(defaults_match(Some(&draft), Some(&draft_unquoted)));
        // Case-insensitive match.
        assert!(defaults_match(
            Some(&DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())),
            Some(&DefaultValue::Expression("current_timestamp".to_string()))
        ));
        assert!(!defaults_match(Some(&draft), none));
    }

    #[tokio::test]
    async fn unsigned_is_compared_only_when_supported() {
        let store = sqlite_store().await;
        let mysql_differ = SchemaDiffer::new(Arc::new(MySqlDialect), store);

        let mut database_table = Table::new("articles");
        database_table.add_column(Column::new("count", ColumnType::Integer));
        let database = schema_of(vec![database_table]);

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("count", ColumnType::Integer).unsigned(true));
        let user = schema_of(vec![user_table]);

        let diff = mysql_differ.diff(None, &database, &user).await.unwrap();
        assert_eq!(diff.status, DiffStatus::Changed);

        // Postgres has no unsigned types; the same input is a no-op.
        let pg_differ = differ().await;
        let diff = pg_differ.diff(None, &database, &user).await.unwrap();
        assert_eq!(diff.status, DiffStatus::Unchanged);
    }

    #[test]
    fn index_comparison_is_order_sensitive() {
        let user = Index {
            name: "idx".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            index_type: None,
        };
        let mut database = user.clone();
        assert!(!index_changed(&user, &database));

        database.columns.reverse();
        assert!(index_changed(&user, &database));

        // Type only compared when both sides specify one.
        let typed = Index {
            index_type: Some(IndexType::Unique),
            ..user.clone()
        };
        assert!(!index_changed(&user, &typed));
        assert!(!index_changed(&typed, &user));

        let primary = Index {
            index_type: Some(IndexType::Primary),
            ..user.clone()
        };
        assert!(index_changed(&typed, &primary));
    }

    #[test]
    fn foreign_key_actions_normalize_no_action() {
        let user = ForeignKey {
            name: "fk".to_string(),
            columns: vec!["author_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: Some("NO ACTION".to_string()),
        };
        let database = ForeignKey {
            on_delete: Some("no action".to_string()),
            on_update: None,
            ..user.clone()
        };

        assert!(!foreign_key_changed(&user, &database));

        let changed = ForeignKey {
            on_delete: Some("CASCADE".to_string()),
            ..user.clone()
        };
        assert!(foreign_key_changed(&changed, &database));
    }

    #[tokio::test]
    async fn sqlite_skips_foreign_key_diffing() {
        let store = sqlite_store().await;
        let differ = SchemaDiffer::new(Arc::new(SqliteDialect), store);

        let mut database_table = Table::new("articles");
        database_table.add_column(Column::new("author_id", ColumnType::Integer));
        let database = schema_of(vec![database_table]);

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("author_id", ColumnType::Integer));
        user_table.add_foreign_key(ForeignKey {
            name: "articles_author_id_fk".to_string(),
            columns: vec!["author_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: Some("SET NULL".to_string()),
            on_update: None,
        });
        let user = schema_of(vec![user_table]);

        let diff = differ.diff(None, &database, &user).await.unwrap();

        assert_eq!(diff.status, DiffStatus::Unchanged);
    }

    #[tokio::test]
    async fn rediffing_converged_state_is_unchanged() {
        let differ = differ().await;

        let mut user_table = Table::new("articles");
        user_table.add_column(Column::new("id", ColumnType::Increments).not_nullable(true));
        user_table.add_column(Column::new("title", ColumnType::String));
        let user = schema_of(vec![user_table]);

        // First run: everything is added.
        let diff = differ.diff(None, &Schema::new(), &user).await.unwrap();
        assert_eq!(diff.status, DiffStatus::Changed);

        // After applying, the database matches the user schema and the
        // snapshot tracks it; a second diff converges to unchanged.
        let diff = differ.diff(Some(&user), &user, &user).await.unwrap();
        assert_eq!(diff.status, DiffStatus::Unchanged);
    }
}
