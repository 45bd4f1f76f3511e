//! Type definitions for database schema objects

use serde::{Deserialize, Serialize};

/// Represents a complete logical database schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Add a table to the schema
    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Find a table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Check whether a table with the given name exists
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }
}

/// Represents a database table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Find a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find an index by name
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Find a foreign key by name
    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Add a foreign key to the table
    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        self.foreign_keys.push(fk);
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub default_to: Option<DefaultValue>,
    /// Tri-state nullability: `None` means "unspecified, don't enforce"
    pub not_nullable: Option<bool>,
    pub unsigned: Option<bool>,
    pub unique: bool,
    pub primary: bool,
}

impl Column {
    /// Create a new column with the given name and type
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            default_to: None,
            not_nullable: None,
            unsigned: None,
            unique: false,
            primary: false,
        }
    }

    /// Set the nullability constraint
    pub fn not_nullable(mut self, not_nullable: bool) -> Self {
        self.not_nullable = Some(not_nullable);
        self
    }

    /// Set a default value
    pub fn default_to(mut self, default: DefaultValue) -> Self {
        self.default_to = Some(default);
        self
    }

    /// Mark the column unsigned
    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = Some(unsigned);
        self
    }
}

/// Logical column type. Type-specific constructor arguments live in the
/// variant payload so a column definition is self-contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Auto-incrementing integer primary key
    Increments,
    String,
    Text,
    Jsonb,
    Integer,
    BigInteger,
    Double,
    Decimal { precision: u8, scale: u8 },
    Date,
    Time { precision: u8 },
    Datetime { use_tz: bool, precision: u8 },
    Timestamp { use_tz: bool, precision: u8 },
    Boolean,
    /// A native type observed during introspection with no logical
    /// equivalent. Rendered verbatim; never produced by the converter.
    Unknown(String),
}

impl ColumnType {
    /// Whether this is an auto-increment column type
    pub fn is_increments(&self) -> bool {
        matches!(self, ColumnType::Increments)
    }
}

/// A column default: either a literal value or a raw SQL expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Literal(String),
    Expression(String),
}

/// Represents an index. `index_type` of `None` is a plain secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: Option<IndexType>,
}

/// Index kind beyond a plain secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Primary,
    Unique,
}

/// Represents a foreign key constraint. Absent `on_delete`/`on_update`
/// actions compare equal to `NO ACTION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// A table explicitly marked as externally owned, read from the core
/// store under the `persisted_tables` key. Never proposed for removal,
/// but removed alongside any table it declares a `depends_on` edge to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedTable {
    pub name: String,
    #[serde(rename = "dependsOn", skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<PersistedTableRef>>,
}

/// A dependency edge in the persisted-tables registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTableRef {
    pub name: String,
}

// The registry value accepts both bare name strings and full objects;
// both normalize to `PersistedTable`.
impl<'de> Deserialize<'de> for PersistedTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Name(String),
            Table {
                name: String,
                #[serde(default, rename = "dependsOn")]
                depends_on: Option<Vec<PersistedTableRef>>,
            },
        }

        match Entry::deserialize(deserializer)? {
            Entry::Name(name) => Ok(PersistedTable {
                name,
                depends_on: None,
            }),
            Entry::Table { name, depends_on } => Ok(PersistedTable { name, depends_on }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn schema_serialization_round_trips() {
        let mut table = Table::new("articles");
        table.add_column(Column::new("id", ColumnType::Increments).not_nullable(true));
        table.add_column(
            Column::new("published_at", ColumnType::Datetime {
                use_tz: false,
                precision: 6,
            })
            .default_to(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())),
        );
        table.add_index(Index {
            name: "articles_id_pk".to_string(),
            columns: vec!["id".to_string()],
            index_type: Some(IndexType::Primary),
        });
        table.add_foreign_key(ForeignKey {
            name: "articles_author_id_fk".to_string(),
            columns: vec!["author_id".to_string()],
            referenced_table: "authors".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: Some("SET NULL".to_string()),
            on_update: None,
        });

        let mut schema = Schema::new();
        schema.add_table(table);

        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();

        assert_eq!(schema, parsed);
    }

    #[test]
    fn persisted_tables_accept_both_forms() {
        let value = serde_json::json!([
            "bare_table",
            { "name": "feature_links", "dependsOn": [{ "name": "features" }] }
        ]);

        let tables: Vec<PersistedTable> = serde_json::from_value(value).unwrap();

        assert_eq!(tables[0].name, "bare_table");
        assert_eq!(tables[0].depends_on, None);
        assert_eq!(tables[1].name, "feature_links");
        assert_eq!(
            tables[1].depends_on.as_ref().unwrap()[0].name,
            "features"
        );
    }
}
