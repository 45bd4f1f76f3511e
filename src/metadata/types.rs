//! Content-type metadata definitions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::types::{ColumnType, DefaultValue};

/// An ordered collection of content-type definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub content_types: Vec<ContentType>,
}

impl Metadata {
    /// Create an empty metadata collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a content type
    pub fn add(&mut self, content_type: ContentType) {
        self.content_types.push(content_type);
    }
}

/// A single content-type definition: a table name plus an ordered map of
/// attribute definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentType {
    pub uid: String,
    pub table_name: String,
    pub attributes: IndexMap<String, Attribute>,
}

impl ContentType {
    /// Create a content type with no attributes
    pub fn new(uid: &str, table_name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            table_name: table_name.to_string(),
            attributes: IndexMap::new(),
        }
    }

    /// Add an attribute definition
    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
    }
}

/// An attribute definition, already resolved from any component or
/// dynamic-zone wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Scalar(ScalarAttribute),
    /// A relation that owns its join column on this table
    Relation(RelationAttribute),
    /// A polymorphic relation: the referenced table varies per row
    Morph(MorphAttribute),
}

/// A scalar attribute. `kind` is the logical type name; unrecognized
/// kinds are fatal during conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalarAttribute {
    pub kind: String,
    /// Physical column name; defaults to the attribute name
    pub column_name: Option<String>,
    pub required: Option<bool>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
    pub default: Option<DefaultValue>,
}

impl ScalarAttribute {
    /// Create a scalar attribute of the given logical kind
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }
}

/// A relation attribute owning a join column on this table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationAttribute {
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    /// Join column type override; defaults to an unsigned integer
    pub column_type: Option<ColumnType>,
}

impl RelationAttribute {
    /// Create a relation attribute targeting `referenced_table.referenced_column`
    pub fn new(column_name: &str, referenced_table: &str, referenced_column: &str) -> Self {
        Self {
            column_name: column_name.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
            on_delete: None,
            on_update: None,
            column_type: None,
        }
    }
}

/// A polymorphic relation attribute: an id column plus a type
/// discriminator column, with no foreign key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphAttribute {
    /// Base for the `<base>_id` / `<base>_type` column pair; defaults to
    /// the attribute name
    pub column_base: Option<String>,
}
