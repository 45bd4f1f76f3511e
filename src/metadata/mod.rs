//! Content-type metadata for contentdb
//!
//! This module holds the declarative metadata model and its projection
//! into the logical schema.

pub mod convert;
pub mod types;

// Re-export key types
pub use convert::create_schema;
pub use types::{
    Attribute, ContentType, Metadata, MorphAttribute, RelationAttribute, ScalarAttribute,
};
