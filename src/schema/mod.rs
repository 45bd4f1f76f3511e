//! Schema module for contentdb
//!
//! This module holds the schema data model, the three-way differ, DDL
//! planning and application, snapshot storage, introspection, and the
//! sync orchestrator.

pub mod builder;
pub mod ddl;
pub mod diff;
pub mod introspect;
pub mod provider;
pub mod storage;
pub mod types;

// Re-export key types
pub use builder::{DropOptions, SchemaBuilder};
pub use ddl::{AlterPhase, DdlPlanner, UpdatePlan, ALTER_PHASES};
pub use diff::{DiffStatus, SchemaDiff, SchemaDiffer};
pub use introspect::SchemaIntrospector;
pub use provider::SchemaProvider;
pub use storage::{SchemaStorage, StoredSchema, SCHEMA_TABLE};
pub use types::{
    Column, ColumnType, DefaultValue, ForeignKey, Index, IndexType, Schema, Table,
};
