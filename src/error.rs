//! Error types for contentdb

use thiserror::Error;

/// Result type for contentdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for contentdb
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Schema introspection error: {0}")]
    IntrospectionError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Unknown attribute type `{kind}` for attribute `{attribute}` of `{content_type}`")]
    UnknownAttributeType {
        content_type: String,
        attribute: String,
        kind: String,
    },

    #[error("Schema storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convert Serde JSON errors to contentdb errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to contentdb errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
