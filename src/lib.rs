//! contentdb: a database schema synchronization engine for
//! content-type driven applications
//!
//! contentdb projects declarative content-type metadata into a logical
//! schema, compares it three ways against the live database and the last
//! tracked snapshot, and applies the minimal DDL needed to converge,
//! without ever touching tables it does not own.

pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod schema;
pub mod utils;

use std::sync::Arc;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use db::dialect::SchemaDialect;
pub use db::store::CoreStore;
pub use error::{Error, Result};
pub use metadata::Metadata;
pub use schema::diff::{SchemaDiff, SchemaDiffer};
pub use schema::provider::SchemaProvider;
pub use schema::types::Schema;

/// Initialize contentdb from a configuration file
pub async fn init(config_path: &str) -> Result<Database> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(&config.logging)?;
    Database::connect(config).await
}

/// Everything the schema machinery needs, threaded explicitly instead
/// of through ambient globals
#[derive(Clone)]
pub struct DatabaseContext {
    pub connection: DatabaseConnection,
    pub dialect: Arc<dyn SchemaDialect>,
    pub store: CoreStore,
    pub config: Config,
}

impl DatabaseContext {
    /// Connect and assemble a context from configuration
    pub async fn connect(config: Config) -> Result<Self> {
        let dialect = db::dialect::dialect_from_driver(&config.database.driver)?;
        let connection = DatabaseConnection::connect(&config.database).await?;
        let store = CoreStore::new(connection.clone());

        Ok(Self {
            connection,
            dialect,
            store,
            config,
        })
    }
}

/// The main client for interacting with contentdb
pub struct Database {
    context: DatabaseContext,
}

impl Database {
    /// Connect to the database described by the configuration
    pub async fn connect(config: Config) -> Result<Self> {
        Ok(Self {
            context: DatabaseContext::connect(config).await?,
        })
    }

    /// The underlying context
    pub fn context(&self) -> &DatabaseContext {
        &self.context
    }

    /// Build a schema provider over the given metadata
    pub fn schema_provider(&self, metadata: Metadata) -> SchemaProvider {
        SchemaProvider::new(&self.context, metadata)
    }

    /// Read the live database schema
    pub async fn introspect_schema(&self) -> Result<Schema> {
        schema::introspect::SchemaIntrospector::new(
            self.context.connection.clone(),
            self.context.config.database.schema.clone(),
        )
        .introspect()
        .await
    }

    /// Complete workflow: compute the user schema from metadata and
    /// bring the database into agreement with it if needed
    pub async fn sync_schema(&self, metadata: Metadata) -> Result<()> {
        self.schema_provider(metadata).sync().await
    }
}
