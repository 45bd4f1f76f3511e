//! Schema sync orchestration
//!
//! Decides on each boot whether the database needs to be brought into
//! agreement with the current metadata, and drives the full
//! introspect-diff-apply-persist cycle when it does.

use crate::config::SettingsConfig;
use crate::db::migrations::MigrationRunner;
use crate::error::Result;
use crate::metadata::{self, Metadata};
use crate::schema::builder::{DropOptions, SchemaBuilder};
use crate::schema::diff::{DiffStatus, SchemaDiffer};
use crate::schema::introspect::SchemaIntrospector;
use crate::schema::storage::SchemaStorage;
use crate::schema::types::Schema;
use crate::DatabaseContext;

/// Top-level schema sync coordinator
pub struct SchemaProvider {
    settings: SettingsConfig,
    metadata: Metadata,
    storage: SchemaStorage,
    differ: SchemaDiffer,
    builder: SchemaBuilder,
    migrations: MigrationRunner,
    introspector: SchemaIntrospector,
}

impl SchemaProvider {
    /// Create a provider over the given context and metadata
    pub fn new(context: &DatabaseContext, metadata: Metadata) -> Self {
        let connection = context.connection.clone();
        let dialect = context.dialect.clone();
        let settings = context.config.settings.clone();

        Self {
            storage: SchemaStorage::new(connection.clone(), dialect.clone()),
            differ: SchemaDiffer::new(dialect.clone(), context.store.clone()),
            builder: SchemaBuilder::new(
                connection.clone(),
                dialect.clone(),
                settings.force_migration,
            ),
            migrations: MigrationRunner::new(
                connection.clone(),
                dialect,
                settings.migrations_dir.clone(),
            ),
            introspector: SchemaIntrospector::new(
                connection,
                context.config.database.schema.clone(),
            ),
            settings,
            metadata,
        }
    }

    /// The desired schema, recomputed fresh from metadata
    fn user_schema(&self) -> Result<Schema> {
        metadata::create_schema(&self.metadata)
    }

    /// Sync if needed. Pending migrations or a missing snapshot force a
    /// full cycle; otherwise a hash comparison against the stored
    /// snapshot decides, avoiding live introspection entirely when
    /// nothing changed.
    pub async fn sync(&self) -> Result<()> {
        if self.settings.run_migrations && self.migrations.has_pending().await? {
            self.migrations.run_pending().await?;
            // Migrations changed the database out from under the
            // tracked snapshot; a full sync is unconditional.
            return self.sync_schema().await;
        }

        let Some(stored) = self.storage.read().await? else {
            tracing::info!("No schema snapshot found, running first sync");
            return self.sync_schema().await;
        };

        let hash = SchemaStorage::hash_schema(&self.user_schema()?);
        if stored.hash != hash {
            tracing::info!("Schema hash changed, syncing");
            return self.sync_schema().await;
        }

        tracing::debug!("Schema unchanged, skipping sync");
        Ok(())
    }

    /// Full three-way cycle: introspect, diff against the tracked
    /// snapshot and the fresh user schema, apply, persist. The snapshot
    /// is re-persisted even when nothing changed; that keeps its
    /// timestamp fresh and self-heals a corrupted slot.
    pub async fn sync_schema(&self) -> Result<()> {
        let user_schema = self.user_schema()?;
        let database_schema = self.introspector.introspect().await?;
        let previous = self.storage.read().await?;

        let diff = self
            .differ
            .diff(
                previous.as_ref().map(|stored| &stored.schema),
                &database_schema,
                &user_schema,
            )
            .await?;

        if diff.status == DiffStatus::Changed {
            tracing::info!(
                added = diff.tables.added.len(),
                updated = diff.tables.updated.len(),
                removed = diff.tables.removed.len(),
                "Applying schema changes"
            );
            self.builder.update_schema(&diff).await?;
        }

        self.storage.add(&user_schema).await?;

        Ok(())
    }

    /// Drop and recreate the whole schema from scratch
    pub async fn reset(&self) -> Result<()> {
        let user_schema = self.user_schema()?;

        self.builder
            .drop_schema(&user_schema, DropOptions::default())
            .await?;
        self.storage.clear().await?;
        self.builder.create_schema(&user_schema).await?;
        self.storage.add(&user_schema).await?;

        Ok(())
    }
}
