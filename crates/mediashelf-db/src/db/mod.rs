//! Database repositories for the data access layer
//!
//! One repository per table family. Table names come from [`TableNames`] and are
//! validated by `MediaConfig::validate` before they reach any SQL string.
//!
//! [`TableNames`]: mediashelf_core::TableNames

pub mod association;
pub mod collection;
#[allow(clippy::module_inception)]
pub mod media;
pub mod schema;
pub mod transaction;

pub use association::AssociationRepository;
pub use collection::CollectionRepository;
pub use media::MediaRepository;
pub use schema::{initialize_schema, render_migration, render_schema};

use std::time::Duration;

use anyhow::Result;
use mediashelf_core::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect a Postgres pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database connected successfully"
    );

    Ok(pool)
}
