//! Schema rendering and initialization
//!
//! The DDL is rendered from the configured table names so the same text can be executed
//! at startup or published as a migration file.

use mediashelf_core::{MediaResult, TableNames};
use sqlx::PgPool;

use super::transaction::TransactionGuard;

/// Render the idempotent DDL for all four tables
pub fn render_schema(tables: &TableNames) -> String {
    let TableNames {
        media,
        collections,
        collection_media,
        mediables,
    } = tables;

    format!(
        r#"CREATE TABLE IF NOT EXISTS {media} (
    id BIGSERIAL PRIMARY KEY,
    disk TEXT NOT NULL,
    name TEXT NOT NULL,
    file_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size BIGINT NOT NULL CHECK (size >= 0),
    data JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS {media}_name_idx ON {media} (name);

CREATE TABLE IF NOT EXISTS {collections} (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS {collection_media} (
    collection_id BIGINT NOT NULL REFERENCES {collections} (id) ON DELETE CASCADE,
    media_id BIGINT NOT NULL REFERENCES {media} (id) ON DELETE CASCADE,
    PRIMARY KEY (collection_id, media_id)
);

CREATE INDEX IF NOT EXISTS {collection_media}_media_id_idx ON {collection_media} (media_id);

CREATE TABLE IF NOT EXISTS {mediables} (
    id BIGSERIAL PRIMARY KEY,
    media_id BIGINT NOT NULL REFERENCES {media} (id) ON DELETE CASCADE,
    mediable_id BIGINT NOT NULL,
    mediable_type TEXT NOT NULL,
    channel TEXT NOT NULL DEFAULT 'default',
    UNIQUE (media_id, mediable_id, mediable_type, channel)
);

CREATE INDEX IF NOT EXISTS {mediables}_mediable_id_idx ON {mediables} (mediable_id);
CREATE INDEX IF NOT EXISTS {mediables}_mediable_type_idx ON {mediables} (mediable_type);
"#
    )
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render the schema plus the default collection seed, for publishing as a migration
pub fn render_migration(tables: &TableNames, default_collection: &str) -> String {
    format!(
        "{}\nINSERT INTO {} (name) VALUES ({}) ON CONFLICT (name) DO NOTHING;\n",
        render_schema(tables),
        tables.collections,
        quote_literal(default_collection)
    )
}

/// Create the tables if missing and seed the default collection
#[tracing::instrument(skip(pool, tables), fields(db.operation = "migrate"))]
pub async fn initialize_schema(
    pool: &PgPool,
    tables: &TableNames,
    default_collection: &str,
) -> MediaResult<()> {
    let ddl = render_schema(tables);
    let seed = format!(
        "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
        tables.collections
    );

    let mut tx = TransactionGuard::begin(pool).await?;
    sqlx::Executor::execute(&mut **tx, sqlx::raw_sql(&ddl)).await?;
    sqlx::query(&seed)
        .bind(default_collection)
        .execute(&mut **tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Media schema initialized");
    Ok(())
}
