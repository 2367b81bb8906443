use mediashelf_core::models::Collection;
use mediashelf_core::{MediaResult, TableNames};
use sqlx::{PgPool, Postgres};

use crate::store_traits::order_by_keys;

const COLLECTION_COLUMNS: &str = "id, name, created_at, updated_at";

/// Repository for collections
///
/// Collection names are unique (enforced by the schema).
#[derive(Clone)]
pub struct CollectionRepository {
    pool: PgPool,
    table: String,
}

impl CollectionRepository {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            table: tables.collections.clone(),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "insert"))]
    pub async fn create_collection(&self, name: &str) -> MediaResult<Collection> {
        let sql = format!(
            "INSERT INTO {} (name) VALUES ($1) RETURNING {}",
            self.table, COLLECTION_COLUMNS
        );
        let collection = sqlx::query_as::<Postgres, Collection>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "upsert"))]
    pub async fn first_or_create(&self, name: &str) -> MediaResult<Collection> {
        let insert = format!(
            "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING {}",
            self.table, COLLECTION_COLUMNS
        );
        let created = sqlx::query_as::<Postgres, Collection>(&insert)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(collection) = created {
            tracing::debug!(collection_id = collection.id, "Collection created");
            return Ok(collection);
        }

        let select = format!(
            "SELECT {} FROM {} WHERE name = $1",
            COLLECTION_COLUMNS, self.table
        );
        let existing = sqlx::query_as::<Postgres, Collection>(&select)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(existing)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select", db.record_id = %id))]
    pub async fn get_collection(&self, id: i64) -> MediaResult<Option<Collection>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            COLLECTION_COLUMNS, self.table
        );
        let collection = sqlx::query_as::<Postgres, Collection>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn get_collection_by_name(&self, name: &str) -> MediaResult<Option<Collection>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE name = $1",
            COLLECTION_COLUMNS, self.table
        );
        let collection = sqlx::query_as::<Postgres, Collection>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn get_collections(&self, ids: &[i64]) -> MediaResult<Vec<Collection>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ANY($1)",
            COLLECTION_COLUMNS, self.table
        );
        let rows = sqlx::query_as::<Postgres, Collection>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(order_by_keys(rows, ids, |c| &c.id))
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn list_collections(&self) -> MediaResult<Vec<Collection>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY name ASC",
            COLLECTION_COLUMNS, self.table
        );
        let rows = sqlx::query_as::<Postgres, Collection>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT id FROM {} WHERE id = ANY($1)", self.table);
        let found = sqlx::query_scalar::<Postgres, i64>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(order_by_keys(found, ids, |id| id))
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT id, name FROM {} WHERE name = ANY($1)", self.table);
        let rows = sqlx::query_as::<Postgres, (i64, String)>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await?;
        Ok(order_by_keys(rows, names, |(_, name)| name)
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Join rows go with it (ON DELETE CASCADE)
    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "delete", db.record_id = %id))]
    pub async fn delete_collection(&self, id: i64) -> MediaResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
