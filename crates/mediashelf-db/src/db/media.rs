use mediashelf_core::models::{Media, NewMedia};
use mediashelf_core::{MediaResult, TableNames};
use sqlx::{PgPool, Postgres};

use crate::store_traits::order_by_keys;

const MEDIA_COLUMNS: &str =
    "id, disk, name, file_name, mime_type, size, data, created_at, updated_at";

/// Repository for media records
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
    table: String,
}

impl MediaRepository {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            table: tables.media.clone(),
        }
    }

    #[tracing::instrument(skip(self, media), fields(db.table = %self.table, db.operation = "insert"))]
    pub async fn create_media(&self, media: NewMedia) -> MediaResult<Media> {
        let sql = format!(
            r#"
            INSERT INTO {} (disk, name, file_name, mime_type, size, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            self.table, MEDIA_COLUMNS
        );

        let created = sqlx::query_as::<Postgres, Media>(&sql)
            .bind(&media.disk)
            .bind(&media.name)
            .bind(&media.file_name)
            .bind(&media.mime_type)
            .bind(media.size)
            .bind(&media.data)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select", db.record_id = %id))]
    pub async fn get_media(&self, id: i64) -> MediaResult<Option<Media>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", MEDIA_COLUMNS, self.table);
        let media = sqlx::query_as::<Postgres, Media>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(media)
    }

    /// Existing media among `ids`, in input order
    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn get_media_many(&self, ids: &[i64]) -> MediaResult<Vec<Media>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ANY($1)",
            MEDIA_COLUMNS, self.table
        );
        let rows = sqlx::query_as::<Postgres, Media>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(order_by_keys(rows, ids, |m| &m.id))
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

    /// Media names are not unique: every match is returned
    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    pub async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name FROM {} WHERE name = ANY($1) ORDER BY id",
            self.table
        );
        let rows = sqlx::query_as::<Postgres, (i64, String)>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await?;
        Ok(order_by_keys(rows, names, |(_, name)| name)
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    #[tracing::instrument(skip(self, media), fields(db.table = %self.table, db.operation = "update", db.record_id = %media.id))]
    pub async fn update_media(&self, media: &Media) -> MediaResult<Option<Media>> {
        let sql = format!(
            r#"
            UPDATE {}
            SET disk = $2, name = $3, file_name = $4, data = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            self.table, MEDIA_COLUMNS
        );

        let updated = sqlx::query_as::<Postgres, Media>(&sql)
            .bind(media.id)
            .bind(&media.disk)
            .bind(&media.name)
            .bind(&media.file_name)
            .bind(&media.data)
            .fetch_optional(&self.pool)
            .await?;

        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "delete", db.record_id = %id))]
    pub async fn delete_media(&self, id: i64) -> MediaResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
