use mediashelf_core::models::{AssociationDelta, AssociationOp, AssociationScope, Mediable};
use mediashelf_core::{MediaResult, TableNames};
use sqlx::{PgConnection, PgPool, Postgres};

use super::transaction::TransactionGuard;

/// Repository for the collection_media and mediables join tables
#[derive(Clone)]
pub struct AssociationRepository {
    pool: PgPool,
    collection_media: String,
    mediables: String,
}

impl AssociationRepository {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            collection_media: tables.collection_media.clone(),
            mediables: tables.mediables.clone(),
        }
    }

    fn table_for(&self, scope: &AssociationScope) -> &str {
        match scope {
            AssociationScope::Channel { .. } => &self.mediables,
            _ => &self.collection_media,
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table_for(scope), db.operation = "select"))]
    pub async fn associated_ids(&self, scope: &AssociationScope) -> MediaResult<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        self.current_ids(&mut conn, scope).await
    }

    /// Apply `op` to `scope` in one transaction, serialized per scope
    #[tracing::instrument(skip(self), fields(db.table = %self.table_for(scope), db.operation = "reconcile"))]
    pub async fn reconcile(
        &self,
        scope: &AssociationScope,
        op: &AssociationOp,
    ) -> MediaResult<AssociationDelta> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        tx.advisory_lock(&scope.lock_key()).await?;

        let current = self.current_ids(&mut tx, scope).await?;
        let delta = AssociationDelta::plan(&current, op);

        if !delta.detach.is_empty() {
            self.delete_ids(&mut tx, scope, &delta.detach).await?;
        }
        if !delta.attach.is_empty() {
            self.insert_ids(&mut tx, scope, &delta.attach).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            attached = delta.attach.len(),
            detached = delta.detach.len(),
            "Association reconciled"
        );

        Ok(delta)
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.mediables, db.operation = "select"))]
    pub async fn mediables_of(&self, media_id: i64) -> MediaResult<Vec<Mediable>> {
        let sql = format!(
            "SELECT id, media_id, mediable_id, mediable_type, channel FROM {} WHERE media_id = $1 ORDER BY id",
            self.mediables
        );
        let rows = sqlx::query_as::<Postgres, Mediable>(&sql)
            .bind(media_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn current_ids(
        &self,
        conn: &mut PgConnection,
        scope: &AssociationScope,
    ) -> MediaResult<Vec<i64>> {
        let ids = match scope {
            AssociationScope::CollectionsOfMedia(media_id) => {
                let sql = format!(
                    "SELECT collection_id FROM {} WHERE media_id = $1 ORDER BY collection_id",
                    self.collection_media
                );
                sqlx::query_scalar::<Postgres, i64>(&sql)
                    .bind(media_id)
                    .fetch_all(&mut *conn)
                    .await?
            }
            AssociationScope::MediaOfCollection(collection_id) => {
                let sql = format!(
                    "SELECT media_id FROM {} WHERE collection_id = $1 ORDER BY media_id",
                    self.collection_media
                );
                sqlx::query_scalar::<Postgres, i64>(&sql)
                    .bind(collection_id)
                    .fetch_all(&mut *conn)
                    .await?
            }
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => {
                let sql = format!(
                    "SELECT media_id FROM {} WHERE mediable_type = $1 AND mediable_id = $2 AND channel = $3 ORDER BY id",
                    self.mediables
                );
                sqlx::query_scalar::<Postgres, i64>(&sql)
                    .bind(owner_type)
                    .bind(owner_id)
                    .bind(channel)
                    .fetch_all(&mut *conn)
                    .await?
            }
        };
        Ok(ids)
    }

    async fn delete_ids(
        &self,
        conn: &mut PgConnection,
        scope: &AssociationScope,
        ids: &[i64],
    ) -> MediaResult<u64> {
        let result = match scope {
            AssociationScope::CollectionsOfMedia(media_id) => {
                let sql = format!(
                    "DELETE FROM {} WHERE media_id = $1 AND collection_id = ANY($2)",
                    self.collection_media
                );
                sqlx::query(&sql)
                    .bind(media_id)
                    .bind(ids)
                    .execute(&mut *conn)
                    .await?
            }
            AssociationScope::MediaOfCollection(collection_id) => {
                let sql = format!(
                    "DELETE FROM {} WHERE collection_id = $1 AND media_id = ANY($2)",
                    self.collection_media
                );
                sqlx::query(&sql)
                    .bind(collection_id)
                    .bind(ids)
                    .execute(&mut *conn)
                    .await?
            }
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => {
                let sql = format!(
                    "DELETE FROM {} WHERE mediable_type = $1 AND mediable_id = $2 AND channel = $3 AND media_id = ANY($4)",
                    self.mediables
                );
                sqlx::query(&sql)
                    .bind(owner_type)
                    .bind(owner_id)
                    .bind(channel)
                    .bind(ids)
                    .execute(&mut *conn)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn insert_ids(
        &self,
        conn: &mut PgConnection,
        scope: &AssociationScope,
        ids: &[i64],
    ) -> MediaResult<u64> {
        // WITH ORDINALITY keeps the desired order in the mediables id sequence
        let result = match scope {
            AssociationScope::CollectionsOfMedia(media_id) => {
                let sql = format!(
                    "INSERT INTO {} (collection_id, media_id) SELECT UNNEST($2::BIGINT[]), $1 ON CONFLICT DO NOTHING",
                    self.collection_media
                );
                sqlx::query(&sql)
                    .bind(media_id)
                    .bind(ids)
                    .execute(&mut *conn)
                    .await?
            }
            AssociationScope::MediaOfCollection(collection_id) => {
                let sql = format!(
                    "INSERT INTO {} (collection_id, media_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
                    self.collection_media
                );
                sqlx::query(&sql)
                    .bind(collection_id)
                    .bind(ids)
                    .execute(&mut *conn)
                    .await?
            }
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => {
                let sql = format!(
                    r#"
                    INSERT INTO {} (media_id, mediable_id, mediable_type, channel)
                    SELECT t.media_id, $2, $3, $4
                    FROM UNNEST($1::BIGINT[]) WITH ORDINALITY AS t(media_id, ord)
                    ORDER BY t.ord
                    ON CONFLICT DO NOTHING
                    "#,
                    self.mediables
                );
                sqlx::query(&sql)
                    .bind(ids)
                    .bind(owner_id)
                    .bind(owner_type)
                    .bind(channel)
                    .execute(&mut *conn)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }
}
