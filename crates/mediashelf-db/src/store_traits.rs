//! Store trait abstractions
//!
//! These traits define the persistence interface the services need, so the same services
//! run against Postgres or the in-memory catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use mediashelf_core::models::{
    AssociationDelta, AssociationOp, AssociationScope, Collection, Media, Mediable, NewMedia,
};
use mediashelf_core::MediaResult;

use crate::db::{AssociationRepository, CollectionRepository, MediaRepository};

/// Existence checks used by the reference resolver
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// The subset of `ids` that exist, in input order
    async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>>;

    /// Ids of every entity whose name is in `names`, grouped in `names` order
    async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>>;
}

#[async_trait]
pub trait MediaStore: EntityLookup {
    async fn insert(&self, media: NewMedia) -> MediaResult<Media>;

    async fn find(&self, id: i64) -> MediaResult<Option<Media>>;

    /// Existing records among `ids`, in input order
    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Media>>;

    /// Persist `disk`, `name`, `file_name` and `data`; bumps `updated_at`
    async fn update(&self, media: &Media) -> MediaResult<Option<Media>>;

    /// Delete the row (cascading join rows); false when it did not exist
    async fn delete(&self, id: i64) -> MediaResult<bool>;
}

#[async_trait]
pub trait CollectionStore: EntityLookup {
    async fn insert(&self, name: &str) -> MediaResult<Collection>;

    /// Return the collection named `name`, creating it when missing
    async fn first_or_create(&self, name: &str) -> MediaResult<Collection>;

    async fn find(&self, id: i64) -> MediaResult<Option<Collection>>;

    async fn find_by_name(&self, name: &str) -> MediaResult<Option<Collection>>;

    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Collection>>;

    async fn list(&self) -> MediaResult<Vec<Collection>>;

    /// Delete the row and its join rows; media rows are untouched
    async fn delete(&self, id: i64) -> MediaResult<bool>;
}

#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Current ids inside `scope`, in stored order
    async fn associated_ids(&self, scope: &AssociationScope) -> MediaResult<Vec<i64>>;

    /// Read the current ids, plan `op` against them and apply the delta, atomically
    async fn reconcile(
        &self,
        scope: &AssociationScope,
        op: &AssociationOp,
    ) -> MediaResult<AssociationDelta>;

    /// Every owner link of a media item
    async fn mediables_of(&self, media_id: i64) -> MediaResult<Vec<Mediable>>;
}

/// Reorder `items` to follow `keys`, dropping items whose key is absent.
pub(crate) fn order_by_keys<T, K, F>(items: Vec<T>, keys: &[K], key_of: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> &K,
{
    let position: HashMap<&K, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let mut ranked: Vec<(usize, T)> = items
        .into_iter()
        .filter_map(|item| position.get(key_of(&item)).copied().map(|rank| (rank, item)))
        .collect();
    // stable, so rows sharing a key keep their query order
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, item)| item).collect()
}

// Implementations for the Postgres repositories

#[async_trait]
impl EntityLookup for MediaRepository {
    async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>> {
        self.existing_ids(ids).await
    }

    async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        self.ids_by_names(names).await
    }
}

#[async_trait]
impl MediaStore for MediaRepository {
    async fn insert(&self, media: NewMedia) -> MediaResult<Media> {
        self.create_media(media).await
    }

    async fn find(&self, id: i64) -> MediaResult<Option<Media>> {
        self.get_media(id).await
    }

    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Media>> {
        self.get_media_many(ids).await
    }

    async fn update(&self, media: &Media) -> MediaResult<Option<Media>> {
        self.update_media(media).await
    }

    async fn delete(&self, id: i64) -> MediaResult<bool> {
        self.delete_media(id).await
    }
}

#[async_trait]
impl EntityLookup for CollectionRepository {
    async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>> {
        self.existing_ids(ids).await
    }

    async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        self.ids_by_names(names).await
    }
}

#[async_trait]
impl CollectionStore for CollectionRepository {
    async fn insert(&self, name: &str) -> MediaResult<Collection> {
        self.create_collection(name).await
    }

    async fn first_or_create(&self, name: &str) -> MediaResult<Collection> {
        self.first_or_create(name).await
    }

    async fn find(&self, id: i64) -> MediaResult<Option<Collection>> {
        self.get_collection(id).await
    }

    async fn find_by_name(&self, name: &str) -> MediaResult<Option<Collection>> {
        self.get_collection_by_name(name).await
    }

    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Collection>> {
        self.get_collections(ids).await
    }

    async fn list(&self) -> MediaResult<Vec<Collection>> {
        self.list_collections().await
    }

    async fn delete(&self, id: i64) -> MediaResult<bool> {
        self.delete_collection(id).await
    }
}

#[async_trait]
impl AssociationStore for AssociationRepository {
    async fn associated_ids(&self, scope: &AssociationScope) -> MediaResult<Vec<i64>> {
        self.associated_ids(scope).await
    }

    async fn reconcile(
        &self,
        scope: &AssociationScope,
        op: &AssociationOp,
    ) -> MediaResult<AssociationDelta> {
        self.reconcile(scope, op).await
    }

    async fn mediables_of(&self, media_id: i64) -> MediaResult<Vec<Mediable>> {
        self.mediables_of(media_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_keys() {
        let rows = vec![(1, "a"), (2, "b"), (3, "c"), (4, "a")];
        let ordered = order_by_keys(rows, &["c", "a"], |row| &row.1);
        assert_eq!(ordered, vec![(3, "c"), (1, "a"), (4, "a")]);
    }
}
