use mediashelf_core::models::{AssociationScope, Collection, EntityRef, Media, SyncResult};
use mediashelf_core::{MediaError, MediaResult};

use crate::reconciler::{non_empty_count, Reconciler};
use crate::resolver::resolve;
use crate::stores::Stores;

/// Named collections and the media grouped in them
#[derive(Clone)]
pub struct CollectionService {
    stores: Stores,
    reconciler: Reconciler,
}

impl CollectionService {
    pub fn new(stores: Stores) -> Self {
        let reconciler = Reconciler::new(stores.associations.clone());
        Self { stores, reconciler }
    }

    pub async fn create(&self, name: &str) -> MediaResult<Collection> {
        if name.trim().is_empty() {
            return Err(MediaError::InvalidInput(
                "Collection name must not be empty".to_string(),
            ));
        }
        let collection = self.stores.collections.insert(name).await?;
        tracing::info!(collection_id = collection.id, name = %collection.name, "Collection created");
        Ok(collection)
    }

    pub async fn first_or_create(&self, name: &str) -> MediaResult<Collection> {
        self.stores.collections.first_or_create(name).await
    }

    pub async fn find(&self, id: i64) -> MediaResult<Option<Collection>> {
        self.stores.collections.find(id).await
    }

    pub async fn find_by_name(&self, name: &str) -> MediaResult<Option<Collection>> {
        self.stores.collections.find_by_name(name).await
    }

    /// All collections, ordered by name
    pub async fn list(&self) -> MediaResult<Vec<Collection>> {
        self.stores.collections.list().await
    }

    /// Delete a collection; its media stay, only the links go
    pub async fn delete(&self, id: i64) -> MediaResult<()> {
        if !self.stores.collections.delete(id).await? {
            return Err(MediaError::NotFound(format!("Collection {}", id)));
        }
        tracing::info!(collection_id = id, "Collection deleted");
        Ok(())
    }

    /// Media in `collection`, ordered by id
    pub async fn media_of(&self, collection: &Collection) -> MediaResult<Vec<Media>> {
        let ids = self
            .reconciler
            .current(&AssociationScope::MediaOfCollection(collection.id))
            .await?;
        self.stores.media.find_many(&ids).await
    }

    pub async fn attach_media(
        &self,
        collection: &Collection,
        media: impl Into<EntityRef<Media>>,
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        let attached = self
            .reconciler
            .attach(&AssociationScope::MediaOfCollection(collection.id), resolution)
            .await?;
        Ok(non_empty_count(&attached))
    }

    pub async fn detach_media(
        &self,
        collection: &Collection,
        media: impl Into<EntityRef<Media>>,
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        self.reconciler
            .detach(&AssociationScope::MediaOfCollection(collection.id), resolution)
            .await
    }

    pub async fn sync_media(
        &self,
        collection: &Collection,
        media: impl Into<EntityRef<Media>>,
        detaching: bool,
    ) -> MediaResult<Option<SyncResult>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        self.reconciler
            .sync(
                &AssociationScope::MediaOfCollection(collection.id),
                resolution,
                detaching,
            )
            .await
    }
}
