use bytes::Bytes;
use mediashelf_core::models::{
    validate_file_name, AssociationScope, Collection, EntityRef, Media, MediaUpdate, Mediable,
    SyncResult,
};
use mediashelf_core::{MediaError, MediaResult};

use crate::lifecycle::StorageLifecycle;
use crate::reconciler::{non_empty_count, Reconciler};
use crate::resolver::resolve;
use crate::stores::Stores;
use crate::uploader::MediaUploader;

/// Media records, their files, and their collections
#[derive(Clone)]
pub struct MediaService {
    stores: Stores,
    lifecycle: StorageLifecycle,
    reconciler: Reconciler,
    default_collection: String,
}

impl MediaService {
    pub fn new(stores: Stores, lifecycle: StorageLifecycle, default_collection: impl Into<String>) -> Self {
        let reconciler = Reconciler::new(stores.associations.clone());
        Self {
            stores,
            lifecycle,
            reconciler,
            default_collection: default_collection.into(),
        }
    }

    pub fn lifecycle(&self) -> &StorageLifecycle {
        &self.lifecycle
    }

    pub(crate) fn stores(&self) -> &Stores {
        &self.stores
    }

    pub(crate) fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    /// Start an upload of `original_name` with contents `data`
    pub fn uploader(&self, original_name: &str, data: Bytes) -> MediaUploader {
        MediaUploader::new(self.clone(), original_name, data)
    }

    pub async fn find(&self, id: i64) -> MediaResult<Option<Media>> {
        self.stores.media.find(id).await
    }

    pub async fn get(&self, id: i64) -> MediaResult<Media> {
        self.find(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media {}", id)))
    }

    pub async fn attach_collections(
        &self,
        media: &Media,
        collections: impl Into<EntityRef<Collection>>,
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&collections.into(), self.stores.collections.as_ref()).await?;
        let attached = self
            .reconciler
            .attach(&AssociationScope::CollectionsOfMedia(media.id), resolution)
            .await?;
        Ok(non_empty_count(&attached))
    }

    pub async fn detach_collections(
        &self,
        media: &Media,
        collections: impl Into<EntityRef<Collection>>,
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&collections.into(), self.stores.collections.as_ref()).await?;
        self.reconciler
            .detach(&AssociationScope::CollectionsOfMedia(media.id), resolution)
            .await
    }

    pub async fn sync_collections(
        &self,
        media: &Media,
        collections: impl Into<EntityRef<Collection>>,
        detaching: bool,
    ) -> MediaResult<Option<SyncResult>> {
        let resolution = resolve(&collections.into(), self.stores.collections.as_ref()).await?;
        self.reconciler
            .sync(
                &AssociationScope::CollectionsOfMedia(media.id),
                resolution,
                detaching,
            )
            .await
    }

    /// Collections of `media`, ordered by id
    pub async fn collections_of(&self, media: &Media) -> MediaResult<Vec<Collection>> {
        let ids = self
            .reconciler
            .current(&AssociationScope::CollectionsOfMedia(media.id))
            .await?;
        self.stores.collections.find_many(&ids).await
    }

    /// Every owner link of `media`
    pub async fn owners_of(&self, media: &Media) -> MediaResult<Vec<Mediable>> {
        self.stores.associations.mediables_of(media.id).await
    }

    /// Update metadata; a disk or file name change moves the physical file and its derived
    /// artifacts.
    ///
    /// An invalid file name or an unknown or unwritable target disk aborts before anything is
    /// written.
    #[tracing::instrument(skip(self, update), fields(media_id = %id))]
    pub async fn update(&self, id: i64, update: MediaUpdate) -> MediaResult<Media> {
        let current = self.get(id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let desired = update.apply(&current);
        if update.file_name.is_some() {
            validate_file_name(&desired.file_name)?;
        }
        self.lifecycle.prepare_update(&current, &desired).await?;

        let saved = self
            .stores
            .media
            .update(&desired)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media {}", id)))?;

        self.lifecycle.on_updated(&current, &saved).await.map_err(|e| {
            tracing::error!(error = %e, "Media record updated but its file could not be moved");
            e
        })?;

        Ok(saved)
    }

    /// Delete the record, then its files. File cleanup never blocks the delete.
    #[tracing::instrument(skip(self), fields(media_id = %id))]
    pub async fn delete(&self, id: i64) -> MediaResult<()> {
        let media = self.get(id).await?;
        if !self.stores.media.delete(id).await? {
            return Err(MediaError::NotFound(format!("Media {}", id)));
        }
        self.lifecycle.on_deleted(&media).await;

        tracing::info!(disk = %media.disk, "Media deleted");
        Ok(())
    }

    pub fn url(&self, media: &Media, conversion: Option<&str>) -> MediaResult<String> {
        self.lifecycle.url(media, conversion)
    }

    pub fn path(&self, media: &Media, conversion: Option<&str>) -> String {
        self.lifecycle.path(media, conversion)
    }

    pub fn full_directory(&self, media: &Media) -> String {
        self.lifecycle.directory(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, TestShelf};
    use mediashelf_storage::Disk;
    use mediashelf_worker::ConversionJob;

    #[tokio::test]
    async fn test_sync_collections_by_name() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let collections = t.shelf.collections();
        let a = collections.create("A").await.unwrap();
        let b = collections.create("B").await.unwrap();
        let c = collections.create("C").await.unwrap();

        let media = t.upload("photo.png", png_bytes(4, 4)).await;
        service
            .sync_collections(&media, vec!["A", "C"], true)
            .await
            .unwrap();

        let result = service
            .sync_collections(&media, vec!["A", "B"], true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            result,
            SyncResult {
                attached: vec![b.id],
                detached: vec![c.id],
                updated: vec![a.id],
            }
        );

        let names: Vec<String> = service
            .collections_of(&media)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_attach_partially_valid_list() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let a = t.shelf.collections().create("A").await.unwrap();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;

        assert_eq!(
            service
                .attach_collections(&media, vec![a.id, 999])
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            service.attach_collections(&media, vec![999]).await.unwrap(),
            None
        );
        assert_eq!(service.attach_collections(&media, a.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_detach_all_collections() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;
        t.shelf.collections().create("A").await.unwrap();
        service.attach_collections(&media, "A").await.unwrap();

        // default collection plus "A"
        assert_eq!(
            service
                .detach_collections(&media, EntityRef::Null)
                .await
                .unwrap(),
            Some(2)
        );
        assert!(service.collections_of(&media).await.unwrap().is_empty());
        assert_eq!(
            service.detach_collections(&media, true).await.unwrap(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_update_disk_moves_file() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;
        let path = service.path(&media, None);

        let updated = service
            .update(
                media.id,
                MediaUpdate {
                    disk: Some("s3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.disk, "s3");
        assert!(!t.disk.exists(&path).await.unwrap());
        assert!(t.s3.exists(&path).await.unwrap());
        assert_eq!(service.url(&updated, None).unwrap(), format!("/storage/s3/{}", path));
    }

    #[tokio::test]
    async fn test_update_renames_with_sanitized_name() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;

        let updated = service
            .update(
                media.id,
                MediaUpdate {
                    file_name: Some("new name#1.png".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.file_name, "new-name-1.png");
        assert_eq!(t.disk.paths().await, vec![service.path(&updated, None)]);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_and_dot_file_names() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;
        let before = t.disk.paths().await;

        for bad in ["", ".", ".."] {
            let err = service
                .update(
                    media.id,
                    MediaUpdate {
                        file_name: Some(bad.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::InvalidInput(_)), "{:?} was accepted", bad);
        }

        assert_eq!(service.get(media.id).await.unwrap().file_name, "photo.png");
        assert_eq!(t.disk.paths().await, before);
    }

    #[tokio::test]
    async fn test_rename_keeps_generated_conversions_reachable() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(16, 16)).await;
        t.handler()
            .perform(&ConversionJob {
                media_id: media.id,
                conversions: vec!["thumb".to_string()],
            })
            .await
            .unwrap();
        let old_thumb = service.path(&media, Some("thumb"));

        let renamed = service
            .update(
                media.id,
                MediaUpdate {
                    file_name: Some("renamed.png".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let new_thumb = service.path(&renamed, Some("thumb"));
        assert!(t.disk.exists(&new_thumb).await.unwrap());
        assert!(!t.disk.exists(&old_thumb).await.unwrap());
        assert_eq!(
            service.url(&renamed, Some("thumb")).unwrap(),
            format!("/storage/local/{}", new_thumb)
        );
    }

    #[tokio::test]
    async fn test_deleting_moved_media_leaves_no_files() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(16, 16)).await;
        t.handler()
            .perform(&ConversionJob {
                media_id: media.id,
                conversions: vec!["thumb".to_string()],
            })
            .await
            .unwrap();

        let moved = service
            .update(
                media.id,
                MediaUpdate {
                    disk: Some("s3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(t.disk.paths().await.is_empty());
        assert!(t.s3.exists(&service.path(&moved, Some("thumb"))).await.unwrap());

        service.delete(media.id).await.unwrap();
        assert!(t.disk.paths().await.is_empty());
        assert!(t.s3.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_to_bad_disk_leaves_record_intact() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;

        let err = service
            .update(
                media.id,
                MediaUpdate {
                    disk: Some("ftp".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DiskNotConfigured(_)));

        t.s3.set_writable(false);
        let err = service
            .update(
                media.id,
                MediaUpdate {
                    disk: Some("s3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::DiskUnwritable { .. }));

        assert_eq!(service.get(media.id).await.unwrap().disk, "local");
        assert!(t.disk.exists(&service.path(&media, None)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_survives_storage_failure() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;
        t.disk.set_directory_deletes(false);

        service.delete(media.id).await.unwrap();
        assert!(service.find(media.id).await.unwrap().is_none());
        assert!(t.disk.paths().await.is_empty());

        let err = service.delete(media.id).await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accessors() {
        let t = TestShelf::new();
        let service = t.shelf.media();
        let media = t.upload("photo.png", png_bytes(4, 4)).await;

        let directory = service.full_directory(&media);
        assert!(directory.starts_with(&format!("{}-", media.id)));
        assert_eq!(service.path(&media, None), format!("{}/photo.png", directory));
        assert_eq!(
            service.path(&media, Some("thumb")),
            format!("{}/conversions/thumb/photo.png", directory)
        );
        assert_eq!(
            service.url(&media, Some("thumb")).unwrap(),
            format!("/storage/local/{}/conversions/thumb/photo.png", directory)
        );
    }
}
