//! Storage lifecycle of media records
//!
//! Keeps the physical files in step with the record: written on create, moved along with
//! their derived artifacts on update, and removed on delete. Callers invoke the hooks
//! explicitly around their record writes.

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use mediashelf_core::models::Media;
use mediashelf_core::{MediaError, MediaResult};
use mediashelf_storage::{Disk, DiskManager, PathLayout, StorageError};
use tokio_util::io::StreamReader;
use uuid::Uuid;

#[derive(Clone)]
pub struct StorageLifecycle {
    disks: DiskManager,
    layout: PathLayout,
    check_disk_writable: bool,
}

impl StorageLifecycle {
    pub fn new(disks: DiskManager, layout: PathLayout, check_disk_writable: bool) -> Self {
        Self {
            disks,
            layout,
            check_disk_writable,
        }
    }

    pub fn disks(&self) -> &DiskManager {
        &self.disks
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn disk_for(&self, media: &Media) -> MediaResult<Arc<dyn Disk>> {
        Ok(self.disks.disk(&media.disk)?)
    }

    /// Path of the original (`None` or empty) or of a derived artifact
    pub fn path(&self, media: &Media, conversion: Option<&str>) -> String {
        self.layout.path(media, conversion)
    }

    pub fn directory(&self, media: &Media) -> String {
        self.layout.directory(media.id)
    }

    /// Public URL of the original or of a derived artifact
    pub fn url(&self, media: &Media, conversion: Option<&str>) -> MediaResult<String> {
        let disk = self.disk_for(media)?;
        Ok(disk.url(&self.path(media, conversion)))
    }

    /// Write the uploaded bytes for a freshly persisted record
    #[tracing::instrument(skip(self, media, data), fields(media_id = %media.id, disk = %media.disk))]
    pub async fn on_created(&self, media: &Media, data: Bytes) -> MediaResult<()> {
        let disk = self.disk_for(media)?;
        disk.put(&self.path(media, None), data).await?;
        Ok(())
    }

    /// Validate an update before it is persisted.
    ///
    /// A disk change needs a configured target disk and, when probing is enabled, a disk that
    /// accepts a write.
    #[tracing::instrument(skip(self, current, updated), fields(media_id = %current.id))]
    pub async fn prepare_update(&self, current: &Media, updated: &Media) -> MediaResult<()> {
        if current.disk == updated.disk {
            return Ok(());
        }

        let target = self.disks.disk(&updated.disk)?;
        if self.check_disk_writable {
            self.probe(target.as_ref(), updated).await?;
        }
        Ok(())
    }

    async fn probe(&self, disk: &dyn Disk, media: &Media) -> MediaResult<()> {
        let path = format!(
            "{}/.write-probe-{}",
            self.layout.directory(media.id),
            Uuid::new_v4()
        );

        let unwritable = |err: StorageError| MediaError::DiskUnwritable {
            disk: disk.name().to_string(),
            source: Box::new(err),
        };

        disk.put(&path, Bytes::from_static(b"probe"))
            .await
            .map_err(unwritable)?;
        disk.delete(&path).await.map_err(unwritable)?;

        tracing::debug!(disk = %disk.name(), "Disk accepted write probe");
        Ok(())
    }

    /// Move the original and its derived artifacts after `previous` was updated to `current`.
    ///
    /// Derived files keep their conversion name and take the new file name. On a disk change
    /// the whole media directory is removed from the source disk afterwards.
    #[tracing::instrument(skip(self, previous, current), fields(media_id = %current.id))]
    pub async fn on_updated(&self, previous: &Media, current: &Media) -> MediaResult<()> {
        let disk_changed = previous.disk != current.disk;
        let renamed = previous.file_name != current.file_name;

        if !disk_changed && !renamed {
            return Ok(());
        }

        let source = self.disk_for(previous)?;
        let target = self.disk_for(current)?;

        let mut moves = vec![(self.path(previous, None), self.path(current, None))];
        let conversions = self.layout.conversions_directory(previous.id);
        for path in source.list(&conversions).await? {
            let Some(name) = conversion_of(&path, &conversions, &previous.file_name) else {
                continue;
            };
            moves.push((path.clone(), self.path(current, Some(name))));
        }

        for (from, to) in &moves {
            if disk_changed {
                transfer(source.as_ref(), target.as_ref(), from, to).await?;
            } else {
                target.move_file(from, to).await?;
            }
        }

        if disk_changed {
            self.clear_source(source.as_ref(), previous, &moves).await?;
            tracing::info!(
                from = %previous.disk,
                to = %current.disk,
                files = moves.len(),
                "Media files moved to new disk"
            );
        }
        if renamed {
            tracing::info!(
                from = %previous.file_name,
                to = %current.file_name,
                files = moves.len(),
                "Media files renamed"
            );
        }

        Ok(())
    }

    /// Drop the media directory from the disk it left, or at least the files that moved
    async fn clear_source(
        &self,
        source: &dyn Disk,
        previous: &Media,
        moves: &[(String, String)],
    ) -> MediaResult<()> {
        let directory = self.directory(previous);
        let Err(e) = source.delete_directory(&directory).await else {
            return Ok(());
        };

        tracing::warn!(
            error = %e,
            directory = %directory,
            "Failed to delete media directory on previous disk, deleting moved files only"
        );
        for (from, _) in moves {
            source.delete(from).await?;
        }
        Ok(())
    }

    /// Remove the media directory; falls back to the single original file.
    ///
    /// Failures are logged and swallowed.
    #[tracing::instrument(skip(self, media), fields(media_id = %media.id, disk = %media.disk))]
    pub async fn on_deleted(&self, media: &Media) {
        let disk = match self.disk_for(media) {
            Ok(disk) => disk,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot clean up files of deleted media");
                return;
            }
        };

        let directory = self.directory(media);
        let Err(e) = disk.delete_directory(&directory).await else {
            return;
        };

        tracing::warn!(
            error = %e,
            directory = %directory,
            "Failed to delete media directory, deleting the original file only"
        );

        if let Err(e) = disk.delete(&self.path(media, None)).await {
            tracing::warn!(error = %e, "Failed to delete media file");
        }
    }
}

/// Conversion name of `path` when it is a derived copy of `file_name`
fn conversion_of<'a>(path: &'a str, conversions: &str, file_name: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(conversions)?.strip_prefix('/')?;
    let (name, file) = rest.split_once('/')?;
    (file == file_name).then_some(name)
}

/// Stream `from` on one disk into `to` on another
async fn transfer(source: &dyn Disk, target: &dyn Disk, from: &str, to: &str) -> MediaResult<()> {
    let stream = source
        .get_stream(from)
        .await?
        .map_err(std::io::Error::other);
    target
        .put_stream(to, Box::pin(StreamReader::new(stream)))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{media_record, SECRET};
    use mediashelf_storage::MemoryDisk;

    struct Fixture {
        local: Arc<MemoryDisk>,
        s3: Arc<MemoryDisk>,
        lifecycle: StorageLifecycle,
    }

    fn fixture(check_disk_writable: bool) -> Fixture {
        let local = Arc::new(MemoryDisk::new("local"));
        let s3 = Arc::new(MemoryDisk::new("s3"));
        let disks = DiskManager::new("local")
            .with_disk(local.clone())
            .with_disk(s3.clone());
        Fixture {
            local,
            s3,
            lifecycle: StorageLifecycle::new(disks, PathLayout::new(SECRET), check_disk_writable),
        }
    }

    #[tokio::test]
    async fn test_created_file_lands_in_hashed_directory() {
        let f = fixture(true);
        let media = media_record(7, "local", "file.jpg");
        f.lifecycle
            .on_created(&media, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        let path = f.lifecycle.path(&media, None);
        assert!(path.starts_with("7-"));
        assert!(path.ends_with("/file.jpg"));
        assert_eq!(f.local.get(&path).await.unwrap(), Bytes::from_static(b"jpeg"));
    }

    #[tokio::test]
    async fn test_disk_change_moves_file() {
        let f = fixture(true);
        let before = media_record(7, "local", "file.jpg");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        let mut after = before.clone();
        after.disk = "s3".to_string();
        f.lifecycle.prepare_update(&before, &after).await.unwrap();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        let path = f.lifecycle.path(&after, None);
        assert!(!f.local.exists(&path).await.unwrap());
        assert_eq!(f.s3.get(&path).await.unwrap(), Bytes::from_static(b"jpeg"));
        // the probe leaves nothing behind
        assert_eq!(f.s3.paths().await, vec![path]);
    }

    #[tokio::test]
    async fn test_disk_change_and_rename() {
        let f = fixture(true);
        let before = media_record(7, "local", "file.jpg");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        let mut after = before.clone();
        after.disk = "s3".to_string();
        after.file_name = "renamed.jpg".to_string();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        assert!(f.local.paths().await.is_empty());
        assert_eq!(f.s3.paths().await, vec![f.lifecycle.path(&after, None)]);
    }

    #[tokio::test]
    async fn test_rename_moves_within_disk() {
        let f = fixture(true);
        let before = media_record(3, "local", "old.png");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"png"))
            .await
            .unwrap();

        let mut after = before.clone();
        after.file_name = "new.png".to_string();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        assert_eq!(f.local.paths().await, vec![f.lifecycle.path(&after, None)]);
    }

    #[tokio::test]
    async fn test_rename_carries_conversions() {
        let f = fixture(true);
        let before = media_record(3, "local", "old.png");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"png"))
            .await
            .unwrap();
        f.local
            .put(
                &f.lifecycle.path(&before, Some("thumb")),
                Bytes::from_static(b"thumb"),
            )
            .await
            .unwrap();
        // left over from an earlier name, not a copy of the current file
        let stale = format!(
            "{}/conversions/thumb/older.png",
            f.lifecycle.directory(&before)
        );
        f.local.put(&stale, Bytes::from_static(b"old")).await.unwrap();

        let mut after = before.clone();
        after.file_name = "new.png".to_string();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        let thumb = f.lifecycle.path(&after, Some("thumb"));
        assert_eq!(f.local.get(&thumb).await.unwrap(), Bytes::from_static(b"thumb"));
        assert!(!f
            .local
            .exists(&f.lifecycle.path(&before, Some("thumb")))
            .await
            .unwrap());
        assert!(f.local.exists(&stale).await.unwrap());
    }

    #[tokio::test]
    async fn test_disk_change_carries_conversions_and_clears_source() {
        let f = fixture(true);
        let before = media_record(7, "local", "file.jpg");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        for name in ["thumb", "preview"] {
            f.local
                .put(&f.lifecycle.path(&before, Some(name)), Bytes::from_static(b"c"))
                .await
                .unwrap();
        }

        let mut after = before.clone();
        after.disk = "s3".to_string();
        after.file_name = "renamed.jpg".to_string();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        assert!(f.local.paths().await.is_empty());
        let mut expected = vec![
            f.lifecycle.path(&after, None),
            f.lifecycle.path(&after, Some("preview")),
            f.lifecycle.path(&after, Some("thumb")),
        ];
        expected.sort();
        assert_eq!(f.s3.paths().await, expected);

        f.lifecycle.on_deleted(&after).await;
        assert!(f.s3.paths().await.is_empty());
        assert!(f.local.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_disk_change_deletes_moved_files_without_directory_deletes() {
        let f = fixture(true);
        f.local.set_directory_deletes(false);
        let before = media_record(7, "local", "file.jpg");
        f.lifecycle
            .on_created(&before, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        f.local
            .put(&f.lifecycle.path(&before, Some("thumb")), Bytes::from_static(b"t"))
            .await
            .unwrap();

        let mut after = before.clone();
        after.disk = "s3".to_string();
        f.lifecycle.on_updated(&before, &after).await.unwrap();

        assert!(f.local.paths().await.is_empty());
        assert!(f.s3.exists(&f.lifecycle.path(&after, Some("thumb"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_disk_is_rejected() {
        let f = fixture(true);
        let before = media_record(1, "local", "file.jpg");
        let mut after = before.clone();
        after.disk = "ftp".to_string();

        let err = f.lifecycle.prepare_update(&before, &after).await.unwrap_err();
        assert!(matches!(err, MediaError::DiskNotConfigured(ref name) if name == "ftp"));
    }

    #[tokio::test]
    async fn test_unwritable_disk_is_rejected_when_probing() {
        let f = fixture(true);
        f.s3.set_writable(false);
        let before = media_record(1, "local", "file.jpg");
        let mut after = before.clone();
        after.disk = "s3".to_string();

        let err = f.lifecycle.prepare_update(&before, &after).await.unwrap_err();
        assert!(matches!(err, MediaError::DiskUnwritable { ref disk, .. } if disk == "s3"));
        assert!(std::error::Error::source(&err).is_some());

        let lenient = fixture(false);
        lenient.s3.set_writable(false);
        lenient
            .lifecycle
            .prepare_update(&before, &after)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_directory_with_conversions() {
        let f = fixture(true);
        let media = media_record(9, "local", "file.jpg");
        f.lifecycle
            .on_created(&media, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        f.local
            .put(
                &f.lifecycle.path(&media, Some("thumb")),
                Bytes::from_static(b"thumb"),
            )
            .await
            .unwrap();

        f.lifecycle.on_deleted(&media).await;
        assert!(f.local.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_single_file() {
        let f = fixture(true);
        f.local.set_directory_deletes(false);
        let media = media_record(9, "local", "file.jpg");
        f.lifecycle
            .on_created(&media, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        f.lifecycle.on_deleted(&media).await;
        assert!(f.local.paths().await.is_empty());
    }
}
