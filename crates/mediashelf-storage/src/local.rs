use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::traits::{join_url, validate_path, ByteStream, Disk, StorageError, StorageResult};
use crate::DiskDriver;

/// Local filesystem disk
#[derive(Clone)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
    base_url: String,
}

impl LocalDisk {
    /// Create a new LocalDisk, creating `root` if needed
    ///
    /// # Arguments
    /// * `name` - Configured disk name
    /// * `root` - Root directory for file storage (e.g., "./storage/local")
    /// * `base_url` - Base URL for serving files (e.g., "/storage/local")
    pub async fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalDisk {
            name: name.into(),
            root,
            base_url: base_url.into(),
        })
    }

    /// Convert a storage path to a filesystem path with traversal checks
    fn key_to_path(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;

        let full = self.root.join(path);

        let root_canonical = self.root.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize root: {}", e))
        })?;

        // Existing paths may be symlinks; make sure they still resolve inside the root
        if let Ok(canonical) = full.canonicalize() {
            if canonical.strip_prefix(&root_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage path resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(full)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Disk for LocalDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::Local
    }

    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let full = self.key_to_path(path)?;
        let size = data.len();

        self.ensure_parent_dir(&full).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&full).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", full.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", full.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", full.display(), e))
        })?;

        tracing::info!(
            disk = %self.name,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local disk write successful"
        );

        Ok(())
    }

    async fn put_stream(
        &self,
        path: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let full = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&full).await?;

        let mut file = fs::File::create(&full).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", full.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                full.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", full.display(), e))
        })?;

        tracing::info!(
            disk = %self.name,
            path = %path,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local disk stream write successful"
        );

        Ok(bytes_copied)
    }

    async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let full = self.key_to_path(path)?;

        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let data = fs::read(&full).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", full.display(), e))
        })?;

        Ok(Bytes::from(data))
    }

    async fn get_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let full = self.key_to_path(path)?;

        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let file = fs::File::open(&full).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", full.display(), e))
        })?;

        let disk = self.name.clone();
        let key = path.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(disk = %disk, path = %key, error = %e, "Local disk stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.key_to_path(path)?;
        Ok(fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        let full = self.key_to_path(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::BackendError(e.to_string()),
        })?;
        Ok(meta.len())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&full).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", full.display(), e))
        })?;

        tracing::info!(
            disk = %self.name,
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local disk delete successful"
        );

        Ok(())
    }

    async fn list(&self, directory: &str) -> StorageResult<Vec<String>> {
        let full = self.key_to_path(directory)?;
        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![(full, directory.trim_end_matches('/').to_string())];
        while let Some((dir, key)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child = format!("{}/{}", key, entry.file_name().to_string_lossy());
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), child));
                } else {
                    files.push(child);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn delete_directory(&self, directory: &str) -> StorageResult<()> {
        let full = self.key_to_path(directory)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_dir_all(&full).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to delete directory {}: {}",
                full.display(),
                e
            ))
        })?;

        tracing::info!(
            disk = %self.name,
            directory = %directory,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local disk directory delete successful"
        );

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from)?;
        let to_path = self.key_to_path(to)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::info!(disk = %self.name, from = %from, to = %to, "Local disk copy successful");

        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from)?;
        let to_path = self.key_to_path(to)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to move {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::info!(disk = %self.name, from = %from, to = %to, "Local disk move successful");

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}
