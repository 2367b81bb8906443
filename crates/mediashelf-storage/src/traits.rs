//! Disk abstraction trait
//!
//! This module defines the Disk trait that all drivers must implement.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use mediashelf_core::{DiskDriver, MediaError};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Disk is not configured: {0}")]
    DiskNotConfigured(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file contents
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DiskNotConfigured(name) => MediaError::DiskNotConfigured(name),
            other => MediaError::Storage {
                message: other.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// A named blob store addressed by relative paths
///
/// Paths are `/`-separated and relative to the disk root (see the crate docs for the
/// layout). Deleting something that does not exist is not an error.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Configured disk name (e.g. "local", "s3")
    fn name(&self) -> &str;

    fn driver(&self) -> DiskDriver;

    /// Write a file, replacing any existing content
    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()>;

    /// Write a file from a reader (for large files). Returns the number of bytes written.
    async fn put_stream(
        &self,
        path: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    async fn get(&self, path: &str) -> StorageResult<Bytes>;

    /// Read a file as a stream of chunks
    async fn get_stream(&self, path: &str) -> StorageResult<ByteStream>;

    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Size in bytes of an existing file
    async fn size(&self, path: &str) -> StorageResult<u64>;

    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Paths of every file under `directory`, recursively. A missing directory lists empty.
    async fn list(&self, directory: &str) -> StorageResult<Vec<String>>;

    /// Recursively delete everything under `directory`
    async fn delete_directory(&self, directory: &str) -> StorageResult<()>;

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Move a file within this disk
    async fn move_file(&self, from: &str, to: &str) -> StorageResult<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }

    /// Public URL of a path
    fn url(&self, path: &str) -> String;
}

/// Reject paths that could escape the disk root.
pub(crate) fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidKey("Storage path is empty".to_string()));
    }
    if path.split('/').any(|segment| segment == "..") || path.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage path contains invalid segments: {}",
            path
        )));
    }
    Ok(())
}

/// Join a base URL and a path with a single `/`
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("7-abc/photo.jpg").is_ok());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("a/../../b").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("").is_err());
    }

    #[test]
    fn test_disk_not_configured_maps_to_media_error() {
        let err: MediaError = StorageError::DiskNotConfigured("s3".to_string()).into();
        assert!(matches!(err, MediaError::DiskNotConfigured(ref name) if name == "s3"));

        let err: MediaError = StorageError::NotFound("x".to_string()).into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("/storage/local/", "a/b.jpg"), "/storage/local/a/b.jpg");
        assert_eq!(join_url("https://cdn.test", "a.jpg"), "https://cdn.test/a.jpg");
    }
}
