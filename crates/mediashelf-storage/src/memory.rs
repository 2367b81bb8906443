//! In-memory disk
//!
//! Backs the `memory` driver and the service tests. Writes and directory deletes can be
//! switched off to simulate a read-only or misbehaving backend.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

use crate::traits::{join_url, validate_path, ByteStream, Disk, StorageError, StorageResult};
use crate::DiskDriver;

#[derive(Clone)]
pub struct MemoryDisk {
    name: String,
    base_url: String,
    files: Arc<Mutex<BTreeMap<String, Bytes>>>,
    writable: Arc<AtomicBool>,
    directory_deletes: Arc<AtomicBool>,
}

impl MemoryDisk {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base_url: format!("/storage/{}", name),
            name,
            files: Arc::new(Mutex::new(BTreeMap::new())),
            writable: Arc::new(AtomicBool::new(true)),
            directory_deletes: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make every write fail
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Make `delete_directory` fail while single-file deletes keep working
    pub fn set_directory_deletes(&self, enabled: bool) {
        self.directory_deletes.store(enabled, Ordering::SeqCst);
    }

    /// Sorted list of every stored path
    pub async fn paths(&self) -> Vec<String> {
        self.files.lock().await.keys().cloned().collect()
    }

    fn check_writable(&self, path: &str) -> StorageResult<()> {
        if self.writable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::UploadFailed(format!(
                "Disk '{}' is read-only, cannot write {}",
                self.name, path
            )))
        }
    }
}

#[async_trait]
impl Disk for MemoryDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::Memory
    }

    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        validate_path(path)?;
        self.check_writable(path)?;
        self.files.lock().await.insert(path.to_string(), data);
        Ok(())
    }

    async fn put_stream(
        &self,
        path: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        let size = buffer.len() as u64;
        self.put(path, Bytes::from(buffer)).await?;
        Ok(size)
    }

    async fn get(&self, path: &str) -> StorageResult<Bytes> {
        validate_path(path)?;
        self.files
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn get_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let data = self.get(path).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        Ok(self.files.lock().await.contains_key(path))
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        Ok(self.get(path).await?.len() as u64)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        validate_path(path)?;
        self.files.lock().await.remove(path);
        Ok(())
    }

    async fn list(&self, directory: &str) -> StorageResult<Vec<String>> {
        validate_path(directory)?;
        let prefix = format!("{}/", directory.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .await
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn delete_directory(&self, directory: &str) -> StorageResult<()> {
        validate_path(directory)?;
        if !self.directory_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "Directory deletes are disabled on disk '{}'",
                self.name
            )));
        }
        let prefix = format!("{}/", directory.trim_end_matches('/'));
        self.files
            .lock()
            .await
            .retain(|path, _| !path.starts_with(&prefix));
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        validate_path(to)?;
        self.check_writable(to)?;
        let data = self.get(from).await?;
        self.files.lock().await.insert(to.to_string(), data);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_disk_basics() {
        let disk = MemoryDisk::new("memory");
        disk.put("1-a/f.txt", Bytes::from_static(b"hi")).await.unwrap();

        assert!(disk.exists("1-a/f.txt").await.unwrap());
        assert_eq!(disk.size("1-a/f.txt").await.unwrap(), 2);

        disk.move_file("1-a/f.txt", "1-a/g.txt").await.unwrap();
        assert_eq!(disk.paths().await, vec!["1-a/g.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let disk = MemoryDisk::new("memory");
        disk.set_writable(false);
        let result = disk.put("1-a/f.txt", Bytes::from_static(b"hi")).await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn test_delete_directory_only_touches_prefix() {
        let disk = MemoryDisk::new("memory");
        disk.put("1-a/f.txt", Bytes::from_static(b"1")).await.unwrap();
        disk.put("1-a/conversions/thumb/f.txt", Bytes::from_static(b"2"))
            .await
            .unwrap();
        disk.put("1-ab/f.txt", Bytes::from_static(b"3")).await.unwrap();

        assert_eq!(
            disk.list("1-a").await.unwrap(),
            vec!["1-a/conversions/thumb/f.txt", "1-a/f.txt"]
        );

        disk.delete_directory("1-a").await.unwrap();
        assert_eq!(disk.paths().await, vec!["1-ab/f.txt".to_string()]);

        disk.set_directory_deletes(false);
        assert!(disk.delete_directory("1-ab").await.is_err());
    }
}
