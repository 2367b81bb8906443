//! Disk manager
//!
//! Maps configured disk names to drivers. Built once at startup from [`MediaConfig`].

use std::collections::HashMap;
use std::sync::Arc;

use mediashelf_core::{DiskConfig, MediaConfig};

#[cfg(feature = "storage-local")]
use crate::LocalDisk;
#[cfg(feature = "storage-s3")]
use crate::S3Disk;
use crate::{Disk, DiskDriver, MemoryDisk, StorageError, StorageResult};

#[derive(Clone)]
pub struct DiskManager {
    disks: HashMap<String, Arc<dyn Disk>>,
    default_disk: String,
}

impl DiskManager {
    /// Empty manager; disks are added with [`DiskManager::with_disk`]
    pub fn new(default_disk: impl Into<String>) -> Self {
        Self {
            disks: HashMap::new(),
            default_disk: default_disk.into(),
        }
    }

    pub fn with_disk(mut self, disk: Arc<dyn Disk>) -> Self {
        self.disks.insert(disk.name().to_string(), disk);
        self
    }

    /// Create every configured disk
    pub async fn from_config(config: &MediaConfig) -> StorageResult<Self> {
        let mut manager = Self::new(config.default_disk.clone());
        for disk_config in &config.disks {
            let disk = create_disk(disk_config).await?;
            tracing::debug!(
                disk = %disk_config.name,
                driver = %disk_config.driver,
                "Disk configured"
            );
            manager = manager.with_disk(disk);
        }
        Ok(manager)
    }

    pub fn disk(&self, name: &str) -> StorageResult<Arc<dyn Disk>> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::DiskNotConfigured(name.to_string()))
    }

    pub fn default_disk_name(&self) -> &str {
        &self.default_disk
    }

    pub fn default_disk(&self) -> StorageResult<Arc<dyn Disk>> {
        self.disk(&self.default_disk)
    }

    pub fn has_disk(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }
}

/// Create one disk driver from its configuration
pub async fn create_disk(config: &DiskConfig) -> StorageResult<Arc<dyn Disk>> {
    match config.driver {
        #[cfg(feature = "storage-local")]
        DiskDriver::Local => {
            let root = config.root.clone().ok_or_else(|| {
                StorageError::ConfigError(format!("Disk '{}' has no root configured", config.name))
            })?;
            let base_url = config
                .url
                .clone()
                .unwrap_or_else(|| format!("/storage/{}", config.name));
            let disk = LocalDisk::new(config.name.clone(), root, base_url).await?;
            Ok(Arc::new(disk))
        }

        #[cfg(not(feature = "storage-local"))]
        DiskDriver::Local => Err(StorageError::ConfigError(
            "Local disk driver not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        DiskDriver::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError(format!("Disk '{}' has no bucket configured", config.name))
            })?;
            let disk = S3Disk::new(
                config.name.clone(),
                bucket,
                config.region.clone(),
                config.endpoint.clone(),
            )?
            .with_base_url(config.url.clone())
            .with_root(config.root.clone());
            Ok(Arc::new(disk))
        }

        #[cfg(not(feature = "storage-s3"))]
        DiskDriver::S3 => Err(StorageError::ConfigError(
            "S3 disk driver not available (storage-s3 feature not enabled)".to_string(),
        )),

        DiskDriver::Memory => {
            let mut disk = MemoryDisk::new(config.name.clone());
            if let Some(url) = &config.url {
                disk = disk.with_base_url(url.clone());
            }
            Ok(Arc::new(disk))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_with_memory_disks() {
        let config = MediaConfig::new("0123456789abcdef")
            .with_disks(vec![DiskConfig::memory("local"), DiskConfig::memory("s3")]);
        let manager = DiskManager::from_config(&config).await.unwrap();

        assert!(manager.has_disk("s3"));
        assert_eq!(manager.default_disk().unwrap().name(), "local");
        assert_eq!(manager.disk("s3").unwrap().driver(), DiskDriver::Memory);
    }

    #[tokio::test]
    async fn test_unknown_disk() {
        let manager = DiskManager::new("local").with_disk(Arc::new(MemoryDisk::new("local")));
        let result = manager.disk("missing");
        assert!(matches!(result, Err(StorageError::DiskNotConfigured(ref n)) if n == "missing"));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn test_local_disk_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("local").display().to_string();
        let config =
            MediaConfig::new("0123456789abcdef").with_disks(vec![DiskConfig::local("local", root)]);
        let manager = DiskManager::from_config(&config).await.unwrap();
        let disk = manager.default_disk().unwrap();
        assert_eq!(disk.driver(), DiskDriver::Local);
        assert_eq!(disk.url("a/b.jpg"), "/storage/local/a/b.jpg");
    }
}
