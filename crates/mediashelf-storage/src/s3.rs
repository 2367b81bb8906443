use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::traits::{join_url, validate_path, ByteStream, Disk, StorageError, StorageResult};
use crate::DiskDriver;

/// S3 disk
#[derive(Clone)]
pub struct S3Disk {
    name: String,
    store: AmazonS3,
    bucket: String,
    region: Option<String>,
    /// Custom endpoint for S3-compatible providers
    endpoint_url: Option<String>,
    /// Public base URL override
    base_url: Option<String>,
    /// Key prefix inside the bucket
    root: Option<String>,
}

impl S3Disk {
    /// Create a new S3Disk
    ///
    /// Credentials come from the standard AWS environment variables.
    pub fn new(
        name: impl Into<String>,
        bucket: String,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket.clone());

        if let Some(ref region) = region {
            builder = builder.with_region(region.clone());
        }

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Disk {
            name: name.into(),
            store,
            bucket,
            region,
            endpoint_url,
            base_url: None,
            root: None,
        })
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_root(mut self, root: Option<String>) -> Self {
        self.root = root
            .map(|r| r.trim_matches('/').to_string())
            .filter(|r| !r.is_empty());
        self
    }

    fn location(&self, path: &str) -> StorageResult<Path> {
        validate_path(path)?;
        Ok(match &self.root {
            Some(root) => Path::from(format!("{}/{}", root, path)),
            None => Path::from(path.to_string()),
        })
    }

    fn object_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            // Path-style for S3-compatible providers: {endpoint}/{bucket}/{key}
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket,
                self.region.as_deref().unwrap_or("us-east-1"),
                key
            )
        }
    }
}

#[async_trait]
impl Disk for S3Disk {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::S3
    }

    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let location = self.location(path)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                path = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            disk = %self.name,
            bucket = %self.bucket,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn put_stream(
        &self,
        path: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        // Buffered into a single put
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;
        let size = buffer.len() as u64;
        self.put(path, Bytes::from(buffer)).await?;
        Ok(size)
    }

    async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let location = self.location(path)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    path = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn get_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let location = self.location(path)?;

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();
        let key = path.to_string();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(bucket = %bucket, path = %key, error = %e, "S3 stream download error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = self.location(path)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        let location = self.location(path)?;
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let location = self.location(path)?;
        let start = std::time::Instant::now();

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    path = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            disk = %self.name,
            bucket = %self.bucket,
            path = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn list(&self, directory: &str) -> StorageResult<Vec<String>> {
        let prefix = self.location(directory.trim_end_matches('/'))?;

        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let root = self.root.as_ref().map(|r| format!("{}/", r));
        let mut files: Vec<String> = objects
            .into_iter()
            .map(|object| {
                let key = object.location.to_string();
                match &root {
                    Some(root) => key.strip_prefix(root.as_str()).unwrap_or(&key).to_string(),
                    None => key,
                }
            })
            .collect();
        files.sort();
        Ok(files)
    }

    async fn delete_directory(&self, directory: &str) -> StorageResult<()> {
        let prefix = self.location(directory.trim_end_matches('/'))?;
        let start = std::time::Instant::now();

        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        let count = objects.len();
        for object in objects {
            match self.store.delete(&object.location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
            }
        }

        tracing::info!(
            disk = %self.name,
            bucket = %self.bucket,
            directory = %directory,
            objects = count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 directory delete successful"
        );

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let from_location = self.location(from)?;
        let to_location = self.location(to)?;

        let copy_result: ObjectResult<_> = self.store.copy(&from_location, &to_location).await;

        copy_result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(from.to_string()),
            other => StorageError::BackendError(other.to_string()),
        })?;

        tracing::info!(
            disk = %self.name,
            from = %from,
            to = %to,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        let key = match &self.root {
            Some(root) => format!("{}/{}", root, path),
            None => path.to_string(),
        };
        match &self.base_url {
            Some(base_url) => join_url(base_url, &key),
            None => self.object_url(&key),
        }
    }
}
