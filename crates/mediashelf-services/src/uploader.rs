//! Fluent upload builder
//!
//! ```ignore
//! let media = shelf
//!     .media()
//!     .uploader("holiday photo.jpg", bytes)
//!     .use_name("Holiday")
//!     .to_disk("s3")
//!     .to_collection("Trips")
//!     .upload()
//!     .await?;
//! ```

use bytes::Bytes;
use mediashelf_core::models::{
    file_stem, sanitize_file_name, validate_file_name, AssociationScope, Media, NewMedia,
    Resolution,
};
use mediashelf_core::MediaResult;
use mediashelf_processing::guess_mime_type;
use serde_json::Value as JsonValue;

use crate::services::MediaService;

/// Collects upload options, then writes the record and the file in [`upload`](Self::upload)
pub struct MediaUploader {
    service: MediaService,
    data: Bytes,
    name: String,
    file_name: String,
    disk: Option<String>,
    mime_type: Option<String>,
    custom: Option<JsonValue>,
    collections: Vec<String>,
}

impl MediaUploader {
    pub fn new(service: MediaService, original_name: &str, data: Bytes) -> Self {
        Self {
            service,
            data,
            name: file_stem(original_name),
            file_name: sanitize_file_name(original_name),
            disk: None,
            mime_type: None,
            custom: None,
            collections: Vec::new(),
        }
    }

    /// Display name; defaults to the original file name without extension
    pub fn use_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stored file name; sanitized like the original one
    pub fn use_file_name(mut self, file_name: &str) -> Self {
        self.file_name = sanitize_file_name(file_name);
        self
    }

    pub fn to_disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = Some(disk.into());
        self
    }

    /// Skip mime type detection
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Free-form JSON stored alongside the record
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.custom = Some(data);
        self
    }

    /// Put the media in the named collection, creating it if needed. Repeatable.
    pub fn to_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Insert the record, write the file, then attach the collections.
    ///
    /// Without any [`to_collection`](Self::to_collection) call the media lands in the
    /// default collection. If the file cannot be written the record is removed again.
    #[tracing::instrument(skip(self), fields(file_name = %self.file_name))]
    pub async fn upload(self) -> MediaResult<Media> {
        validate_file_name(&self.file_name)?;

        let lifecycle = self.service.lifecycle();
        let disk = self
            .disk
            .unwrap_or_else(|| lifecycle.disks().default_disk_name().to_string());
        // fail before anything is written
        lifecycle.disks().disk(&disk)?;

        let mime_type = self
            .mime_type
            .unwrap_or_else(|| guess_mime_type(&self.file_name));

        let stores = self.service.stores();
        let media = stores
            .media
            .insert(NewMedia {
                disk,
                name: self.name,
                file_name: self.file_name,
                mime_type,
                size: self.data.len() as i64,
                data: self.custom,
            })
            .await?;

        if let Err(e) = lifecycle.on_created(&media, self.data).await {
            tracing::error!(media_id = %media.id, error = %e, "Failed to store uploaded file, removing record");
            if let Err(cleanup) = stores.media.delete(media.id).await {
                tracing::warn!(media_id = %media.id, error = %cleanup, "Failed to remove record of failed upload");
            }
            return Err(e);
        }

        let names = if self.collections.is_empty() {
            vec![self.service.default_collection().to_string()]
        } else {
            self.collections
        };
        let mut collection_ids = Vec::with_capacity(names.len());
        for name in &names {
            collection_ids.push(stores.collections.first_or_create(name).await?.id);
        }
        self.service
            .reconciler()
            .attach(
                &AssociationScope::CollectionsOfMedia(media.id),
                Resolution::Found(collection_ids),
            )
            .await?;

        tracing::info!(
            media_id = %media.id,
            disk = %media.disk,
            size = media.size,
            "Media uploaded"
        );
        self.service.get(media.id).await
    }
}
