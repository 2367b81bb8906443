//! Image manipulator
//!
//! Generates derived artifacts for one media item. Each conversion is written to
//! `conversions/<name>/<file_name>` inside the media directory, encoded in the original
//! format. A failing conversion is reported and does not stop the others.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader};
use mediashelf_core::models::Media;
use mediashelf_core::{MediaError, MediaResult};
use mediashelf_storage::{Disk, DiskManager, PathLayout};

use crate::conversion::{ConversionFn, ConversionRegistry};
use crate::mime::image_format_for;

/// A conversion that could not be generated
#[derive(Debug)]
pub struct ConversionFailure {
    pub conversion: String,
    pub error: MediaError,
}

/// Outcome of one manipulation run
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub generated: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<ConversionFailure>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.conversion.as_str()).collect()
    }

    /// True when something failed and every failure was an unknown conversion name.
    /// Retrying such a job cannot succeed.
    pub fn only_invalid_conversions(&self) -> bool {
        !self.failed.is_empty()
            && self
                .failed
                .iter()
                .all(|f| matches!(f.error, MediaError::InvalidConversion(_)))
    }
}

/// Decoded original, loaded at most once per run
enum Original {
    Pending,
    Ready(Arc<DynamicImage>, ImageFormat),
    Failed(String),
}

#[derive(Clone)]
pub struct ImageManipulator {
    disks: DiskManager,
    layout: PathLayout,
    registry: Arc<ConversionRegistry>,
}

impl ImageManipulator {
    pub fn new(disks: DiskManager, layout: PathLayout, registry: Arc<ConversionRegistry>) -> Self {
        Self {
            disks,
            layout,
            registry,
        }
    }

    pub fn registry(&self) -> &ConversionRegistry {
        &self.registry
    }

    /// Generate `conversions` for `media`.
    ///
    /// With `only_if_missing`, conversions whose derived file already exists are skipped.
    /// Non-image media skip every conversion.
    #[tracing::instrument(skip(self, media), fields(media_id = %media.id, disk = %media.disk))]
    pub async fn manipulate(
        &self,
        media: &Media,
        conversions: &[String],
        only_if_missing: bool,
    ) -> MediaResult<ConversionReport> {
        let mut report = ConversionReport::default();

        if !media.is_of_kind("image") {
            tracing::debug!(mime_type = %media.mime_type, "Not an image, skipping conversions");
            report.skipped = conversions.to_vec();
            return Ok(report);
        }

        let disk = self.disks.disk(&media.disk)?;
        let mut original = Original::Pending;
        let start = Instant::now();

        for name in conversions {
            let path = self.layout.conversion_path(media, name);

            if only_if_missing && disk.exists(&path).await? {
                report.skipped.push(name.clone());
                continue;
            }

            let result = match self.registry.get(name) {
                Ok(convert) => {
                    self.generate(disk.as_ref(), media, &mut original, convert, &path)
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => report.generated.push(name.clone()),
                Err(error) => {
                    tracing::warn!(conversion = %name, error = %error, "Conversion failed");
                    report.failed.push(ConversionFailure {
                        conversion: name.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            generated = report.generated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis(),
            "Conversions processed"
        );

        Ok(report)
    }

    async fn generate(
        &self,
        disk: &dyn Disk,
        media: &Media,
        original: &mut Original,
        convert: ConversionFn,
        path: &str,
    ) -> MediaResult<()> {
        if let Original::Pending = original {
            *original = match self.decode_original(disk, media).await {
                Ok((img, format)) => Original::Ready(Arc::new(img), format),
                Err(e) => Original::Failed(e.to_string()),
            };
        }

        let (img, format) = match &*original {
            Original::Ready(img, format) => (Arc::clone(img), *format),
            Original::Failed(message) => return Err(MediaError::ImageProcessing(message.clone())),
            Original::Pending => {
                return Err(MediaError::Internal("original image not loaded".to_string()))
            }
        };

        let encoded = tokio::task::spawn_blocking(move || {
            let converted = convert(img.as_ref().clone());
            encode(&converted, format)
        })
        .await
        .map_err(|e| MediaError::Internal(format!("conversion task panicked: {}", e)))??;

        disk.put(path, encoded).await?;
        Ok(())
    }

    async fn decode_original(
        &self,
        disk: &dyn Disk,
        media: &Media,
    ) -> MediaResult<(DynamicImage, ImageFormat)> {
        let path = self.layout.path(media, None);
        let data = disk.get(&path).await?;
        let declared = image_format_for(&media.mime_type);

        tokio::task::spawn_blocking(move || decode(&data, declared))
            .await
            .map_err(|e| MediaError::Internal(format!("decode task panicked: {}", e)))?
    }
}

fn decode(data: &[u8], declared: Option<ImageFormat>) -> MediaResult<(DynamicImage, ImageFormat)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaError::ImageProcessing(format!("failed to read image: {}", e)))?;

    let format = declared
        .or_else(|| reader.format())
        .ok_or_else(|| MediaError::ImageProcessing("unknown image format".to_string()))?;

    let img = reader
        .decode()
        .map_err(|e| MediaError::ImageProcessing(format!("failed to decode image: {}", e)))?;

    Ok((img, format))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> MediaResult<Bytes> {
    // JPEG has no alpha channel
    let img = match format {
        ImageFormat::Jpeg if img.color().has_alpha() => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| MediaError::ImageProcessing(format!("failed to encode image: {}", e)))?;
    Ok(Bytes::from(buf))
}
