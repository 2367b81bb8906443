//! Fixtures shared by the service tests: in-memory catalog, memory disks and a
//! recording queue wired into a [`MediaShelf`].

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use mediashelf_core::models::{Media, NewMedia};
use mediashelf_core::{ChannelRegistry, ChannelSet, HasMedia, MediaConfig};
use mediashelf_db::MemoryCatalog;
use mediashelf_processing::conversion::thumbnail;
use mediashelf_processing::{ConversionRegistry, ImageManipulator};
use mediashelf_storage::{DiskManager, MemoryDisk, PathLayout};
use mediashelf_worker::RecordingQueue;

use crate::conversions::{ConversionDispatcher, ConversionJobHandler};
use crate::shelf::MediaShelf;
use crate::stores::Stores;

pub const SECRET: &str = "0123456789abcdef";

pub fn new_media(name: &str, file_name: &str) -> NewMedia {
    NewMedia {
        disk: "local".to_string(),
        name: name.to_string(),
        file_name: file_name.to_string(),
        mime_type: "image/jpeg".to_string(),
        size: 0,
        data: None,
    }
}

pub fn media_record(id: i64, disk: &str, file_name: &str) -> Media {
    let now = Utc::now();
    Media {
        id,
        disk: disk.to_string(),
        name: "file".to_string(),
        file_name: file_name.to_string(),
        mime_type: "image/jpeg".to_string(),
        size: 0,
        data: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 90, 200, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    Bytes::from(buf)
}

/// Owner type with a channel that declares conversions
pub struct Post {
    pub id: i64,
}

impl HasMedia for Post {
    const MEDIA_OWNER_TYPE: &'static str = "post";

    fn media_owner_id(&self) -> i64 {
        self.id
    }

    fn register_media_channels(channels: &mut ChannelSet) {
        channels
            .add_media_channel("gallery")
            .perform_conversions(["thumb"]);
    }
}

pub fn config() -> MediaConfig {
    let mut config = MediaConfig::new(SECRET).with_disks(vec![
        mediashelf_core::DiskConfig::memory("local"),
        mediashelf_core::DiskConfig::memory("s3"),
    ]);
    config.default_disk = "local".to_string();
    config
}

pub fn registry() -> ConversionRegistry {
    let mut registry = ConversionRegistry::new();
    registry.register("thumb", thumbnail(4, 4));
    registry
}

pub fn channels() -> ChannelRegistry {
    let mut channels = ChannelRegistry::new();
    channels.register::<Post>();
    channels
}

pub struct TestShelf {
    pub catalog: MemoryCatalog,
    pub disk: Arc<MemoryDisk>,
    pub s3: Arc<MemoryDisk>,
    pub queue: RecordingQueue,
    pub shelf: MediaShelf,
}

impl TestShelf {
    pub fn new() -> Self {
        let catalog = MemoryCatalog::new();
        let disk = Arc::new(MemoryDisk::new("local"));
        let s3 = Arc::new(MemoryDisk::new("s3"));
        let disks = DiskManager::new("local")
            .with_disk(disk.clone())
            .with_disk(s3.clone());
        let queue = RecordingQueue::new();

        let shelf = MediaShelf::new(
            &config(),
            Stores::memory(&catalog),
            disks,
            Arc::new(queue.clone()),
            Arc::new(registry()),
            Arc::new(channels()),
        );

        Self {
            catalog,
            disk,
            s3,
            queue,
            shelf,
        }
    }

    pub fn layout(&self) -> PathLayout {
        PathLayout::new(SECRET)
    }

    pub fn dispatcher(&self) -> ConversionDispatcher {
        ConversionDispatcher::new(Arc::new(self.queue.clone()), None)
    }

    pub fn handler(&self) -> ConversionJobHandler {
        let disks = self.shelf.media().lifecycle().disks().clone();
        ConversionJobHandler::new(
            Stores::memory(&self.catalog).media,
            ImageManipulator::new(disks, self.layout(), Arc::new(registry())),
        )
    }

    pub async fn upload(&self, file_name: &str, data: Bytes) -> Media {
        self.shelf
            .media()
            .uploader(file_name, data)
            .upload()
            .await
            .unwrap()
    }
}
