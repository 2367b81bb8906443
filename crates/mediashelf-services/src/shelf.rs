//! Service wiring
//!
//! [`MediaShelf`] owns one instance of each service, built from a [`MediaConfig`] and the
//! persistence, storage and queue seams. [`MediaShelf::connect`] is the production entry
//! point: Postgres stores, configured disks and an in-process worker pool.

use std::sync::Arc;

use anyhow::Context;
use mediashelf_core::{ChannelRegistry, MediaConfig};
use mediashelf_db::{create_pool, initialize_schema};
use mediashelf_processing::{ConversionRegistry, ImageManipulator};
use mediashelf_storage::{DiskManager, PathLayout};
use mediashelf_worker::{JobHandlerContext, JobQueue, TaskQueue, TaskQueueConfig};

use crate::conversions::{ConversionDispatcher, ConversionJobHandler};
use crate::lifecycle::StorageLifecycle;
use crate::services::{CollectionService, MediaService, OwnerMediaService};
use crate::stores::Stores;

#[derive(Clone)]
pub struct MediaShelf {
    media: MediaService,
    collections: CollectionService,
    owners: OwnerMediaService,
    handler: Arc<ConversionJobHandler>,
    task_queue: Option<TaskQueue>,
}

impl MediaShelf {
    /// Wire the services against an external job queue.
    ///
    /// Whoever consumes that queue runs jobs through [`job_handler`](Self::job_handler).
    pub fn new(
        config: &MediaConfig,
        stores: Stores,
        disks: DiskManager,
        queue: Arc<dyn JobQueue>,
        registry: Arc<ConversionRegistry>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        let handler = Arc::new(Self::build_handler(config, &stores, &disks, registry));
        Self::assemble(config, stores, disks, queue, channels, handler, None)
    }

    /// Wire the services with an in-process [`TaskQueue`] running conversion jobs.
    ///
    /// Must be called inside a tokio runtime.
    pub fn in_process(
        config: &MediaConfig,
        stores: Stores,
        disks: DiskManager,
        registry: Arc<ConversionRegistry>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        Self::in_process_with(
            config,
            TaskQueueConfig::from(&config.queue),
            stores,
            disks,
            registry,
            channels,
        )
    }

    pub fn in_process_with(
        config: &MediaConfig,
        queue_config: TaskQueueConfig,
        stores: Stores,
        disks: DiskManager,
        registry: Arc<ConversionRegistry>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        let handler = Arc::new(Self::build_handler(config, &stores, &disks, registry));
        let context: Arc<dyn JobHandlerContext> = handler.clone();
        let task_queue = TaskQueue::new(queue_config, Arc::downgrade(&context), None);

        tracing::info!(
            max_workers = config.queue.max_workers,
            max_retries = config.queue.max_retries,
            "Conversion queue initialized"
        );

        Self::assemble(
            config,
            stores,
            disks,
            Arc::new(task_queue.clone()),
            channels,
            handler,
            Some(task_queue),
        )
    }

    /// Connect Postgres, initialize the schema, build the disks and start the worker pool.
    pub async fn connect(
        config: &MediaConfig,
        registry: Arc<ConversionRegistry>,
        channels: Arc<ChannelRegistry>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let database = config
            .database
            .as_ref()
            .context("DATABASE_URL must be set to connect the media shelf")?;

        let pool = create_pool(database).await?;
        initialize_schema(&pool, &config.tables, &config.default_collection).await?;

        let disks = DiskManager::from_config(config)
            .await
            .context("Failed to initialize disks")?;
        let stores = Stores::postgres(pool, &config.tables);

        Ok(Self::in_process(config, stores, disks, registry, channels))
    }

    fn build_handler(
        config: &MediaConfig,
        stores: &Stores,
        disks: &DiskManager,
        registry: Arc<ConversionRegistry>,
    ) -> ConversionJobHandler {
        let manipulator =
            ImageManipulator::new(disks.clone(), PathLayout::new(&config.app_secret), registry);
        ConversionJobHandler::new(stores.media.clone(), manipulator)
    }

    fn assemble(
        config: &MediaConfig,
        stores: Stores,
        disks: DiskManager,
        queue: Arc<dyn JobQueue>,
        channels: Arc<ChannelRegistry>,
        handler: Arc<ConversionJobHandler>,
        task_queue: Option<TaskQueue>,
    ) -> Self {
        let lifecycle = StorageLifecycle::new(
            disks,
            PathLayout::new(&config.app_secret),
            config.check_disk_writable,
        );
        let dispatcher = ConversionDispatcher::new(queue, config.conversion_queue.clone());

        Self {
            media: MediaService::new(
                stores.clone(),
                lifecycle.clone(),
                config.default_collection.clone(),
            ),
            collections: CollectionService::new(stores.clone()),
            owners: OwnerMediaService::new(stores, lifecycle, channels, dispatcher),
            handler,
            task_queue,
        }
    }

    pub fn media(&self) -> &MediaService {
        &self.media
    }

    pub fn collections(&self) -> &CollectionService {
        &self.collections
    }

    pub fn owners(&self) -> &OwnerMediaService {
        &self.owners
    }

    pub fn job_handler(&self) -> Arc<ConversionJobHandler> {
        self.handler.clone()
    }

    /// Stop the in-process worker pool, if any. Jobs already running finish.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.task_queue {
            queue.shutdown().await;
        }
    }
}
