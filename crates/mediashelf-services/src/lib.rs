//! Mediashelf Services Layer
//!
//! Orchestration on top of the stores, disks and worker: reference resolution, association
//! reconciliation, the storage lifecycle of media records, uploads, and conversion dispatch.
//! Callers depend on this crate and construct a [`MediaShelf`] once at startup.

pub mod conversions;
pub mod lifecycle;
pub mod reconciler;
pub mod resolver;
pub mod services;
pub mod shelf;
pub mod stores;
pub mod uploader;

#[cfg(test)]
mod test_support;

pub use conversions::{ConversionDispatcher, ConversionJobHandler};
pub use lifecycle::StorageLifecycle;
pub use reconciler::Reconciler;
pub use resolver::resolve;
pub use services::{CollectionService, MediaService, OwnerMediaService};
pub use shelf::MediaShelf;
pub use stores::Stores;
pub use uploader::MediaUploader;

pub use mediashelf_processing::{ConversionRegistry, ConversionReport, ImageManipulator};
pub use mediashelf_storage::{Disk, DiskManager, PathLayout};
pub use mediashelf_worker::{JobQueue, QueuedJob, TaskQueue, TaskQueueConfig};
