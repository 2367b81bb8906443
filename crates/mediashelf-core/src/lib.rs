//! Mediashelf Core Library
//!
//! This crate provides the domain models, reference and association types, channel
//! registry, error types and configuration shared across all mediashelf components.

pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use channel::{ChannelRegistry, ChannelSet, HasMedia, MediaChannel};
pub use config::{DatabaseConfig, DiskConfig, MediaConfig, QueueConfig, TableNames};
pub use error::{BoxError, LogLevel, MediaError, MediaResult};
pub use storage_types::DiskDriver;
pub use task_error::{TaskError, TaskResultExt};
// Note: Disk, StorageError and DiskManager live in mediashelf-storage
