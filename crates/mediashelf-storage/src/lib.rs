//! Mediashelf Storage Library
//!
//! This crate provides the [`Disk`] abstraction and its drivers (local filesystem, S3,
//! in-memory), the [`DiskManager`] that maps configured disk names to drivers, and the
//! path layout shared by every disk.
//!
//! # Path layout
//!
//! Every media item owns one directory, `{id}-{hex(sha256(id + secret))}`. The original
//! file sits at `{directory}/{file_name}` and derived artifacts at
//! `{directory}/conversions/{conversion}/{file_name}`. Paths must not contain `..` or a
//! leading `/`. Path generation is centralized in the `layout` module.

pub mod layout;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod manager;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use layout::PathLayout;
#[cfg(feature = "storage-local")]
pub use local::LocalDisk;
pub use manager::DiskManager;
pub use mediashelf_core::DiskDriver;
pub use memory::MemoryDisk;
#[cfg(feature = "storage-s3")]
pub use s3::S3Disk;
pub use traits::{ByteStream, Disk, StorageError, StorageResult};
