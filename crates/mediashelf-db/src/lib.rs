//! Mediashelf Database Layer
//!
//! This crate provides the Postgres repositories, schema rendering and initialization,
//! transaction utilities, and the store traits the services are written against.
//!
// Module declarations
pub mod db;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod store_traits;

// Re-exports: Repositories and setup
pub use db::{
    create_pool, initialize_schema, render_migration, render_schema, AssociationRepository,
    CollectionRepository, MediaRepository,
};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;

// Re-exports: Store traits
pub use store_traits::{AssociationStore, CollectionStore, EntityLookup, MediaStore};

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryCatalog;
