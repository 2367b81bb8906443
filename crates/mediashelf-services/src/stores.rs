use std::sync::Arc;

use mediashelf_core::TableNames;
#[cfg(any(test, feature = "memory"))]
use mediashelf_db::MemoryCatalog;
use mediashelf_db::{
    AssociationRepository, AssociationStore, CollectionRepository, CollectionStore,
    MediaRepository, MediaStore,
};
use sqlx::PgPool;

/// The persistence seams the services run against
#[derive(Clone)]
pub struct Stores {
    pub media: Arc<dyn MediaStore>,
    pub collections: Arc<dyn CollectionStore>,
    pub associations: Arc<dyn AssociationStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            media: Arc::new(MediaRepository::new(pool.clone(), tables)),
            collections: Arc::new(CollectionRepository::new(pool.clone(), tables)),
            associations: Arc::new(AssociationRepository::new(pool, tables)),
        }
    }

    #[cfg(any(test, feature = "memory"))]
    pub fn memory(catalog: &MemoryCatalog) -> Self {
        Self {
            media: Arc::new(catalog.media_store()),
            collections: Arc::new(catalog.collection_store()),
            associations: Arc::new(catalog.association_store()),
        }
    }
}
