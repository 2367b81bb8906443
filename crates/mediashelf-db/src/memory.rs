//! In-memory catalog
//!
//! Implements the store traits without a database, for tests and embedding. One shared
//! state backs all three stores so cascades (media delete, collection delete) behave like
//! the Postgres schema. A single mutex serializes reconciles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use mediashelf_core::models::{
    AssociationDelta, AssociationOp, AssociationScope, Collection, Media, Mediable, NewMedia,
};
use mediashelf_core::{MediaError, MediaResult};

use crate::store_traits::{
    order_by_keys, AssociationStore, CollectionStore, EntityLookup, MediaStore,
};

#[derive(Default)]
struct CatalogState {
    media: BTreeMap<i64, Media>,
    collections: BTreeMap<i64, Collection>,
    /// (collection_id, media_id)
    collection_media: BTreeSet<(i64, i64)>,
    /// Insertion order doubles as the id sequence
    mediables: Vec<Mediable>,
    next_media_id: i64,
    next_collection_id: i64,
    next_mediable_id: i64,
}

impl CatalogState {
    fn current_ids(&self, scope: &AssociationScope) -> Vec<i64> {
        match scope {
            AssociationScope::CollectionsOfMedia(media_id) => self
                .collection_media
                .iter()
                .filter(|(_, m)| m == media_id)
                .map(|(c, _)| *c)
                .collect(),
            AssociationScope::MediaOfCollection(collection_id) => self
                .collection_media
                .range((*collection_id, i64::MIN)..=(*collection_id, i64::MAX))
                .map(|(_, m)| *m)
                .collect(),
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => self
                .mediables
                .iter()
                .filter(|m| {
                    &m.mediable_type == owner_type
                        && m.mediable_id == *owner_id
                        && &m.channel == channel
                })
                .map(|m| m.media_id)
                .collect(),
        }
    }

    fn apply(&mut self, scope: &AssociationScope, delta: &AssociationDelta) -> MediaResult<()> {
        // Foreign keys
        for id in &delta.attach {
            let exists = match scope {
                AssociationScope::CollectionsOfMedia(_) => self.collections.contains_key(id),
                _ => self.media.contains_key(id),
            };
            if !exists {
                return Err(MediaError::InvalidInput(format!(
                    "Cannot associate missing record {}",
                    id
                )));
            }
        }
        let owner_exists = match scope {
            AssociationScope::CollectionsOfMedia(media_id) => self.media.contains_key(media_id),
            AssociationScope::MediaOfCollection(collection_id) => {
                self.collections.contains_key(collection_id)
            }
            AssociationScope::Channel { .. } => true,
        };
        if !owner_exists && !delta.attach.is_empty() {
            return Err(MediaError::InvalidInput(format!(
                "Association scope {} refers to a missing record",
                scope.lock_key()
            )));
        }

        match scope {
            AssociationScope::CollectionsOfMedia(media_id) => {
                for collection_id in &delta.detach {
                    self.collection_media.remove(&(*collection_id, *media_id));
                }
                for collection_id in &delta.attach {
                    self.collection_media.insert((*collection_id, *media_id));
                }
            }
            AssociationScope::MediaOfCollection(collection_id) => {
                for media_id in &delta.detach {
                    self.collection_media.remove(&(*collection_id, *media_id));
                }
                for media_id in &delta.attach {
                    self.collection_media.insert((*collection_id, *media_id));
                }
            }
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => {
                self.mediables.retain(|m| {
                    !(&m.mediable_type == owner_type
                        && m.mediable_id == *owner_id
                        && &m.channel == channel
                        && delta.detach.contains(&m.media_id))
                });
                for media_id in &delta.attach {
                    self.next_mediable_id += 1;
                    self.mediables.push(Mediable {
                        id: self.next_mediable_id,
                        media_id: *media_id,
                        mediable_id: *owner_id,
                        mediable_type: owner_type.clone(),
                        channel: channel.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Shared in-memory state; hand out stores with the accessor methods
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media_store(&self) -> MemoryMediaStore {
        MemoryMediaStore {
            catalog: self.clone(),
        }
    }

    pub fn collection_store(&self) -> MemoryCollectionStore {
        MemoryCollectionStore {
            catalog: self.clone(),
        }
    }

    pub fn association_store(&self) -> MemoryAssociationStore {
        MemoryAssociationStore {
            catalog: self.clone(),
        }
    }

    fn lock(&self) -> MediaResult<MutexGuard<'_, CatalogState>> {
        self.state
            .lock()
            .map_err(|_| MediaError::Internal("memory catalog lock poisoned".to_string()))
    }
}

#[derive(Clone)]
pub struct MemoryMediaStore {
    catalog: MemoryCatalog,
}

#[derive(Clone)]
pub struct MemoryCollectionStore {
    catalog: MemoryCatalog,
}

#[derive(Clone)]
pub struct MemoryAssociationStore {
    catalog: MemoryCatalog,
}

#[async_trait]
impl EntityLookup for MemoryMediaStore {
    async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>> {
        let state = self.catalog.lock()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.media.contains_key(id))
            .collect())
    }

    async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        let state = self.catalog.lock()?;
        let rows: Vec<(i64, String)> = state
            .media
            .values()
            .map(|m| (m.id, m.name.clone()))
            .collect();
        Ok(order_by_keys(rows, names, |(_, name)| name)
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn insert(&self, media: NewMedia) -> MediaResult<Media> {
        let mut state = self.catalog.lock()?;
        state.next_media_id += 1;
        let now = Utc::now();
        let record = Media {
            id: state.next_media_id,
            disk: media.disk,
            name: media.name,
            file_name: media.file_name,
            mime_type: media.mime_type,
            size: media.size,
            data: media.data,
            created_at: now,
            updated_at: now,
        };
        state.media.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: i64) -> MediaResult<Option<Media>> {
        Ok(self.catalog.lock()?.media.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Media>> {
        let state = self.catalog.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.media.get(id).cloned())
            .collect())
    }

    async fn update(&self, media: &Media) -> MediaResult<Option<Media>> {
        let mut state = self.catalog.lock()?;
        let Some(existing) = state.media.get_mut(&media.id) else {
            return Ok(None);
        };
        existing.disk = media.disk.clone();
        existing.name = media.name.clone();
        existing.file_name = media.file_name.clone();
        existing.data = media.data.clone();
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: i64) -> MediaResult<bool> {
        let mut state = self.catalog.lock()?;
        if state.media.remove(&id).is_none() {
            return Ok(false);
        }
        state.collection_media.retain(|(_, media_id)| *media_id != id);
        state.mediables.retain(|m| m.media_id != id);
        Ok(true)
    }
}

#[async_trait]
impl EntityLookup for MemoryCollectionStore {
    async fn existing_ids(&self, ids: &[i64]) -> MediaResult<Vec<i64>> {
        let state = self.catalog.lock()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.collections.contains_key(id))
            .collect())
    }

    async fn ids_by_names(&self, names: &[String]) -> MediaResult<Vec<i64>> {
        let state = self.catalog.lock()?;
        Ok(names
            .iter()
            .filter_map(|name| {
                state
                    .collections
                    .values()
                    .find(|c| &c.name == name)
                    .map(|c| c.id)
            })
            .collect())
    }
}

impl MemoryCollectionStore {
    fn insert_locked(state: &mut CatalogState, name: &str) -> MediaResult<Collection> {
        if state.collections.values().any(|c| c.name == name) {
            return Err(MediaError::InvalidInput(format!(
                "Collection name already exists: {}",
                name
            )));
        }
        state.next_collection_id += 1;
        let now = Utc::now();
        let collection = Collection {
            id: state.next_collection_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn insert(&self, name: &str) -> MediaResult<Collection> {
        let mut state = self.catalog.lock()?;
        Self::insert_locked(&mut state, name)
    }

    async fn first_or_create(&self, name: &str) -> MediaResult<Collection> {
        let mut state = self.catalog.lock()?;
        if let Some(existing) = state.collections.values().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        Self::insert_locked(&mut state, name)
    }

    async fn find(&self, id: i64) -> MediaResult<Option<Collection>> {
        Ok(self.catalog.lock()?.collections.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> MediaResult<Option<Collection>> {
        Ok(self
            .catalog
            .lock()?
            .collections
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn find_many(&self, ids: &[i64]) -> MediaResult<Vec<Collection>> {
        let state = self.catalog.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.collections.get(id).cloned())
            .collect())
    }

    async fn list(&self) -> MediaResult<Vec<Collection>> {
        let mut all: Vec<Collection> = self.catalog.lock()?.collections.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn delete(&self, id: i64) -> MediaResult<bool> {
        let mut state = self.catalog.lock()?;
        if state.collections.remove(&id).is_none() {
            return Ok(false);
        }
        state
            .collection_media
            .retain(|(collection_id, _)| *collection_id != id);
        Ok(true)
    }
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    async fn associated_ids(&self, scope: &AssociationScope) -> MediaResult<Vec<i64>> {
        Ok(self.catalog.lock()?.current_ids(scope))
    }

    async fn reconcile(
        &self,
        scope: &AssociationScope,
        op: &AssociationOp,
    ) -> MediaResult<AssociationDelta> {
        let mut state = self.catalog.lock()?;
        let current = state.current_ids(scope);
        let delta = AssociationDelta::plan(&current, op);
        state.apply(scope, &delta)?;
        Ok(delta)
    }

    async fn mediables_of(&self, media_id: i64) -> MediaResult<Vec<Mediable>> {
        Ok(self
            .catalog
            .lock()?
            .mediables
            .iter()
            .filter(|m| m.media_id == media_id)
            .cloned()
            .collect())
    }
}
