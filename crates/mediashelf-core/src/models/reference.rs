//! Loosely-shaped references to media or collections
//!
//! Callers name the entities they want to attach with whatever they have at hand: an id,
//! a name, a loaded record, or a list of any one of those. [`EntityRef`] captures every
//! shape; [`EntityRef::lookup`] turns it into the single lookup the resolver has to run.

use crate::error::{MediaError, MediaResult};

use super::collection::Collection;
use super::media::Media;

/// Anything carrying a persisted identifier
pub trait Identifiable {
    fn id(&self) -> i64;
}

/// One element of a reference list
#[derive(Debug, Clone, PartialEq)]
pub enum RefItem<T> {
    Id(i64),
    Name(String),
    Entity(T),
}

/// A reference to zero or more entities of type `T`
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRef<T> {
    /// No reference; treated as "detach all"
    Null,
    /// Boolean sentinel; either value means "detach all"
    Flag(bool),
    Id(i64),
    /// Empty name means "detach all"
    Name(String),
    /// Already loaded, trusted as-is
    Entity(T),
    /// Homogeneous list; the first element decides how it is looked up
    List(Vec<RefItem<T>>),
    /// Already loaded collection of entities
    Entities(Vec<T>),
}

/// Canonical outcome of resolving a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Remove every current association
    DetachAll,
    /// Existing ids, deduplicated, in order of first occurrence
    Found(Vec<i64>),
    /// The reference named entities but none exist
    NotFound,
}

/// The single query needed to resolve a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    DetachAll,
    /// Batched `id IN (...)` existence check
    ById(Vec<i64>),
    /// Batched `name IN (...)` lookup
    ByName(Vec<String>),
    /// Ids taken verbatim from loaded entities
    Trusted(Vec<i64>),
}

fn dedup_ordered<K: Clone + Eq + std::hash::Hash>(items: Vec<K>) -> Vec<K> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

impl<T: Identifiable> EntityRef<T> {
    /// Decide how this reference is resolved.
    ///
    /// Fails with `AmbiguousReferenceList` when a list mixes element kinds.
    pub fn lookup(&self) -> MediaResult<Lookup> {
        let lookup = match self {
            EntityRef::Null | EntityRef::Flag(_) => Lookup::DetachAll,
            EntityRef::Name(name) if name.is_empty() => Lookup::DetachAll,
            EntityRef::Name(name) => Lookup::ByName(vec![name.clone()]),
            EntityRef::Id(id) => Lookup::ById(vec![*id]),
            EntityRef::Entity(entity) => Lookup::Trusted(vec![entity.id()]),
            EntityRef::Entities(entities) if entities.is_empty() => Lookup::DetachAll,
            EntityRef::Entities(entities) => {
                Lookup::Trusted(dedup_ordered(entities.iter().map(|e| e.id()).collect()))
            }
            EntityRef::List(items) => match items.first() {
                None => Lookup::DetachAll,
                Some(RefItem::Id(_)) => {
                    let ids = items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| match item {
                            RefItem::Id(id) => Ok(*id),
                            _ => Err(mixed_list(index, "id")),
                        })
                        .collect::<MediaResult<Vec<_>>>()?;
                    Lookup::ById(dedup_ordered(ids))
                }
                Some(RefItem::Name(_)) => {
                    let names = items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| match item {
                            RefItem::Name(name) => Ok(name.clone()),
                            _ => Err(mixed_list(index, "name")),
                        })
                        .collect::<MediaResult<Vec<_>>>()?;
                    Lookup::ByName(dedup_ordered(names))
                }
                Some(RefItem::Entity(_)) => {
                    let ids = items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| match item {
                            RefItem::Entity(entity) => Ok(entity.id()),
                            _ => Err(mixed_list(index, "entity")),
                        })
                        .collect::<MediaResult<Vec<_>>>()?;
                    Lookup::Trusted(dedup_ordered(ids))
                }
            },
        };
        Ok(lookup)
    }
}

fn mixed_list(index: usize, expected: &str) -> MediaError {
    MediaError::AmbiguousReferenceList(format!(
        "element {} does not match the list's first element kind ({})",
        index, expected
    ))
}

impl<T> From<i64> for EntityRef<T> {
    fn from(id: i64) -> Self {
        EntityRef::Id(id)
    }
}

impl<T> From<bool> for EntityRef<T> {
    fn from(flag: bool) -> Self {
        EntityRef::Flag(flag)
    }
}

impl<T> From<&str> for EntityRef<T> {
    fn from(name: &str) -> Self {
        EntityRef::Name(name.to_string())
    }
}

impl<T> From<String> for EntityRef<T> {
    fn from(name: String) -> Self {
        EntityRef::Name(name)
    }
}

impl<T> From<Vec<i64>> for EntityRef<T> {
    fn from(ids: Vec<i64>) -> Self {
        EntityRef::List(ids.into_iter().map(RefItem::Id).collect())
    }
}

impl<T> From<&[i64]> for EntityRef<T> {
    fn from(ids: &[i64]) -> Self {
        EntityRef::List(ids.iter().copied().map(RefItem::Id).collect())
    }
}

impl<T> From<Vec<&str>> for EntityRef<T> {
    fn from(names: Vec<&str>) -> Self {
        EntityRef::List(
            names
                .into_iter()
                .map(|name| RefItem::Name(name.to_string()))
                .collect(),
        )
    }
}

impl<T> From<Vec<String>> for EntityRef<T> {
    fn from(names: Vec<String>) -> Self {
        EntityRef::List(names.into_iter().map(RefItem::Name).collect())
    }
}

impl<T> From<Vec<RefItem<T>>> for EntityRef<T> {
    fn from(items: Vec<RefItem<T>>) -> Self {
        EntityRef::List(items)
    }
}

impl<T, R: Into<EntityRef<T>>> From<Option<R>> for EntityRef<T> {
    fn from(value: Option<R>) -> Self {
        value.map(Into::into).unwrap_or(EntityRef::Null)
    }
}

macro_rules! entity_ref_from_record {
    ($record:ty) => {
        impl From<$record> for EntityRef<$record> {
            fn from(entity: $record) -> Self {
                EntityRef::Entity(entity)
            }
        }

        impl From<&$record> for EntityRef<$record> {
            fn from(entity: &$record) -> Self {
                EntityRef::Entity(entity.clone())
            }
        }

        impl From<Vec<$record>> for EntityRef<$record> {
            fn from(entities: Vec<$record>) -> Self {
                EntityRef::Entities(entities)
            }
        }
    };
}

entity_ref_from_record!(Media);
entity_ref_from_record!(Collection);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn collection(id: i64, name: &str) -> Collection {
        let now = Utc::now();
        Collection {
            id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_detach_all_shapes() {
        let shapes: Vec<EntityRef<Collection>> = vec![
            EntityRef::Null,
            true.into(),
            false.into(),
            "".into(),
            Vec::<i64>::new().into(),
            Vec::<Collection>::new().into(),
            None::<i64>.into(),
        ];
        for shape in shapes {
            assert_eq!(shape.lookup().unwrap(), Lookup::DetachAll, "{:?}", shape);
        }
    }

    #[test]
    fn test_scalar_shapes() {
        let by_id: EntityRef<Collection> = 5.into();
        assert_eq!(by_id.lookup().unwrap(), Lookup::ById(vec![5]));

        let by_name: EntityRef<Collection> = "Avatars".into();
        assert_eq!(
            by_name.lookup().unwrap(),
            Lookup::ByName(vec!["Avatars".to_string()])
        );

        let entity: EntityRef<Collection> = collection(9, "X").into();
        assert_eq!(entity.lookup().unwrap(), Lookup::Trusted(vec![9]));
    }

    #[test]
    fn test_lists_are_deduplicated_in_first_occurrence_order() {
        let ids: EntityRef<Collection> = vec![3, 1, 3, 2, 1].into();
        assert_eq!(ids.lookup().unwrap(), Lookup::ById(vec![3, 1, 2]));

        let names: EntityRef<Collection> = vec!["B", "A", "B"].into();
        assert_eq!(
            names.lookup().unwrap(),
            Lookup::ByName(vec!["B".to_string(), "A".to_string()])
        );

        let entities: EntityRef<Collection> =
            vec![collection(2, "b"), collection(1, "a"), collection(2, "b")].into();
        assert_eq!(entities.lookup().unwrap(), Lookup::Trusted(vec![2, 1]));
    }

    #[test]
    fn test_mixed_list_is_ambiguous() {
        let mixed: EntityRef<Collection> =
            EntityRef::List(vec![RefItem::Id(1), RefItem::Name("A".to_string())]);
        let err = mixed.lookup().unwrap_err();
        assert_eq!(err.error_code(), "AMBIGUOUS_REFERENCE_LIST");

        let mixed: EntityRef<Collection> =
            EntityRef::List(vec![RefItem::Entity(collection(1, "a")), RefItem::Id(2)]);
        assert!(mixed.lookup().is_err());
    }
}
