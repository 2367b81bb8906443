//! Reference resolution
//!
//! Turns an [`EntityRef`] into a [`Resolution`] with at most one batched query.

use std::collections::HashSet;

use mediashelf_core::models::{EntityRef, Identifiable, Lookup, Resolution};
use mediashelf_core::MediaResult;
use mediashelf_db::EntityLookup;

/// Resolve `reference` against `lookup`.
///
/// Ids are existence-checked and names looked up in one query each; loaded entities are
/// trusted. Fails only for mixed lists (`AmbiguousReferenceList`) or store errors.
pub async fn resolve<T>(reference: &EntityRef<T>, lookup: &dyn EntityLookup) -> MediaResult<Resolution>
where
    T: Identifiable + Sync,
{
    let resolution = match reference.lookup()? {
        Lookup::DetachAll => Resolution::DetachAll,
        Lookup::ById(ids) => found(lookup.existing_ids(&ids).await?),
        Lookup::ByName(names) => found(lookup.ids_by_names(&names).await?),
        Lookup::Trusted(ids) => found(ids),
    };

    tracing::trace!(?resolution, "Reference resolved");
    Ok(resolution)
}

fn found(ids: Vec<i64>) -> Resolution {
    let mut seen = HashSet::with_capacity(ids.len());
    let ids: Vec<i64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    if ids.is_empty() {
        Resolution::NotFound
    } else {
        Resolution::Found(ids)
    }
}
