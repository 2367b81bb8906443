//! Association scopes and delta planning
//!
//! A scope fixes one side of an association (a media item, a collection, or an owner's
//! channel); the ids inside the scope are the other side. Planning is pure: the store reads
//! the current ids, calls [`AssociationDelta::plan`], and applies the result in the same
//! transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The fixed side of an association set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationScope {
    /// Collection ids of one media item
    CollectionsOfMedia(i64),
    /// Media ids of one collection
    MediaOfCollection(i64),
    /// Media ids attached to an owner under a channel
    Channel {
        owner_type: String,
        owner_id: i64,
        channel: String,
    },
}

impl AssociationScope {
    pub fn channel(owner_type: impl Into<String>, owner_id: i64, channel: impl Into<String>) -> Self {
        AssociationScope::Channel {
            owner_type: owner_type.into(),
            owner_id,
            channel: channel.into(),
        }
    }

    /// Stable key used to serialize concurrent reconciles on the same scope
    pub fn lock_key(&self) -> String {
        match self {
            AssociationScope::CollectionsOfMedia(media_id) => {
                format!("media:{}:collections", media_id)
            }
            AssociationScope::MediaOfCollection(collection_id) => {
                format!("collection:{}:media", collection_id)
            }
            AssociationScope::Channel {
                owner_type,
                owner_id,
                channel,
            } => format!("owner:{}:{}:channel:{}", owner_type, owner_id, channel),
        }
    }
}

/// A resolved association change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationOp {
    Attach(Vec<i64>),
    Detach(Vec<i64>),
    DetachAll,
    Sync { desired: Vec<i64>, detaching: bool },
}

/// Rows to insert and delete, plus the desired ids that were already present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationDelta {
    /// In desired order
    pub attach: Vec<i64>,
    /// In current (stored) order
    pub detach: Vec<i64>,
    /// In desired order
    pub unchanged: Vec<i64>,
}

impl AssociationDelta {
    /// Plan `op` against the `current` ids of a scope.
    pub fn plan(current: &[i64], op: &AssociationOp) -> Self {
        let current_set: HashSet<i64> = current.iter().copied().collect();

        match op {
            AssociationOp::Attach(ids) => Self {
                attach: ids
                    .iter()
                    .copied()
                    .filter(|id| !current_set.contains(id))
                    .collect(),
                ..Default::default()
            },
            AssociationOp::Detach(ids) => {
                let requested: HashSet<i64> = ids.iter().copied().collect();
                Self {
                    detach: current
                        .iter()
                        .copied()
                        .filter(|id| requested.contains(id))
                        .collect(),
                    ..Default::default()
                }
            }
            AssociationOp::DetachAll => Self {
                detach: current.to_vec(),
                ..Default::default()
            },
            AssociationOp::Sync { desired, detaching } => {
                let desired_set: HashSet<i64> = desired.iter().copied().collect();
                let (unchanged, attach) = desired
                    .iter()
                    .copied()
                    .partition(|id| current_set.contains(id));
                let detach = if *detaching {
                    current
                        .iter()
                        .copied()
                        .filter(|id| !desired_set.contains(id))
                        .collect()
                } else {
                    Vec::new()
                };
                Self {
                    attach,
                    detach,
                    unchanged,
                }
            }
        }
    }

    pub fn is_noop(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }

    pub fn into_sync_result(self) -> SyncResult {
        SyncResult {
            attached: self.attach,
            detached: self.detach,
            updated: self.unchanged,
        }
    }
}

/// Outcome of a sync; all three lists are always present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub attached: Vec<i64>,
    pub detached: Vec<i64>,
    pub updated: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_skips_present_ids() {
        let delta = AssociationDelta::plan(&[1, 2], &AssociationOp::Attach(vec![3, 2, 4]));
        assert_eq!(delta.attach, vec![3, 4]);
        assert!(delta.detach.is_empty());
    }

    #[test]
    fn test_detach_intersects_in_current_order() {
        let delta = AssociationDelta::plan(&[5, 1, 3], &AssociationOp::Detach(vec![3, 9, 5]));
        assert_eq!(delta.detach, vec![5, 3]);
    }

    #[test]
    fn test_detach_all_takes_everything() {
        let delta = AssociationDelta::plan(&[4, 2], &AssociationOp::DetachAll);
        assert_eq!(delta.detach, vec![4, 2]);
        assert!(AssociationDelta::plan(&[], &AssociationOp::DetachAll).is_noop());
    }

    #[test]
    fn test_sync_partitions_desired_and_current() {
        // current [A=1, C=3], desired [A=1, B=2]
        let op = AssociationOp::Sync {
            desired: vec![1, 2],
            detaching: true,
        };
        let result = AssociationDelta::plan(&[1, 3], &op).into_sync_result();
        assert_eq!(
            result,
            SyncResult {
                attached: vec![2],
                detached: vec![3],
                updated: vec![1],
            }
        );
    }

    #[test]
    fn test_sync_without_detaching_keeps_extras() {
        let op = AssociationOp::Sync {
            desired: vec![2],
            detaching: false,
        };
        let delta = AssociationDelta::plan(&[1], &op);
        assert_eq!(delta.attach, vec![2]);
        assert!(delta.detach.is_empty());
    }

    #[test]
    fn test_sync_is_stable_on_second_run() {
        let op = AssociationOp::Sync {
            desired: vec![7, 8],
            detaching: true,
        };
        let result = AssociationDelta::plan(&[8, 7], &op).into_sync_result();
        assert!(result.attached.is_empty());
        assert!(result.detached.is_empty());
        assert_eq!(result.updated, vec![7, 8]);
    }

    #[test]
    fn test_lock_keys_differ_by_scope() {
        let a = AssociationScope::CollectionsOfMedia(1).lock_key();
        let b = AssociationScope::MediaOfCollection(1).lock_key();
        let c = AssociationScope::channel("post", 1, "gallery").lock_key();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }
}
