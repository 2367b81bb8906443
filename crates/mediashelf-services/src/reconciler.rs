//! Association reconciliation
//!
//! Applies a resolved reference to an association scope. Every write goes through
//! [`AssociationStore::reconcile`], which reads the current ids, plans the delta and
//! applies it in one transaction.

use std::sync::Arc;

use mediashelf_core::models::{AssociationOp, AssociationScope, Resolution, SyncResult};
use mediashelf_core::MediaResult;
use mediashelf_db::AssociationStore;

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn AssociationStore>,
}

/// `None` for an empty change, the count otherwise
pub(crate) fn non_empty_count(ids: &[i64]) -> Option<usize> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.len())
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self { store }
    }

    pub async fn current(&self, scope: &AssociationScope) -> MediaResult<Vec<i64>> {
        self.store.associated_ids(scope).await
    }

    /// Attach the resolved ids that are not present yet; returns them in desired order.
    ///
    /// `DetachAll` and `NotFound` attach nothing.
    #[tracing::instrument(skip(self), fields(scope = %scope.lock_key()))]
    pub async fn attach(
        &self,
        scope: &AssociationScope,
        resolution: Resolution,
    ) -> MediaResult<Vec<i64>> {
        let ids = match resolution {
            Resolution::Found(ids) => ids,
            Resolution::DetachAll | Resolution::NotFound => return Ok(Vec::new()),
        };

        let delta = self
            .store
            .reconcile(scope, &AssociationOp::Attach(ids))
            .await?;
        Ok(delta.attach)
    }

    /// Detach the resolved ids that are present.
    ///
    /// `DetachAll` empties the scope and always reports the count, even zero.
    #[tracing::instrument(skip(self), fields(scope = %scope.lock_key()))]
    pub async fn detach(
        &self,
        scope: &AssociationScope,
        resolution: Resolution,
    ) -> MediaResult<Option<usize>> {
        match resolution {
            Resolution::DetachAll => {
                let delta = self.store.reconcile(scope, &AssociationOp::DetachAll).await?;
                Ok(Some(delta.detach.len()))
            }
            Resolution::NotFound => Ok(None),
            Resolution::Found(ids) => {
                let delta = self
                    .store
                    .reconcile(scope, &AssociationOp::Detach(ids))
                    .await?;
                Ok(non_empty_count(&delta.detach))
            }
        }
    }

    /// Make the scope match the resolved ids.
    ///
    /// Without `detaching`, ids missing from the desired set are kept. `NotFound` is a
    /// no-op (`None`).
    #[tracing::instrument(skip(self), fields(scope = %scope.lock_key()))]
    pub async fn sync(
        &self,
        scope: &AssociationScope,
        resolution: Resolution,
        detaching: bool,
    ) -> MediaResult<Option<SyncResult>> {
        let op = match resolution {
            Resolution::NotFound => return Ok(None),
            Resolution::DetachAll if !detaching => return Ok(Some(SyncResult::default())),
            Resolution::DetachAll => AssociationOp::DetachAll,
            Resolution::Found(desired) => AssociationOp::Sync { desired, detaching },
        };

        let delta = self.store.reconcile(scope, &op).await?;
        Ok(Some(delta.into_sync_result()))
    }
}
