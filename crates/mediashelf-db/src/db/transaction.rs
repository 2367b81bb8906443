//! Database transaction utilities
//!
//! Reconciles and schema initialization run as single transactions; the guard keeps
//! commit/rollback explicit and adds scope-keyed advisory locking.

use std::ops::{Deref, DerefMut};

use mediashelf_core::MediaResult;
use sqlx::{PgPool, Postgres, Transaction};

/// A database transaction wrapper that automatically handles commit/rollback
///
/// # Example
///
/// ```ignore
/// use mediashelf_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> mediashelf_core::MediaResult<()> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     tx.advisory_lock("collection:1:media").await?;
///     sqlx::query("DELETE FROM ...").execute(&mut **tx).await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a PgPool) -> MediaResult<Self> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Take a transaction-scoped advisory lock keyed by `key`
    ///
    /// Released automatically on commit or rollback.
    pub async fn advisory_lock(&mut self, key: &str) -> MediaResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut ***self)
            .await?;
        Ok(())
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> MediaResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> MediaResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        self.transaction
            .as_ref()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.transaction
            .as_mut()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> Drop for TransactionGuard<'a> {
    fn drop(&mut self) {
        // sqlx rolls back a dropped transaction when its connection returns to the pool
        if self.transaction.is_some() {
            tracing::warn!(
                "Transaction was dropped without explicit commit or rollback - rolling back"
            );
        }
    }
}
