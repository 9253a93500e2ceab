//! Lifecycle error types.

use thiserror::Error;

use crate::reconcile::ReconcileError;
use crate::store::StoreError;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Failure of a grant, revoke, throttle or sweep.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The identity normalized to an empty key.
    #[error("identity key is empty")]
    EmptyIdentity,

    /// The grant store failed; the operation had no effect past this point.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// State was stored but the follow-up reconciliation could not run.
    #[error("reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl LifecycleError {
    /// Whether the backing store could not be reached.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_unavailable(),
            Self::Reconcile(ReconcileError::Store(e)) => e.is_unavailable(),
            _ => false,
        }
    }
}
