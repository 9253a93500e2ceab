//! Reconciliation error types.

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::cidr::CidrError;
use crate::store::StoreError;

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Failure reconciling one resource or reading the pass snapshot.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The grant store could not be read; nothing was applied.
    #[error("failed to read access snapshot: {0}")]
    Store(#[from] StoreError),

    /// The desired rules could not be rendered.
    #[error("resource '{resource}': cannot render rules: {source}")]
    Render {
        /// Resource being reconciled.
        resource: String,
        /// Range that failed to expand.
        #[source]
        source: CidrError,
    },

    /// An adapter call failed.
    #[error("resource '{resource}': {source}")]
    Adapter {
        /// Resource being reconciled.
        resource: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Some rule operations of a diff-apply resource failed; the others
    /// were applied.
    #[error("resource '{resource}': {failed} of {attempted} rule operations failed, first: {first}")]
    Partial {
        /// Resource being reconciled.
        resource: String,
        /// Operations attempted.
        attempted: usize,
        /// Operations that failed.
        failed: usize,
        /// First failure.
        first: AdapterError,
    },

    /// The reconcile task for the resource ended without an outcome.
    #[error("resource '{resource}': reconcile task aborted")]
    Aborted {
        /// Resource being reconciled.
        resource: String,
    },

    /// The resource kept reporting conflicts.
    #[error("resource '{resource}': still conflicting after {attempts} attempts")]
    RetriesExhausted {
        /// Resource being reconciled.
        resource: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl ReconcileError {
    /// Whether the failure is an exclusive-lock conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Adapter { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}
