//! Error types for the access store.

use std::time::Duration;

use thiserror::Error;

use super::Namespace;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An operation did not complete in time.
    #[error("store operation '{operation}' on {namespace} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Namespace the operation targeted.
        namespace: Namespace,
        /// Configured timeout.
        after: Duration,
    },

    /// The server answered with an error reply.
    #[error("store rejected '{operation}': {message}")]
    Rejected {
        /// Operation name.
        operation: &'static str,
        /// Error reply from the server.
        message: String,
    },

    /// The server answered with a reply of an unexpected shape.
    #[error("store protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Whether the failure means the store could not be reached at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
