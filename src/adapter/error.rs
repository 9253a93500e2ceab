//! Adapter error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Failure reported by a resource adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The resource holds an exclusive lock, typically because another
    /// update is still in progress. Retried after a backoff.
    #[error("conflict on '{resource}': {message}")]
    Conflict {
        /// Resource the call targeted.
        resource: String,
        /// Provider message.
        message: String,
    },

    /// The provider rejected the call or could not be reached.
    #[error("{operation} failed on '{resource}': {message}")]
    Failed {
        /// Resource the call targeted.
        resource: String,
        /// Adapter operation name.
        operation: &'static str,
        /// Provider message.
        message: String,
    },

    /// The call did not complete in time.
    #[error("{operation} on '{resource}' timed out after {after:?}")]
    Timeout {
        /// Resource the call targeted.
        resource: String,
        /// Adapter operation name.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },
}

impl AdapterError {
    /// Build a conflict error.
    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Build a non-transient failure.
    pub fn failed(
        resource: impl Into<String>,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed {
            resource: resource.into(),
            operation,
            message: message.into(),
        }
    }

    /// Whether the error is an exclusive-lock conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether a later attempt may succeed without operator action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Timeout { .. })
    }
}
