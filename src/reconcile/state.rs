//! Per-resource reconciliation state.

use std::fmt;

use chrono::{DateTime, Utc};

/// Where a resource is in its reconcile cycle.
///
/// ```text
/// Idle --reconcile--> Applying --success--> Idle
/// Applying --conflict--> Queued --backoff--> Applying
/// Applying --error--> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Rules are being applied.
    Applying,
    /// Waiting out a conflict backoff; new triggers are ignored.
    Queued,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Applying => write!(f, "applying"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

/// Health view of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    /// Current state.
    pub state: ReconcileState,
    /// Conflicts seen since the last success.
    pub conflict_retries: u32,
    /// Message of the last failed attempt, cleared on success.
    pub last_error: Option<String>,
    /// When rules were last applied successfully.
    pub last_success: Option<DateTime<Utc>>,
}

impl ResourceStatus {
    /// Whether the last attempt succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub(crate) fn begin(&mut self) {
        self.state = ReconcileState::Applying;
    }

    pub(crate) fn succeed(&mut self) {
        self.state = ReconcileState::Idle;
        self.conflict_retries = 0;
        self.last_error = None;
        self.last_success = Some(Utc::now());
    }

    pub(crate) fn queue(&mut self, error: String) {
        self.state = ReconcileState::Queued;
        self.conflict_retries += 1;
        self.last_error = Some(error);
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.state = ReconcileState::Idle;
        self.conflict_retries = 0;
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut status = ResourceStatus::default();
        assert_eq!(status.state, ReconcileState::Idle);
        assert!(status.is_healthy());

        status.begin();
        assert_eq!(status.state, ReconcileState::Applying);

        status.queue("locked".to_string());
        assert_eq!(status.state, ReconcileState::Queued);
        assert_eq!(status.conflict_retries, 1);
        assert!(!status.is_healthy());

        status.begin();
        status.succeed();
        assert_eq!(status.state, ReconcileState::Idle);
        assert_eq!(status.conflict_retries, 0);
        assert!(status.is_healthy());
        assert!(status.last_success.is_some());

        status.begin();
        status.fail("forbidden".to_string());
        assert_eq!(status.state, ReconcileState::Idle);
        assert_eq!(status.last_error.as_deref(), Some("forbidden"));
    }

    #[test]
    fn test_display() {
        assert_eq!(ReconcileState::Queued.to_string(), "queued");
    }
}
