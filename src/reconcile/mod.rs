//! # Reconciler
//!
//! Turns the desired rule set of each protected resource into its native
//! rule shape and applies it through the resource's adapter.
//!
//! Full-replace resources get their whole rule list resubmitted on every
//! pass. Diff-apply resources have their named rules listed and compared by
//! name, then stale rules are deleted before new and changed ones are
//! written. Each rule operation is tracked on its own so one failure does
//! not block the rest.
//!
//! Every resource carries a [`ReconcileState`]. An exclusive-lock conflict
//! moves it to [`ReconcileState::Queued`] and schedules one delayed retry;
//! triggers that arrive meanwhile are ignored for that resource only.

mod diff;
mod error;
mod reconciler;
mod render;
mod state;

pub use diff::RuleDiff;
pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerConfig, ResourceOutcome};
pub use render::{
    render_full_rule_set, render_named_rules, BLOCK_ALL_PRIORITY, BLOCK_ALL_RULE, BLOCK_STATUS,
    BOT_MANAGER_RULE_SET,
};
pub use state::{ReconcileState, ResourceStatus};
