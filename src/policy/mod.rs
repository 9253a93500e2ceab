//! # Policy Evaluator
//!
//! Computes, per protected resource, the set of ranges that should be
//! allowed right now: the resource's static allow list and the global one,
//! plus every live grant whose holder passes the resource's group filter.
//! Entries already covered by a broader entry are dropped.

mod error;
mod evaluator;
mod snapshot;

pub use error::{PolicyError, PolicyResult};
pub use evaluator::{rule_name, DesiredEntry, DesiredRuleSet, EntryOrigin, PolicyEvaluator};
pub use snapshot::AccessSnapshot;
