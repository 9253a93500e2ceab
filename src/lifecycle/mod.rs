//! # Access Lifecycle
//!
//! The three triggers that change what resources allow: an explicit grant,
//! an explicit revoke and the periodic sweep. Each ends in a full
//! reconciliation pass; grants and revocations also write the store first.
//!
//! Grant expiry is enforced by the store itself. The sweep exists so that
//! expired grants, and any drift on the resources, are reconciled away
//! without a user action.

mod controller;
mod error;
mod sweeper;

pub use controller::{AccessController, GrantOutcome};
pub use error::{LifecycleError, LifecycleResult};
pub use sweeper::Sweeper;
