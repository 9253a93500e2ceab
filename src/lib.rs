//! # R0N Allowlist
//!
//! Per-user, time-limited network allow-list exceptions for protected cloud
//! resources, continuously reconciled against each resource's own access
//! control.
//!
//! ## Features
//!
//! - Grants keyed by identity, with store-enforced expiry
//! - Group-based authorization per resource
//! - Full-replace and diff-apply reconciliation strategies
//! - Single delayed retry for resources holding an exclusive lock
//! - In-memory and Redis access stores
//!
//! ## Architecture
//!
//! An authenticated user's grant flows through the
//! [`lifecycle::AccessController`] into the [`store::AccessStore`], then the
//! [`reconcile::Reconciler`] evaluates each [`resource::ProtectedResource`]
//! with the [`policy::PolicyEvaluator`] and applies the result through the
//! resource's [`adapter::ResourceAdapter`]. The [`engine::Engine`] wires these
//! together and runs the periodic sweep.

pub mod adapter;
pub mod cidr;
pub mod config;
pub mod engine;
pub mod identity;
pub mod lifecycle;
pub mod policy;
pub mod reconcile;
pub mod resource;
pub mod store;
pub mod telemetry;
