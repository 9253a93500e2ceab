//! # Resource Adapters
//!
//! The seam between the reconciler and the provider APIs that actually
//! change a resource's access rules. A resource type is served either by a
//! [`FullReplaceAdapter`], which overwrites the whole rule list in one call,
//! or by a [`DiffApplyAdapter`], which exposes named rule CRUD.
//!
//! Adapters are registered per [`ResourceKind`](crate::resource::ResourceKind)
//! in an [`AdapterRegistry`] and resolved once when the engine is built.

mod dry_run;
mod error;
mod registry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::resource::{FullRuleSet, NamedRule, ResourceIdentity, Strategy};

pub use dry_run::DryRunAdapter;
pub use error::{AdapterError, AdapterResult};
pub use registry::AdapterRegistry;

/// Provider client for resources that only accept a complete rule list.
#[async_trait]
pub trait FullReplaceAdapter: Send + Sync + fmt::Debug {
    /// Replace the resource's rule list with `rules`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Conflict`] when the resource is locked by another
    /// operation, [`AdapterError::Failed`] otherwise.
    async fn apply_full_rule_set(
        &self,
        resource: &ResourceIdentity,
        rules: &FullRuleSet,
    ) -> AdapterResult<()>;
}

/// Provider client for resources with named start/end rules.
#[async_trait]
pub trait DiffApplyAdapter: Send + Sync + fmt::Debug {
    /// Rules currently applied to the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules cannot be listed.
    async fn list_current_rules(&self, resource: &ResourceIdentity) -> AdapterResult<Vec<NamedRule>>;

    /// Create `rule`, or overwrite the rule with the same name.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Conflict`] when the resource is locked by another
    /// operation, [`AdapterError::Failed`] otherwise.
    async fn add_or_update_rule(
        &self,
        resource: &ResourceIdentity,
        rule: &NamedRule,
    ) -> AdapterResult<()>;

    /// Delete the rule called `name`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Conflict`] when the resource is locked by another
    /// operation, [`AdapterError::Failed`] otherwise.
    async fn delete_rule(&self, resource: &ResourceIdentity, name: &str) -> AdapterResult<()>;
}

/// An adapter bound to the strategy it implements.
#[derive(Debug, Clone)]
pub enum ResourceAdapter {
    /// Whole-list overwrite.
    FullReplace(Arc<dyn FullReplaceAdapter>),
    /// Named rule CRUD.
    DiffApply(Arc<dyn DiffApplyAdapter>),
}

impl ResourceAdapter {
    /// Strategy the adapter implements.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::FullReplace(_) => Strategy::FullReplace,
            Self::DiffApply(_) => Strategy::DiffApply,
        }
    }
}
