//! Adapter lookup by resource kind.

use std::collections::HashMap;
use std::sync::Arc;

use super::{DryRunAdapter, ResourceAdapter};
use crate::policy::{PolicyError, PolicyResult};
use crate::resource::{ProtectedResource, ResourceKind, Strategy};

/// Adapters keyed by the resource kind they serve.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ResourceKind, ResourceAdapter>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving every kind with one shared [`DryRunAdapter`].
    #[must_use]
    pub fn dry_run() -> Self {
        let adapter = Arc::new(DryRunAdapter::new());
        let mut registry = Self::new();
        for kind in ResourceKind::ALL {
            let entry = match kind.strategy() {
                Strategy::FullReplace => ResourceAdapter::FullReplace(adapter.clone()),
                Strategy::DiffApply => ResourceAdapter::DiffApply(adapter.clone()),
            };
            registry.adapters.insert(kind, entry);
        }
        registry
    }

    /// Register the adapter for `kind`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::StrategyMismatch`] if the adapter does not
    /// implement the strategy `kind` is reconciled with.
    pub fn register(&mut self, kind: ResourceKind, adapter: ResourceAdapter) -> PolicyResult<()> {
        if adapter.strategy() != kind.strategy() {
            return Err(PolicyError::StrategyMismatch {
                kind,
                expected: kind.strategy(),
                actual: adapter.strategy(),
            });
        }
        self.adapters.insert(kind, adapter);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn with(mut self, kind: ResourceKind, adapter: ResourceAdapter) -> PolicyResult<Self> {
        self.register(kind, adapter)?;
        Ok(self)
    }

    /// Whether an adapter serves `kind`.
    #[must_use]
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    /// Adapter for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MissingAdapter`] if no adapter serves the
    /// resource's kind.
    pub fn resolve(&self, resource: &ProtectedResource) -> PolicyResult<ResourceAdapter> {
        self.adapters
            .get(&resource.kind)
            .cloned()
            .ok_or(PolicyError::MissingAdapter(resource.kind))
    }
}
