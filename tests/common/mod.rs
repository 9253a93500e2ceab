#![allow(dead_code)]
//! Shared fixtures for integration tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use r0n_allowlist::adapter::{
    AdapterError, AdapterRegistry, AdapterResult, DiffApplyAdapter, FullReplaceAdapter,
    ResourceAdapter,
};
use r0n_allowlist::config::{AllowlistConfig, ResourceEntry};
use r0n_allowlist::engine::Engine;
use r0n_allowlist::resource::{FullRuleSet, NamedRule, ResourceIdentity, ResourceKind, Strategy};
use r0n_allowlist::store::MemoryStore;

/// One adapter call as seen by [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Apply { resource: String, rules: FullRuleSet },
    List { resource: String },
    Write { resource: String, rule: NamedRule },
    Delete { resource: String, name: String },
}

impl Call {
    pub fn resource(&self) -> &str {
        match self {
            Self::Apply { resource, .. }
            | Self::List { resource }
            | Self::Write { resource, .. }
            | Self::Delete { resource, .. } => resource,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List { .. })
    }
}

/// Adapter that records every call and can report conflicts on demand.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    calls: Mutex<Vec<Call>>,
    rules: Mutex<HashMap<String, BTreeMap<String, NamedRule>>>,
    conflicts: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, usize>>,
}

impl RecordingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Report a conflict for the next `times` mutations of resource `name`.
    pub fn conflict_next(&self, name: &str, times: usize) {
        self.conflicts.lock().unwrap().insert(name.to_string(), times);
    }

    /// Fail the next `times` mutations of resource `name` with a non-conflict error.
    pub fn fail_next(&self, name: &str, times: usize) {
        self.failures.lock().unwrap().insert(name.to_string(), times);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.resource() == name)
            .collect()
    }

    pub fn mutations_for(&self, name: &str) -> usize {
        self.calls_for(name).iter().filter(|c| c.is_mutation()).count()
    }

    pub fn payloads_for(&self, name: &str) -> Vec<FullRuleSet> {
        self.calls_for(name)
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply { rules, .. } => Some(rules),
                _ => None,
            })
            .collect()
    }

    pub fn rules_for(&self, name: &str) -> Vec<NamedRule> {
        self.rules
            .lock()
            .unwrap()
            .get(name)
            .map(|rules| rules.values().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, call: Call) -> AdapterResult<()> {
        let resource = call.resource().to_string();
        self.calls.lock().unwrap().push(call);

        if take_one(&self.conflicts, &resource) {
            return Err(AdapterError::conflict(resource, "another operation is in progress"));
        }
        if take_one(&self.failures, &resource) {
            return Err(AdapterError::failed(resource, "write", "rejected by provider"));
        }
        Ok(())
    }
}

fn take_one(counters: &Mutex<HashMap<String, usize>>, resource: &str) -> bool {
    let mut counters = counters.lock().unwrap();
    match counters.get_mut(resource) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        },
        _ => false,
    }
}

#[async_trait]
impl FullReplaceAdapter for RecordingAdapter {
    async fn apply_full_rule_set(
        &self,
        resource: &ResourceIdentity,
        rules: &FullRuleSet,
    ) -> AdapterResult<()> {
        self.record(Call::Apply {
            resource: resource.name.clone(),
            rules: rules.clone(),
        })
    }
}

#[async_trait]
impl DiffApplyAdapter for RecordingAdapter {
    async fn list_current_rules(&self, resource: &ResourceIdentity) -> AdapterResult<Vec<NamedRule>> {
        self.calls.lock().unwrap().push(Call::List {
            resource: resource.name.clone(),
        });
        Ok(self.rules_for(&resource.name))
    }

    async fn add_or_update_rule(
        &self,
        resource: &ResourceIdentity,
        rule: &NamedRule,
    ) -> AdapterResult<()> {
        self.record(Call::Write {
            resource: resource.name.clone(),
            rule: rule.clone(),
        })?;
        self.rules
            .lock()
            .unwrap()
            .entry(resource.name.clone())
            .or_default()
            .insert(rule.name.clone(), rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, resource: &ResourceIdentity, name: &str) -> AdapterResult<()> {
        self.record(Call::Delete {
            resource: resource.name.clone(),
            name: name.to_string(),
        })?;
        if let Some(rules) = self.rules.lock().unwrap().get_mut(&resource.name) {
            rules.remove(name);
        }
        Ok(())
    }
}

/// Full-replace adapter whose calls take a while and track how many overlap.
#[derive(Debug)]
pub struct SlowAdapter {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowAdapter {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FullReplaceAdapter for SlowAdapter {
    async fn apply_full_rule_set(
        &self,
        _resource: &ResourceIdentity,
        _rules: &FullRuleSet,
    ) -> AdapterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry serving every kind with `adapter`.
pub fn registry(adapter: &Arc<RecordingAdapter>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for kind in ResourceKind::ALL {
        let entry = match kind.strategy() {
            Strategy::FullReplace => ResourceAdapter::FullReplace(adapter.clone()),
            Strategy::DiffApply => ResourceAdapter::DiffApply(adapter.clone()),
        };
        registry.register(kind, entry).unwrap();
    }
    registry
}

/// Configuration with the given global allow list and resources.
pub fn config(global: &[&str], resources: Vec<ResourceEntry>) -> AllowlistConfig {
    AllowlistConfig {
        ip_allowlist: global.iter().map(|s| s.to_string()).collect(),
        resources,
        ..AllowlistConfig::default()
    }
}

/// Engine over a fresh in-memory store.
pub fn engine(config: &AllowlistConfig, adapter: &Arc<RecordingAdapter>) -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(config.namespace_ttls()));
    let engine = Engine::new(config, store.clone(), &registry(adapter)).unwrap();
    (engine, store)
}
