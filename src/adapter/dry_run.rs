//! Adapter that only logs and remembers what it was asked to apply.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::{AdapterResult, DiffApplyAdapter, FullReplaceAdapter};
use crate::resource::{FullRuleSet, NamedRule, ResourceIdentity};

/// In-process stand-in for provider clients.
///
/// Full rule sets are kept per resource, named rules per resource and name,
/// so listing returns exactly what was applied before.
#[derive(Debug, Default)]
pub struct DryRunAdapter {
    full: Mutex<HashMap<ResourceIdentity, FullRuleSet>>,
    named: Mutex<HashMap<ResourceIdentity, BTreeMap<String, NamedRule>>>,
}

impl DryRunAdapter {
    /// Create an adapter with nothing applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last full rule set applied to `resource`.
    pub async fn applied_rule_set(&self, resource: &ResourceIdentity) -> Option<FullRuleSet> {
        self.full.lock().await.get(resource).cloned()
    }

    /// Named rules currently held for `resource`, ordered by name.
    pub async fn applied_rules(&self, resource: &ResourceIdentity) -> Vec<NamedRule> {
        self.named
            .lock()
            .await
            .get(resource)
            .map(|rules| rules.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FullReplaceAdapter for DryRunAdapter {
    async fn apply_full_rule_set(
        &self,
        resource: &ResourceIdentity,
        rules: &FullRuleSet,
    ) -> AdapterResult<()> {
        info!(
            resource = %resource,
            operation = "apply_full_rule_set",
            entries = rules.entry_count(),
            "Dry run: would replace rule set"
        );
        self.full.lock().await.insert(resource.clone(), rules.clone());
        Ok(())
    }
}

#[async_trait]
impl DiffApplyAdapter for DryRunAdapter {
    async fn list_current_rules(&self, resource: &ResourceIdentity) -> AdapterResult<Vec<NamedRule>> {
        Ok(self.applied_rules(resource).await)
    }

    async fn add_or_update_rule(
        &self,
        resource: &ResourceIdentity,
        rule: &NamedRule,
    ) -> AdapterResult<()> {
        info!(
            resource = %resource,
            operation = "add_or_update_rule",
            rule = %rule.name,
            start = %rule.start,
            end = %rule.end,
            "Dry run: would write rule"
        );
        self.named
            .lock()
            .await
            .entry(resource.clone())
            .or_default()
            .insert(rule.name.clone(), rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, resource: &ResourceIdentity, name: &str) -> AdapterResult<()> {
        info!(
            resource = %resource,
            operation = "delete_rule",
            rule = %name,
            "Dry run: would delete rule"
        );
        if let Some(rules) = self.named.lock().await.get_mut(resource) {
            rules.remove(name);
        }
        Ok(())
    }
}
