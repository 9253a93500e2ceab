//! Reconciliation driver and per-resource retry handling.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::diff::RuleDiff;
use super::error::{ReconcileError, ReconcileResult};
use super::render::{render_full_rule_set, render_named_rules};
use super::state::{ReconcileState, ResourceStatus};
use crate::adapter::{AdapterError, AdapterRegistry, AdapterResult, ResourceAdapter};
use crate::policy::{AccessSnapshot, PolicyEvaluator, PolicyResult};
use crate::resource::ProtectedResource;
use crate::store::AccessStore;

/// Timing knobs of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Bound on every adapter call.
    pub adapter_timeout: Duration,
    /// Delay before a conflicting resource is retried.
    pub conflict_backoff: Duration,
    /// Consecutive conflicts tolerated before giving up until the next trigger.
    pub max_conflict_retries: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(30),
            conflict_backoff: Duration::from_secs(60),
            max_conflict_retries: 5,
        }
    }
}

/// Result of reconciling one resource in a pass.
#[derive(Debug)]
pub enum ResourceOutcome {
    /// Rules were written.
    Applied {
        /// Adapter mutation calls made.
        changes: usize,
    },
    /// The resource already matched.
    Unchanged,
    /// A conflict was hit; a retry is scheduled.
    Queued,
    /// The resource is waiting on a retry and ignored this trigger.
    Skipped,
    /// The attempt failed and will not be retried automatically.
    Failed(ReconcileError),
}

impl ResourceOutcome {
    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged => "unchanged",
            Self::Queued => "queued",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the attempt failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcomes of one reconciliation pass, in configuration order.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    outcomes: Vec<(String, ResourceOutcome)>,
}

impl ReconcileReport {
    /// Outcome per resource.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceOutcome)> {
        self.outcomes.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Outcome of the resource displayed as `resource`.
    #[must_use]
    pub fn outcome(&self, resource: &str) -> Option<&ResourceOutcome> {
        self.iter()
            .find(|(name, _)| *name == resource)
            .map(|(_, outcome)| outcome)
    }

    /// Number of resources whose attempt failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    /// Number of resources reconciled in the pass.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no resources are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.label() == label)
            .count()
    }
}

/// A configured resource with its adapter, apply lock and status.
struct ResourceSlot {
    resource: ProtectedResource,
    adapter: ResourceAdapter,
    apply_lock: Mutex<()>,
    status: Mutex<ResourceStatus>,
}

impl ResourceSlot {
    async fn is_queued(&self) -> bool {
        self.status.lock().await.state == ReconcileState::Queued
    }
}

impl fmt::Debug for ResourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSlot")
            .field("resource", &self.resource)
            .field("strategy", &self.adapter.strategy())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Shared {
    store: Arc<dyn AccessStore>,
    evaluator: PolicyEvaluator,
    config: ReconcilerConfig,
    slots: Vec<Arc<ResourceSlot>>,
    shutdown: watch::Sender<bool>,
}

/// Brings every configured resource in line with the grant store.
///
/// Passes may overlap. Application to one resource is serialized, while
/// different resources are reconciled in parallel. A resource that reports
/// an exclusive-lock conflict is queued for a single delayed retry.
#[derive(Debug, Clone)]
pub struct Reconciler {
    shared: Arc<Shared>,
}

impl Reconciler {
    /// Create a reconciler, resolving each resource's adapter.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`](crate::policy::PolicyError) if a resource
    /// has no adapter.
    pub fn new(
        store: Arc<dyn AccessStore>,
        evaluator: PolicyEvaluator,
        registry: &AdapterRegistry,
        resources: Vec<ProtectedResource>,
        config: ReconcilerConfig,
    ) -> PolicyResult<Self> {
        let slots = resources
            .into_iter()
            .map(|resource| {
                let adapter = registry.resolve(&resource)?;
                Ok(Arc::new(ResourceSlot {
                    resource,
                    adapter,
                    apply_lock: Mutex::new(()),
                    status: Mutex::new(ResourceStatus::default()),
                }))
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                evaluator,
                config,
                slots,
                shutdown,
            }),
        })
    }

    /// Configured resources, in order.
    pub fn resources(&self) -> impl Iterator<Item = &ProtectedResource> {
        self.shared.slots.iter().map(|slot| &slot.resource)
    }

    /// The evaluator used for every pass.
    #[must_use]
    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.shared.evaluator
    }

    /// Reconcile every resource against one fresh snapshot.
    ///
    /// Resource failures are reported per resource and never abort the
    /// pass.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Store`] if the snapshot cannot be read, in
    /// which case no resource is touched.
    pub async fn reconcile_all(&self) -> ReconcileResult<ReconcileReport> {
        let snapshot = match AccessSnapshot::read(self.shared.store.as_ref()).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!(operation = "reconcile_all", "Failed to read access snapshot: {e}");
                return Err(e.into());
            },
        };
        debug!(grants = snapshot.len(), "Starting reconciliation pass");

        let mut tasks = JoinSet::new();
        for (index, slot) in self.shared.slots.iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let slot = Arc::clone(slot);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn(async move { (index, shared.reconcile_slot(&slot, &snapshot).await) });
        }

        let mut outcomes: Vec<Option<ResourceOutcome>> =
            self.shared.slots.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!(operation = "reconcile_all", "Reconcile task aborted: {e}"),
            }
        }

        let report = ReconcileReport {
            outcomes: self
                .shared
                .slots
                .iter()
                .zip(outcomes)
                .map(|(slot, outcome)| {
                    let name = slot.resource.to_string();
                    let outcome = outcome.unwrap_or_else(|| {
                        ResourceOutcome::Failed(ReconcileError::Aborted {
                            resource: name.clone(),
                        })
                    });
                    (name, outcome)
                })
                .collect(),
        };

        info!(
            resources = report.len(),
            applied = report.count("applied"),
            unchanged = report.count("unchanged"),
            queued = report.count("queued"),
            skipped = report.count("skipped"),
            failed = report.failed(),
            "Reconciliation pass complete"
        );
        Ok(report)
    }

    /// Current status of every resource, in configuration order.
    pub async fn statuses(&self) -> Vec<(String, ResourceStatus)> {
        let mut statuses = Vec::with_capacity(self.shared.slots.len());
        for slot in &self.shared.slots {
            let status = slot.status.lock().await.clone();
            statuses.push((slot.resource.to_string(), status));
        }
        statuses
    }

    /// Current status of the resource displayed as `resource`.
    pub async fn status(&self, resource: &str) -> Option<ResourceStatus> {
        for slot in &self.shared.slots {
            if slot.resource.to_string() == resource {
                return Some(slot.status.lock().await.clone());
            }
        }
        None
    }

    /// Cancel pending conflict retries.
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }
}

impl Shared {
    async fn reconcile_slot(
        self: &Arc<Self>,
        slot: &Arc<ResourceSlot>,
        snapshot: &AccessSnapshot,
    ) -> ResourceOutcome {
        if slot.is_queued().await {
            debug!(resource = %slot.resource, "Retry pending, ignoring trigger");
            return ResourceOutcome::Skipped;
        }

        let _apply = slot.apply_lock.lock().await;
        if slot.is_queued().await {
            debug!(resource = %slot.resource, "Retry pending, ignoring trigger");
            return ResourceOutcome::Skipped;
        }
        self.attempt(slot, snapshot).await
    }

    /// One application attempt. The caller holds the slot's apply lock.
    async fn attempt(self: &Arc<Self>, slot: &Arc<ResourceSlot>, snapshot: &AccessSnapshot) -> ResourceOutcome {
        slot.status.lock().await.begin();
        let result = self.apply(slot, snapshot).await;

        let resource = &slot.resource;
        let mut status = slot.status.lock().await;
        match result {
            Ok(outcome) => {
                status.succeed();
                match &outcome {
                    ResourceOutcome::Applied { changes } => {
                        info!(resource = %resource, changes, "Rules applied");
                    },
                    _ => debug!(resource = %resource, "Rules already up to date"),
                }
                outcome
            },
            Err(e) if e.is_conflict() => {
                if status.conflict_retries >= self.config.max_conflict_retries {
                    let err = ReconcileError::RetriesExhausted {
                        resource: resource.to_string(),
                        attempts: status.conflict_retries + 1,
                    };
                    error!(resource = %resource, "{err}");
                    status.fail(err.to_string());
                    return ResourceOutcome::Failed(err);
                }
                status.queue(e.to_string());
                warn!(
                    resource = %resource,
                    retry = status.conflict_retries,
                    backoff = ?self.config.conflict_backoff,
                    "Conflict, queued for retry: {e}"
                );
                Self::schedule_retry(Arc::clone(self), Arc::clone(slot));
                ResourceOutcome::Queued
            },
            Err(e) => {
                error!(resource = %resource, "Reconciliation failed: {e}");
                status.fail(e.to_string());
                ResourceOutcome::Failed(e)
            },
        }
    }

    fn schedule_retry(shared: Arc<Self>, slot: Arc<ResourceSlot>) {
        let mut shutdown = shared.shutdown.subscribe();
        tokio::spawn(async move {
            if *shutdown.borrow_and_update() {
                return;
            }
            tokio::select! {
                () = sleep(shared.config.conflict_backoff) => {},
                _ = shutdown.changed() => {
                    debug!(resource = %slot.resource, "Retry cancelled by shutdown");
                    return;
                },
            }
            shared.retry(&slot).await;
        });
    }

    async fn retry(self: &Arc<Self>, slot: &Arc<ResourceSlot>) {
        let _apply = slot.apply_lock.lock().await;
        debug!(resource = %slot.resource, "Retrying after conflict");

        let snapshot = match AccessSnapshot::read(self.store.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = ReconcileError::Store(e);
                error!(resource = %slot.resource, operation = "retry", "{err}");
                slot.status.lock().await.fail(err.to_string());
                return;
            },
        };

        let outcome = self.attempt(slot, &snapshot).await;
        debug!(resource = %slot.resource, outcome = outcome.label(), "Retry finished");
    }

    async fn apply(&self, slot: &ResourceSlot, snapshot: &AccessSnapshot) -> ReconcileResult<ResourceOutcome> {
        let resource = &slot.resource;
        let desired = self.evaluator.evaluate(resource, snapshot);
        debug!(resource = %resource, entries = desired.len(), "Evaluated desired rules");

        let adapter_error = |source: AdapterError| ReconcileError::Adapter {
            resource: resource.to_string(),
            source,
        };

        match &slot.adapter {
            ResourceAdapter::FullReplace(adapter) => {
                let rules = render_full_rule_set(resource.kind, &desired).map_err(|source| {
                    ReconcileError::Render {
                        resource: resource.to_string(),
                        source,
                    }
                })?;
                self.bounded(
                    resource,
                    "apply_full_rule_set",
                    adapter.apply_full_rule_set(&resource.identity, &rules),
                )
                .await
                .map_err(adapter_error)?;
                Ok(ResourceOutcome::Applied { changes: 1 })
            },
            ResourceAdapter::DiffApply(adapter) => {
                let current = self
                    .bounded(
                        resource,
                        "list_current_rules",
                        adapter.list_current_rules(&resource.identity),
                    )
                    .await
                    .map_err(adapter_error)?;
                let diff = RuleDiff::compute(&current, &render_named_rules(resource.kind, &desired));
                if diff.is_empty() {
                    return Ok(ResourceOutcome::Unchanged);
                }

                let mut errors = Vec::new();
                for name in &diff.to_delete {
                    let call = adapter.delete_rule(&resource.identity, name);
                    if let Err(e) = self.bounded(resource, "delete_rule", call).await {
                        warn!(resource = %resource, operation = "delete_rule", rule = %name, "{e}");
                        errors.push(e);
                    }
                }
                for rule in diff.writes() {
                    let call = adapter.add_or_update_rule(&resource.identity, rule);
                    if let Err(e) = self.bounded(resource, "add_or_update_rule", call).await {
                        warn!(resource = %resource, operation = "add_or_update_rule", rule = %rule.name, "{e}");
                        errors.push(e);
                    }
                }

                let attempted = diff.mutation_count();
                if let Some(conflict) = errors.iter().find(|e| e.is_conflict()) {
                    return Err(adapter_error(conflict.clone()));
                }
                let failed = errors.len();
                match errors.into_iter().next() {
                    Some(first) => Err(ReconcileError::Partial {
                        resource: resource.to_string(),
                        attempted,
                        failed,
                        first,
                    }),
                    None => Ok(ResourceOutcome::Applied { changes: attempted }),
                }
            },
        }
    }

    async fn bounded<T, F>(
        &self,
        resource: &ProtectedResource,
        operation: &'static str,
        call: F,
    ) -> AdapterResult<T>
    where
        F: Future<Output = AdapterResult<T>>,
    {
        let after = self.config.adapter_timeout;
        match timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout {
                resource: resource.to_string(),
                operation,
                after,
            }),
        }
    }
}
