//! Grant, revoke and throttle handling.

use std::fmt;
use std::sync::Arc;

use ipnet::IpNet;
use tracing::{debug, info, warn};

use super::error::{LifecycleError, LifecycleResult};
use crate::cidr::parse_cidr;
use crate::identity::{AuthenticatedUser, GroupSet, IdentityKey};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::{decode_groups, encode_groups, AccessStore, Namespace, NamespaceTtls};

const THROTTLE_MARKER: &str = "1";

/// What a grant request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// No grant existed; one was stored and resources reconciled.
    Created,
    /// A grant for a different range was overwritten and resources
    /// reconciled.
    Replaced {
        /// Range of the overwritten grant.
        previous: IpNet,
    },
    /// The same range was already granted; its expiry was extended.
    /// Resources are only reconciled when the cached groups changed.
    Refreshed {
        /// Whether the group snapshot differed from the cached one.
        groups_changed: bool,
    },
    /// The range is inside the global static allow list; nothing was stored.
    AlreadyCovered {
        /// Static entry covering the request.
        by: IpNet,
    },
}

/// Drives grants, revocations and sweeps against the store and reconciler.
#[derive(Clone)]
pub struct AccessController {
    store: Arc<dyn AccessStore>,
    reconciler: Reconciler,
    ttls: NamespaceTtls,
}

impl AccessController {
    /// Create a controller.
    #[must_use]
    pub fn new(store: Arc<dyn AccessStore>, reconciler: Reconciler, ttls: NamespaceTtls) -> Self {
        Self {
            store,
            reconciler,
            ttls,
        }
    }

    /// The reconciler triggered by this controller.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Grant an authenticated user access from their source address.
    ///
    /// # Errors
    ///
    /// See [`grant`](Self::grant).
    pub async fn grant_user(&self, user: &AuthenticatedUser) -> LifecycleResult<GrantOutcome> {
        self.grant(&user.key(), &user.groups, user.requested_cidr())
            .await
    }

    /// Grant `key` access from `cidr`.
    ///
    /// Requests covered by the global static allow list are refused without
    /// touching the store. A repeat request for the same range only extends
    /// the expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the store fails, or the
    /// follow-up reconciliation cannot read its snapshot.
    pub async fn grant(
        &self,
        key: &IdentityKey,
        groups: &GroupSet,
        cidr: IpNet,
    ) -> LifecycleResult<GrantOutcome> {
        if key.is_empty() {
            return Err(LifecycleError::EmptyIdentity);
        }

        if let Some(by) = self.reconciler.evaluator().covering_entry(&cidr) {
            info!(identity = %key, cidr = %cidr, covered_by = %by, "Grant already covered by static allow list");
            return Ok(GrantOutcome::AlreadyCovered { by: *by });
        }

        let current = self.store.get(Namespace::Grants, key.as_str()).await?;
        let previous = current.as_deref().and_then(|value| match parse_cidr(value) {
            Ok(previous) => Some(previous),
            Err(e) => {
                warn!(identity = %key, value = %value, "Overwriting unparsable grant: {e}");
                None
            },
        });

        if previous == Some(cidr) && self.store.refresh_ttl(Namespace::Grants, key.as_str()).await? {
            let groups_changed = self.refresh_groups(key, groups).await?;
            info!(identity = %key, cidr = %cidr, groups_changed, "Grant refreshed");
            if groups_changed {
                self.trigger("grant").await?;
            }
            return Ok(GrantOutcome::Refreshed { groups_changed });
        }

        // Groups go first: a cached group list without a grant is never applied.
        self.store
            .put(
                Namespace::GroupCache,
                key.as_str(),
                &encode_groups(groups),
                self.ttls.group_cache,
            )
            .await?;
        self.store
            .put(Namespace::Grants, key.as_str(), &cidr.to_string(), self.ttls.grants)
            .await?;

        let outcome = match previous {
            Some(previous) if previous != cidr => {
                info!(identity = %key, from = %previous, to = %cidr, "Grant replaced");
                GrantOutcome::Replaced { previous }
            },
            _ => {
                info!(identity = %key, cidr = %cidr, "Grant created");
                GrantOutcome::Created
            },
        };

        self.trigger("grant").await?;
        Ok(outcome)
    }

    /// Remove the grant and cached groups of `key`.
    ///
    /// Returns whether a grant existed. Resources are reconciled either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the reconciliation cannot read
    /// its snapshot.
    pub async fn revoke(&self, key: &IdentityKey) -> LifecycleResult<bool> {
        if key.is_empty() {
            return Err(LifecycleError::EmptyIdentity);
        }

        let existed = self.store.get(Namespace::Grants, key.as_str()).await?.is_some();
        self.store.delete(Namespace::Grants, key.as_str()).await?;
        self.store.delete(Namespace::GroupCache, key.as_str()).await?;
        info!(identity = %key, existed, "Grant revoked");

        self.trigger("revoke").await?;
        Ok(existed)
    }

    /// Whether `key` made a grant request too recently.
    ///
    /// The first call in a rate-limit window sets the marker and returns
    /// `false`; later calls in the window return `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn throttle(&self, key: &IdentityKey) -> LifecycleResult<bool> {
        if self.store.get(Namespace::RateLimit, key.as_str()).await?.is_some() {
            debug!(identity = %key, "Request throttled");
            return Ok(true);
        }
        self.store
            .put(Namespace::RateLimit, key.as_str(), THROTTLE_MARKER, self.ttls.rate_limit)
            .await?;
        Ok(false)
    }

    /// Reconcile every resource unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconciliation cannot read its snapshot.
    pub async fn sweep(&self) -> LifecycleResult<ReconcileReport> {
        debug!("Sweeping grants");
        Ok(self.reconciler.reconcile_all().await?)
    }

    async fn refresh_groups(&self, key: &IdentityKey, groups: &GroupSet) -> LifecycleResult<bool> {
        let cached = self.store.get(Namespace::GroupCache, key.as_str()).await?;
        let unchanged = cached.as_deref().map(decode_groups).as_ref() == Some(groups);

        if unchanged && self.store.refresh_ttl(Namespace::GroupCache, key.as_str()).await? {
            return Ok(false);
        }
        self.store
            .put(
                Namespace::GroupCache,
                key.as_str(),
                &encode_groups(groups),
                self.ttls.group_cache,
            )
            .await?;
        Ok(!unchanged)
    }

    async fn trigger(&self, operation: &'static str) -> LifecycleResult<()> {
        let report = self.reconciler.reconcile_all().await?;
        if report.failed() > 0 {
            warn!(operation, failed = report.failed(), "Some resources failed to reconcile");
        }
        Ok(())
    }
}

impl fmt::Debug for AccessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessController")
            .field("store", &self.store)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}
