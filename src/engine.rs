//! # Engine
//!
//! Explicit wiring of the store, policy evaluator, reconciler and
//! lifecycle controller. An [`Engine`] is built once from a loaded
//! [`AllowlistConfig`] and owns the background sweep and store keep-alive
//! tasks.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapter::AdapterRegistry;
use crate::config::{AllowlistConfig, StoreBackend};
use crate::identity::{AuthenticatedUser, IdentityKey};
use crate::lifecycle::{AccessController, GrantOutcome, LifecycleResult, Sweeper};
use crate::policy::{PolicyError, PolicyEvaluator};
use crate::reconcile::{ReconcileReport, Reconciler, ResourceStatus};
use crate::store::{AccessStore, MemoryStore, RedisStore, RedisStoreConfig, StoreError};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building or starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The access store could not be reached at startup.
    #[error("access store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// A resource definition cannot be enforced.
    #[error("invalid resource definition: {0}")]
    Policy(#[from] PolicyError),

    /// `start` was called on a running engine.
    #[error("engine already started")]
    AlreadyStarted,
}

/// Background tasks of a started engine.
#[derive(Debug)]
struct Background {
    sweeper: Sweeper,
    keep_alive: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

/// The access reconciliation engine.
#[derive(Debug)]
pub struct Engine {
    store: Arc<dyn AccessStore>,
    controller: AccessController,
    sweep_interval: Duration,
    keep_alive: Option<Duration>,
    background: Option<Background>,
}

impl Engine {
    /// Build an engine over an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Policy`] if a resource or allow list does not
    /// resolve, or a resource kind has no adapter.
    pub fn new(
        config: &AllowlistConfig,
        store: Arc<dyn AccessStore>,
        registry: &AdapterRegistry,
    ) -> EngineResult<Self> {
        let evaluator = PolicyEvaluator::new(config.global_allow_list()?);
        let resources = config.protected_resources()?;
        info!(resources = resources.len(), "Resolved protected resources");

        let reconciler = Reconciler::new(
            Arc::clone(&store),
            evaluator,
            registry,
            resources,
            config.reconciler_config(),
        )?;
        let controller = AccessController::new(Arc::clone(&store), reconciler, config.namespace_ttls());

        let keep_alive = match config.store.backend {
            StoreBackend::Redis => Some(config.store.redis.keep_alive),
            StoreBackend::Memory => None,
        };

        Ok(Self {
            store,
            controller,
            sweep_interval: config.engine.sweep_interval,
            keep_alive,
            background: None,
        })
    }

    /// Build an engine with the store backend named in the configuration.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_config(config: &AllowlistConfig, registry: &AdapterRegistry) -> EngineResult<Self> {
        Self::new(config, open_store(config), registry)
    }

    /// Check the store, then start the sweep and keep-alive loops.
    ///
    /// The first sweep runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StoreUnavailable`] if the store does not
    /// answer; this is the only fatal runtime failure.
    pub async fn start(&mut self) -> EngineResult<()> {
        if self.background.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        if let Err(e) = self.store.ping().await {
            error!(operation = "start", "Access store unavailable: {e}");
            return Err(EngineError::StoreUnavailable(e));
        }
        info!("Access store reachable");

        let sweeper = Sweeper::spawn(self.controller.clone(), self.sweep_interval);
        let keep_alive = self
            .keep_alive
            .map(|every| spawn_keep_alive(Arc::clone(&self.store), every));

        self.background = Some(Background {
            sweeper,
            keep_alive,
        });
        Ok(())
    }

    /// Stop background loops and cancel pending conflict retries.
    pub async fn shutdown(&mut self) {
        self.controller.reconciler().shutdown();
        if let Some(background) = self.background.take() {
            background.sweeper.stop().await;
            if let Some((shutdown_tx, handle)) = background.keep_alive {
                let _ = shutdown_tx.send(()).await;
                if let Err(e) = handle.await {
                    warn!("Keep-alive task ended abnormally: {e}");
                }
            }
        }
        info!("Engine stopped");
    }

    /// Whether background loops are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.background.is_some()
    }

    /// The lifecycle controller.
    #[must_use]
    pub fn controller(&self) -> &AccessController {
        &self.controller
    }

    /// Grant an authenticated user access from their source address.
    ///
    /// # Errors
    ///
    /// See [`AccessController::grant`].
    pub async fn grant(&self, user: &AuthenticatedUser) -> LifecycleResult<GrantOutcome> {
        self.controller.grant_user(user).await
    }

    /// Revoke the grant of `key`.
    ///
    /// # Errors
    ///
    /// See [`AccessController::revoke`].
    pub async fn revoke(&self, key: &IdentityKey) -> LifecycleResult<bool> {
        self.controller.revoke(key).await
    }

    /// Whether `key` should be refused for requesting too often.
    ///
    /// # Errors
    ///
    /// See [`AccessController::throttle`].
    pub async fn throttle(&self, key: &IdentityKey) -> LifecycleResult<bool> {
        self.controller.throttle(key).await
    }

    /// Run a reconciliation pass now.
    ///
    /// # Errors
    ///
    /// See [`AccessController::sweep`].
    pub async fn reconcile_all(&self) -> LifecycleResult<ReconcileReport> {
        self.controller.sweep().await
    }

    /// Per-resource reconcile status.
    pub async fn statuses(&self) -> Vec<(String, ResourceStatus)> {
        self.controller.reconciler().statuses().await
    }
}

/// Build the store backend named in the configuration.
///
/// No connection is made; [`Engine::start`] checks reachability.
#[must_use]
pub fn open_store(config: &AllowlistConfig) -> Arc<dyn AccessStore> {
    let ttls = config.namespace_ttls();
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory access store");
            Arc::new(MemoryStore::new(ttls))
        },
        StoreBackend::Redis => {
            let redis = RedisStoreConfig::from(&config.store.redis);
            info!(host = %redis.host, port = redis.port, "Using redis access store");
            Arc::new(RedisStore::new(redis, ttls))
        },
    }
}

fn spawn_keep_alive(store: Arc<dyn AccessStore>, every: Duration) -> (mpsc::Sender<()>, JoinHandle<()>) {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Startup already pinged.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.ping().await {
                        Ok(()) => debug!("Store keep-alive OK"),
                        Err(e) => warn!(operation = "keep_alive", "Store keep-alive failed: {e}"),
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!("Keep-alive shutting down");
                    break;
                },
            }
        }
    });

    (shutdown_tx, handle)
}
