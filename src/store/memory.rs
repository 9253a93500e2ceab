//! In-process store backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{AccessStore, Namespace, NamespaceTtls, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Local in-memory store with native per-key TTL.
///
/// Each namespace sits behind its own async mutex. Expired keys are purged
/// whenever a namespace is listed, and are invisible to reads before that.
#[derive(Debug)]
pub struct MemoryStore {
    namespaces: [Mutex<HashMap<String, Entry>>; 3],
    ttls: NamespaceTtls,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(ttls: NamespaceTtls) -> Self {
        Self {
            namespaces: [
                Mutex::new(HashMap::new()),
                Mutex::new(HashMap::new()),
                Mutex::new(HashMap::new()),
            ],
            ttls,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of entries held for a namespace, expired ones included.
    pub async fn raw_len(&self, namespace: Namespace) -> usize {
        self.slot(namespace).lock().await.len()
    }

    /// Remaining lifetime of a key.
    pub async fn ttl(&self, namespace: Namespace, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.slot(namespace).lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    fn slot(&self, namespace: Namespace) -> &Mutex<HashMap<String, Entry>> {
        &self.namespaces[namespace.index()]
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(NamespaceTtls::default())
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut entries = self.slot(namespace).lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let entries = self.slot(namespace).lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.slot(namespace).lock().await.remove(key);
        Ok(())
    }

    async fn list_all(&self, namespace: Namespace) -> StoreResult<BTreeMap<String, String>> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.slot(namespace).lock().await;
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }

    async fn refresh_ttl(&self, namespace: Namespace, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        let ttl = self.ttls.for_namespace(namespace);
        let mut entries = self.slot(namespace).lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = now + ttl;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}
