//! # Access Store
//!
//! TTL-indexed key/value storage split into three independent namespaces:
//!
//! - [`Namespace::Grants`]: identity key → granted CIDR
//! - [`Namespace::GroupCache`]: identity key → comma-joined group ids
//! - [`Namespace::RateLimit`]: identity key → short-lived throttle marker
//!
//! Operations on one namespace are serialized; different namespaces proceed
//! independently. Two backends are provided: [`MemoryStore`] for
//! single-instance deployments and tests, and [`RedisStore`] which keeps one
//! connection per namespace.

mod error;
mod memory;
mod redis;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::redis::{RedisStore, RedisStoreConfig};

/// A logical partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Granted network ranges.
    Grants,
    /// Group membership snapshots backing the grants.
    GroupCache,
    /// Grant request throttling markers.
    RateLimit,
}

impl Namespace {
    /// All namespaces, in database-index order.
    pub const ALL: [Namespace; 3] = [Self::Grants, Self::GroupCache, Self::RateLimit];

    /// Stable position of the namespace, used as the Redis database index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Grants => 0,
            Self::GroupCache => 1,
            Self::RateLimit => 2,
        }
    }

    /// Name used in log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grants => "grants",
            Self::GroupCache => "group_cache",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default time-to-live per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceTtls {
    /// Lifetime of a grant.
    pub grants: Duration,
    /// Lifetime of a cached group list; outlives the grant it backs.
    pub group_cache: Duration,
    /// Lifetime of a throttle marker.
    pub rate_limit: Duration,
}

impl NamespaceTtls {
    /// Build TTLs from a grant lifetime and the group cache margin.
    #[must_use]
    pub fn new(grants: Duration, group_margin: Duration, rate_limit: Duration) -> Self {
        Self {
            grants,
            group_cache: grants + group_margin,
            rate_limit,
        }
    }

    /// TTL for the given namespace.
    #[must_use]
    pub fn for_namespace(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Grants => self.grants,
            Namespace::GroupCache => self.group_cache,
            Namespace::RateLimit => self.rate_limit,
        }
    }
}

impl Default for NamespaceTtls {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(24 * 3600),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        )
    }
}

/// Backing store for grants, group snapshots and throttle markers.
///
/// Implementations must be safe to call concurrently and must never let two
/// operations on the same namespace interleave on the wire.
#[async_trait]
pub trait AccessStore: Send + Sync + fmt::Debug {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn put(&self, namespace: Namespace, key: &str, value: &str, ttl: Duration)
        -> StoreResult<()>;

    /// Fetch the live value under `key`.
    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, namespace: Namespace, key: &str) -> StoreResult<()>;

    /// Every live entry of the namespace.
    async fn list_all(&self, namespace: Namespace) -> StoreResult<BTreeMap<String, String>>;

    /// Reset the expiry of `key` to the namespace default.
    ///
    /// Returns `false` when the key does not exist.
    async fn refresh_ttl(&self, namespace: Namespace, key: &str) -> StoreResult<bool>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

/// Encode a group set for the group cache namespace.
#[must_use]
pub fn encode_groups<'a, I>(groups: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    groups
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a group set stored by [`encode_groups`].
#[must_use]
pub fn decode_groups(value: &str) -> crate::identity::GroupSet {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_index() {
        let indexes: Vec<usize> = Namespace::ALL.iter().map(|ns| ns.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(Namespace::GroupCache.to_string(), "group_cache");
    }

    #[test]
    fn test_ttls() {
        let ttls = NamespaceTtls::default();
        assert_eq!(ttls.for_namespace(Namespace::Grants), Duration::from_secs(86_400));
        assert_eq!(
            ttls.for_namespace(Namespace::GroupCache),
            Duration::from_secs(90_000)
        );
        assert_eq!(ttls.for_namespace(Namespace::RateLimit), Duration::from_secs(60));
    }

    #[test]
    fn test_group_encoding() {
        let groups = decode_groups("b, a,,c");
        assert_eq!(groups.len(), 3);
        assert_eq!(encode_groups(&groups), "a,b,c");
        assert!(decode_groups("").is_empty());
    }
}
