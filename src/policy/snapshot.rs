//! Point-in-time view of the grant store.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use tracing::{debug, warn};

use crate::cidr::parse_cidr;
use crate::identity::{GroupSet, IdentityKey};
use crate::store::{decode_groups, AccessStore, Namespace, StoreResult};

/// Live grants and group memberships, read once per reconciliation pass.
///
/// Every resource in a pass is evaluated against the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct AccessSnapshot {
    grants: BTreeMap<IdentityKey, IpNet>,
    groups: HashMap<IdentityKey, GroupSet>,
    taken_at: Option<DateTime<Utc>>,
}

impl AccessSnapshot {
    /// Read the grant and group namespaces.
    ///
    /// Grants whose stored value is not a valid range are skipped with a
    /// warning; they can never be turned into rules.
    ///
    /// # Errors
    ///
    /// Returns the store error if either namespace cannot be listed.
    pub async fn read(store: &dyn AccessStore) -> StoreResult<Self> {
        let raw_grants = store.list_all(Namespace::Grants).await?;
        let raw_groups = store.list_all(Namespace::GroupCache).await?;

        let mut grants = BTreeMap::new();
        for (key, value) in raw_grants {
            match parse_cidr(&value) {
                Ok(cidr) => {
                    debug!(identity = %key, cidr = %cidr, "Current grant");
                    grants.insert(IdentityKey::from_stored(key), cidr);
                },
                Err(e) => warn!(identity = %key, value = %value, "Skipping unparsable grant: {e}"),
            }
        }

        let groups = raw_groups
            .into_iter()
            .map(|(key, value)| (IdentityKey::from_stored(key), decode_groups(&value)))
            .collect();

        Ok(Self {
            grants,
            groups,
            taken_at: Some(Utc::now()),
        })
    }

    /// Build a snapshot directly.
    #[must_use]
    pub fn from_parts(
        grants: impl IntoIterator<Item = (IdentityKey, IpNet)>,
        groups: impl IntoIterator<Item = (IdentityKey, GroupSet)>,
    ) -> Self {
        Self {
            grants: grants.into_iter().collect(),
            groups: groups.into_iter().collect(),
            taken_at: None,
        }
    }

    /// Live grants, ordered by identity key.
    pub fn grants(&self) -> impl Iterator<Item = (&IdentityKey, &IpNet)> {
        self.grants.iter()
    }

    /// Cached groups of an identity.
    #[must_use]
    pub fn groups_of(&self, key: &IdentityKey) -> Option<&GroupSet> {
        self.groups.get(key)
    }

    /// Number of live grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether there are no live grants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// When the snapshot was read from the store.
    #[must_use]
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_read_snapshot() {
        let store = MemoryStore::default();
        let ttl = Duration::from_secs(60);
        store.put(Namespace::Grants, "alice1", "10.0.0.1/32", ttl).await.unwrap();
        store.put(Namespace::Grants, "bob2", "garbage", ttl).await.unwrap();
        store.put(Namespace::GroupCache, "alice1", "ops,dev", ttl).await.unwrap();

        let snapshot = AccessSnapshot::read(&store).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.taken_at().is_some());

        let alice = IdentityKey::from_stored("alice1");
        let (key, cidr) = snapshot.grants().next().unwrap();
        assert_eq!(key, &alice);
        assert_eq!(cidr.to_string(), "10.0.0.1/32");
        assert_eq!(snapshot.groups_of(&alice).map(GroupSet::len), Some(2));
    }

    #[tokio::test]
    async fn test_read_unavailable_store() {
        let store = MemoryStore::default();
        store.set_available(false);
        assert!(AccessSnapshot::read(&store).await.is_err());
    }
}
