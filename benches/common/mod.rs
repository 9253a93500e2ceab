#![allow(missing_docs, dead_code)]
//! Shared benchmark support: runtimes and deterministic grant fixtures.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use ipnet::IpNet;
use r0n_allowlist::cidr::host_cidr;
use r0n_allowlist::identity::{GroupSet, IdentityKey};
use r0n_allowlist::policy::AccessSnapshot;
use r0n_allowlist::store::{encode_groups, AccessStore, MemoryStore, Namespace, NamespaceTtls};

/// Grant counts exercised by every group.
pub const GRANT_COUNTS: [usize; 4] = [10, 100, 1_000, 5_000];

/// Create a multi-threaded Tokio runtime for async benchmarks.
pub fn bench_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime for benchmarks")
}

/// Host range of the `i`th synthetic user; every seventh one is IPv6.
pub fn grant_cidr(i: usize) -> IpNet {
    let n = u32::try_from(i).unwrap_or(u32::MAX);
    let ip = if i % 7 == 6 {
        IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, (n >> 16) as u16, n as u16))
    } else {
        IpAddr::V4(Ipv4Addr::from(0x0a00_0000 | n))
    };
    host_cidr(ip)
}

pub fn key(i: usize) -> IdentityKey {
    IdentityKey::from_stored(format!("user{i:06}"))
}

/// Group membership of the `i`th user: half in "ops", the rest in "dev".
pub fn groups(i: usize) -> GroupSet {
    let mut groups = GroupSet::new();
    groups.insert(if i % 2 == 0 { "ops" } else { "dev" }.to_string());
    groups
}

pub fn snapshot(count: usize) -> AccessSnapshot {
    AccessSnapshot::from_parts(
        (0..count).map(|i| (key(i), grant_cidr(i))),
        (0..count).map(|i| (key(i), groups(i))),
    )
}

/// In-memory store pre-filled with `count` grants.
pub async fn filled_store(count: usize) -> Arc<MemoryStore> {
    let ttl = Duration::from_secs(3600);
    let store = Arc::new(MemoryStore::new(NamespaceTtls::default()));
    for i in 0..count {
        let key = key(i);
        store
            .put(Namespace::Grants, key.as_str(), &grant_cidr(i).to_string(), ttl)
            .await
            .expect("seed grant");
        store
            .put(Namespace::GroupCache, key.as_str(), &encode_groups(&groups(i)), ttl)
            .await
            .expect("seed groups");
    }
    store
}
