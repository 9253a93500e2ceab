//! Resource types and their reconciliation strategy.

use std::fmt;
use std::str::FromStr;

use crate::policy::PolicyError;

/// How a resource's rules are brought in line with the desired set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The whole rule list is overwritten in one call.
    FullReplace,
    /// Named rules are listed, then added, updated and deleted one by one.
    DiffApply,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullReplace => write!(f, "full-replace"),
            Self::DiffApply => write!(f, "diff-apply"),
        }
    }
}

/// Supported resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Edge web application firewall policy (`frontdoor`).
    EdgeWafPolicy,
    /// Blob storage account (`storageaccount`).
    BlobStore,
    /// Secret vault (`keyvault`).
    SecretStore,
    /// Managed relational database server (`postgres`).
    RelationalDb,
    /// Managed cache (`redis`).
    CacheDb,
    /// Document database account (`cosmosdb`).
    DocumentDb,
}

impl ResourceKind {
    /// Every supported kind.
    pub const ALL: [ResourceKind; 6] = [
        Self::EdgeWafPolicy,
        Self::BlobStore,
        Self::SecretStore,
        Self::RelationalDb,
        Self::CacheDb,
        Self::DocumentDb,
    ];

    /// Configuration name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EdgeWafPolicy => "frontdoor",
            Self::BlobStore => "storageaccount",
            Self::SecretStore => "keyvault",
            Self::RelationalDb => "postgres",
            Self::CacheDb => "redis",
            Self::DocumentDb => "cosmosdb",
        }
    }

    /// Reconciliation strategy for the kind.
    #[must_use]
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::RelationalDb | Self::CacheDb => Strategy::DiffApply,
            Self::EdgeWafPolicy | Self::BlobStore | Self::SecretStore | Self::DocumentDb => {
                Strategy::FullReplace
            },
        }
    }

    /// Maximum number of address entries a single native rule may hold.
    #[must_use]
    pub const fn max_entries_per_rule(self) -> Option<usize> {
        match self {
            Self::EdgeWafPolicy => Some(100),
            _ => None,
        }
    }

    /// Whether the resource accepts IPv6 entries.
    #[must_use]
    pub const fn supports_ipv6(self) -> bool {
        matches!(self, Self::EdgeWafPolicy)
    }

    /// Whether `/31` and `/32` ranges must be written as bare addresses.
    #[must_use]
    pub const fn rejects_small_prefixes(self) -> bool {
        matches!(self, Self::BlobStore)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| PolicyError::UnsupportedResourceType(s.to_string()))
    }
}
