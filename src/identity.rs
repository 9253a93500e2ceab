//! Authenticated identities and their store keys.
//!
//! The identity provider hands the engine a display name, an employee id,
//! the caller's source address and its group object ids. Everything else is
//! derived from that tuple.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::cidr::host_cidr;

/// Set of group object ids an identity belongs to.
pub type GroupSet = BTreeSet<String>;

/// Canonical store key for an identity.
///
/// Built from the display name followed by the employee id, case-folded,
/// with every non-alphanumeric character removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Derive the key for a user.
    #[must_use]
    pub fn derive(display_name: &str, employee_id: &str) -> Self {
        let key = display_name
            .chars()
            .chain(employee_id.chars())
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self(key)
    }

    /// Wrap a key read back from the store.
    #[must_use]
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key carries no characters at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity tuple produced by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Display name from the directory.
    pub display_name: String,
    /// Employee or object id from the directory.
    pub employee_id: String,
    /// Address the user connected from.
    pub source_ip: IpAddr,
    /// Group object ids the user is a member of.
    pub groups: GroupSet,
}

impl AuthenticatedUser {
    /// Create a new authenticated user.
    pub fn new(
        display_name: impl Into<String>,
        employee_id: impl Into<String>,
        source_ip: IpAddr,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            employee_id: employee_id.into(),
            source_ip,
            groups: GroupSet::new(),
        }
    }

    /// Add group memberships.
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Store key for this user.
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        IdentityKey::derive(&self.display_name, &self.employee_id)
    }

    /// Host range covering the source address (`/32` or `/128`).
    #[must_use]
    pub fn requested_cidr(&self) -> IpNet {
        host_cidr(self.source_ip)
    }
}
