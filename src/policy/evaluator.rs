//! Desired rule set computation.

use std::net::IpAddr;

use ipnet::IpNet;

use super::snapshot::AccessSnapshot;
use crate::cidr::{bounds, covers};
use crate::resource::ProtectedResource;

/// Where a desired entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOrigin {
    /// Resource or global static allow list.
    Static,
    /// A live grant.
    Dynamic,
}

/// One range in a [`DesiredRuleSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredEntry {
    /// Allowed range.
    pub cidr: IpNet,
    /// Source of the entry.
    pub origin: EntryOrigin,
    /// Name derived from the range bounds.
    pub name: String,
}

impl DesiredEntry {
    fn new(cidr: IpNet, origin: EntryOrigin) -> Self {
        Self {
            name: rule_name(&cidr),
            cidr,
            origin,
        }
    }
}

/// Deduplicated, ordered ranges a resource should allow.
///
/// Static entries come first, then dynamic ones ordered by address. No
/// entry is covered by another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredRuleSet {
    entries: Vec<DesiredEntry>,
}

impl DesiredRuleSet {
    /// All entries, static first.
    #[must_use]
    pub fn entries(&self) -> &[DesiredEntry] {
        &self.entries
    }

    /// Entries from static allow lists.
    pub fn static_entries(&self) -> impl Iterator<Item = &DesiredEntry> {
        self.entries
            .iter()
            .filter(|e| e.origin == EntryOrigin::Static)
    }

    /// Entries from live grants.
    pub fn dynamic_entries(&self) -> impl Iterator<Item = &DesiredEntry> {
        self.entries
            .iter()
            .filter(|e| e.origin == EntryOrigin::Dynamic)
    }

    /// Whether the exact range is present.
    #[must_use]
    pub fn contains(&self, cidr: &IpNet) -> bool {
        self.entries.iter().any(|e| &e.cidr == cidr)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deterministic rule name for a range, derived from its bounds.
///
/// `10.0.0.0/31` is named `allow-10-0-0-0-10-0-0-1`.
#[must_use]
pub fn rule_name(cidr: &IpNet) -> String {
    let (first, last) = bounds(cidr);
    format!("allow-{}-{}", name_part(first), name_part(last))
}

fn name_part(addr: IpAddr) -> String {
    addr.to_string().replace(['.', ':'], "-")
}

/// Evaluates resource policies against access snapshots.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    global_allow_list: Vec<IpNet>,
}

impl PolicyEvaluator {
    /// Create an evaluator with the resource-independent static allow list.
    #[must_use]
    pub fn new(global_allow_list: Vec<IpNet>) -> Self {
        Self { global_allow_list }
    }

    /// The global static allow list.
    #[must_use]
    pub fn global_allow_list(&self) -> &[IpNet] {
        &self.global_allow_list
    }

    /// The global entry that already covers `cidr`, if any.
    #[must_use]
    pub fn covering_entry(&self, cidr: &IpNet) -> Option<&IpNet> {
        self.global_allow_list
            .iter()
            .find(|entry| covers(entry, cidr))
    }

    /// Compute the desired rule set of `resource`.
    #[must_use]
    pub fn evaluate(
        &self,
        resource: &ProtectedResource,
        snapshot: &AccessSnapshot,
    ) -> DesiredRuleSet {
        let mut candidates: Vec<DesiredEntry> = resource
            .static_allow_list
            .iter()
            .chain(&self.global_allow_list)
            .map(|cidr| DesiredEntry::new(*cidr, EntryOrigin::Static))
            .collect();

        let mut dynamic: Vec<IpNet> = snapshot
            .grants()
            .filter(|(key, _)| resource.admits(snapshot.groups_of(key)))
            .map(|(_, cidr)| *cidr)
            .collect();
        dynamic.sort();
        candidates.extend(
            dynamic
                .into_iter()
                .map(|cidr| DesiredEntry::new(cidr, EntryOrigin::Dynamic)),
        );

        DesiredRuleSet {
            entries: drop_covered(candidates),
        }
    }
}

/// Remove entries contained in a broader entry, and later duplicates.
fn drop_covered(candidates: Vec<DesiredEntry>) -> Vec<DesiredEntry> {
    let redundant: Vec<bool> = candidates
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            candidates.iter().enumerate().any(|(j, other)| {
                j != i
                    && covers(&other.cidr, &entry.cidr)
                    && (other.cidr.prefix_len() < entry.cidr.prefix_len() || j < i)
            })
        })
        .collect();

    candidates
        .into_iter()
        .zip(redundant)
        .filter_map(|(entry, redundant)| (!redundant).then_some(entry))
        .collect()
}
