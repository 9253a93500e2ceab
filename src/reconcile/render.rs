//! Conversion of desired rule sets into native rule shapes.

use ipnet::IpNet;
use tracing::debug;

use crate::cidr::{bounds, chunk, expand_range, strip_mask, CidrResult};
use crate::policy::{DesiredEntry, DesiredRuleSet};
use crate::resource::{
    FullRuleSet, ManagedRuleSet, NamedRule, ResourceKind, RuleAction, WafMode, WafPolicy, WafRule,
};

/// Priority of the trailing block-all rule of a firewall policy.
pub const BLOCK_ALL_PRIORITY: u32 = 10_000;

/// Name of the trailing block-all rule.
pub const BLOCK_ALL_RULE: &str = "blockall";

/// Status code returned by a firewall policy for blocked requests.
pub const BLOCK_STATUS: u16 = 403;

/// Managed rule set enabled on every firewall policy.
pub const BOT_MANAGER_RULE_SET: (&str, &str) = ("Microsoft_BotManagerRuleSet", "1.0");

const STATIC_RULE_PREFIX: &str = "staticallowlist";
const DYNAMIC_RULE_PREFIX: &str = "ipallowlist";
const DEFAULT_RULE_CAPACITY: usize = 100;

/// Render the complete rule list for a full-replace resource.
///
/// # Errors
///
/// Returns an error if a small range cannot be expanded into addresses.
pub fn render_full_rule_set(kind: ResourceKind, desired: &DesiredRuleSet) -> CidrResult<FullRuleSet> {
    match kind {
        ResourceKind::EdgeWafPolicy => Ok(FullRuleSet::Waf(render_waf_policy(kind, desired))),
        _ => render_address_list(kind, desired).map(FullRuleSet::AddressList),
    }
}

/// Render the named start/end rules for a diff-apply resource.
#[must_use]
pub fn render_named_rules(kind: ResourceKind, desired: &DesiredRuleSet) -> Vec<NamedRule> {
    accepted(kind, desired.entries().iter())
        .map(|entry| {
            let (start, end) = bounds(&entry.cidr);
            NamedRule {
                name: entry.name.clone(),
                start,
                end,
            }
        })
        .collect()
}

fn render_waf_policy(kind: ResourceKind, desired: &DesiredRuleSet) -> WafPolicy {
    let capacity = kind.max_entries_per_rule().unwrap_or(DEFAULT_RULE_CAPACITY);
    let static_values: Vec<String> = accepted(kind, desired.static_entries())
        .map(|e| strip_mask(&e.cidr))
        .collect();
    let dynamic_values: Vec<String> = accepted(kind, desired.dynamic_entries())
        .map(|e| strip_mask(&e.cidr))
        .collect();

    let mut rules = Vec::new();
    let mut priority = 1;
    for (prefix, values) in [
        (STATIC_RULE_PREFIX, static_values),
        (DYNAMIC_RULE_PREFIX, dynamic_values),
    ] {
        for (index, match_values) in chunk(&values, capacity).into_iter().enumerate() {
            rules.push(WafRule {
                name: format!("{prefix}{index}"),
                priority,
                action: RuleAction::Allow,
                match_values,
            });
            priority += 1;
        }
    }

    rules.push(WafRule {
        name: BLOCK_ALL_RULE.to_string(),
        priority: BLOCK_ALL_PRIORITY,
        action: RuleAction::Block,
        match_values: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
    });

    WafPolicy {
        mode: WafMode::Prevention,
        block_status: BLOCK_STATUS,
        rules,
        managed_rule_sets: vec![ManagedRuleSet {
            rule_set_type: BOT_MANAGER_RULE_SET.0.to_string(),
            version: BOT_MANAGER_RULE_SET.1.to_string(),
        }],
    }
}

fn render_address_list(kind: ResourceKind, desired: &DesiredRuleSet) -> CidrResult<Vec<String>> {
    let mut entries = Vec::with_capacity(desired.len());
    for entry in accepted(kind, desired.entries().iter()) {
        if kind.rejects_small_prefixes() && is_small_prefix(&entry.cidr) {
            let expanded = expand_range(&entry.cidr.to_string())?;
            entries.extend(expanded.addresses.iter().map(ToString::to_string));
        } else {
            entries.push(strip_mask(&entry.cidr));
        }
    }
    Ok(entries)
}

fn accepted<'a>(
    kind: ResourceKind,
    entries: impl Iterator<Item = &'a DesiredEntry>,
) -> impl Iterator<Item = &'a DesiredEntry> {
    entries.filter(move |entry| {
        let keep = kind.supports_ipv6() || matches!(entry.cidr, IpNet::V4(_));
        if !keep {
            debug!(kind = %kind, cidr = %entry.cidr, "Skipping IPv6 entry");
        }
        keep
    })
}

fn is_small_prefix(cidr: &IpNet) -> bool {
    matches!(cidr, IpNet::V4(net) if net.prefix_len() >= 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr::parse_cidr;
    use crate::identity::IdentityKey;
    use crate::policy::{AccessSnapshot, PolicyEvaluator};
    use crate::resource::{ProtectedResource, ResourceIdentity};

    fn desired(kind: ResourceKind, statics: &[&str], grants: &[&str]) -> DesiredRuleSet {
        let resource = ProtectedResource::new(kind, ResourceIdentity::new("sub", "rg", "name"))
            .with_static_allow_list(statics.iter().map(|s| parse_cidr(s).unwrap()));
        let snapshot = AccessSnapshot::from_parts(
            grants
                .iter()
                .enumerate()
                .map(|(i, g)| (IdentityKey::from_stored(format!("user{i}")), parse_cidr(g).unwrap())),
            Vec::new(),
        );
        PolicyEvaluator::default().evaluate(&resource, &snapshot)
    }

    fn waf(rules: FullRuleSet) -> WafPolicy {
        match rules {
            FullRuleSet::Waf(policy) => policy,
            FullRuleSet::AddressList(_) => panic!("expected a firewall policy"),
        }
    }

    #[test]
    fn test_waf_block_all_last() {
        let desired = desired(ResourceKind::EdgeWafPolicy, &["85.0.0.0/24"], &["10.0.0.1"]);
        let policy = waf(render_full_rule_set(ResourceKind::EdgeWafPolicy, &desired).unwrap());

        assert_eq!(policy.mode, WafMode::Prevention);
        assert_eq!(policy.block_status, 403);
        assert_eq!(policy.managed_rule_sets.len(), 1);
        assert_eq!(policy.managed_rule_sets[0].rule_set_type, "Microsoft_BotManagerRuleSet");
        assert_eq!(policy.managed_rule_sets[0].version, "1.0");

        let names: Vec<&str> = policy.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["staticallowlist0", "ipallowlist0", "blockall"]);
        assert_eq!(policy.rules[0].match_values, vec!["85.0.0.0/24"]);
        assert_eq!(policy.rules[1].match_values, vec!["10.0.0.1"]);

        let last = policy.rules.last().unwrap();
        assert_eq!(last.action, RuleAction::Block);
        assert_eq!(last.priority, BLOCK_ALL_PRIORITY);
        assert!(policy.rules[..policy.rules.len() - 1]
            .iter()
            .all(|r| r.action == RuleAction::Allow && r.priority < BLOCK_ALL_PRIORITY));
    }

    #[test]
    fn test_waf_chunks_dynamic_entries() {
        let grants: Vec<String> = (0..250).map(|i| format!("10.0.{}.{}", i / 200, i % 200)).collect();
        let grants: Vec<&str> = grants.iter().map(String::as_str).collect();
        let desired = desired(ResourceKind::EdgeWafPolicy, &[], &grants);
        let policy = waf(render_full_rule_set(ResourceKind::EdgeWafPolicy, &desired).unwrap());

        let allow: Vec<&WafRule> = policy
            .rules
            .iter()
            .filter(|r| r.action == RuleAction::Allow)
            .collect();
        assert_eq!(allow.len(), 3);
        assert!(allow.iter().all(|r| r.match_values.len() <= 100));
        assert_eq!(allow.iter().map(|r| r.match_values.len()).sum::<usize>(), 250);
        assert_eq!(
            allow.iter().map(|r| r.priority).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_waf_empty_has_only_block_all() {
        let desired = DesiredRuleSet::default();
        let policy = waf(render_full_rule_set(ResourceKind::EdgeWafPolicy, &desired).unwrap());
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].name, BLOCK_ALL_RULE);
    }

    #[test]
    fn test_waf_keeps_ipv6() {
        let desired = desired(ResourceKind::EdgeWafPolicy, &[], &["2001:db8::1"]);
        let policy = waf(render_full_rule_set(ResourceKind::EdgeWafPolicy, &desired).unwrap());
        assert_eq!(policy.rules[0].match_values, vec!["2001:db8::1"]);
    }

    #[test]
    fn test_blob_store_expands_small_prefixes() {
        let desired = desired(
            ResourceKind::BlobStore,
            &["192.168.0.0/24", "172.16.0.0/31"],
            &["10.0.0.1", "2001:db8::1"],
        );
        let rules = render_full_rule_set(ResourceKind::BlobStore, &desired).unwrap();
        assert_eq!(
            rules,
            FullRuleSet::AddressList(vec![
                "192.168.0.0/24".to_string(),
                "172.16.0.0".to_string(),
                "172.16.0.1".to_string(),
                "10.0.0.1".to_string(),
            ])
        );
    }

    #[test]
    fn test_secret_store_strips_host_masks() {
        let desired = desired(ResourceKind::SecretStore, &["85.0.0.0/24"], &["10.0.0.1"]);
        let rules = render_full_rule_set(ResourceKind::SecretStore, &desired).unwrap();
        assert_eq!(
            rules,
            FullRuleSet::AddressList(vec!["85.0.0.0/24".to_string(), "10.0.0.1".to_string()])
        );
    }

    #[test]
    fn test_named_rules() {
        let desired = desired(ResourceKind::RelationalDb, &["10.1.0.0/30"], &["10.0.0.1", "2001:db8::1"]);
        let rules = render_named_rules(ResourceKind::RelationalDb, &desired);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "allow-10-1-0-0-10-1-0-3");
        assert_eq!(rules[0].start.to_string(), "10.1.0.0");
        assert_eq!(rules[0].end.to_string(), "10.1.0.3");
        assert_eq!(rules[1].name, "allow-10-0-0-1-10-0-0-1");
        assert_eq!(rules[1].start, rules[1].end);
    }
}
