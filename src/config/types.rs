//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use ipnet::IpNet;

use crate::cidr::parse_cidr;
use crate::policy::{PolicyError, PolicyResult};
use crate::reconcile::ReconcilerConfig;
use crate::resource::{ProtectedResource, ResourceIdentity, ResourceKind};
use crate::store::{NamespaceTtls, RedisStoreConfig};

/// Environment variable holding the Redis password.
pub const REDIS_TOKEN_ENV: &str = "REDIS_TOKEN";

/// Environment variable that forces debug logging when set to `true`.
pub const DEBUG_ENV: &str = "DEBUG";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AllowlistConfig {
    /// Grant lifetimes and reconciliation timing.
    pub engine: EngineSection,

    /// Access store backend.
    pub store: StoreSection,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Ranges allowed on every resource.
    pub ip_allowlist: Vec<String>,

    /// Protected resources.
    pub resources: Vec<ResourceEntry>,
}

impl AllowlistConfig {
    /// Apply secrets and switches from the environment.
    ///
    /// `lookup` returns the value of an environment variable, if set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(REDIS_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.store.redis.token = Some(token);
        }
        if lookup(DEBUG_ENV).is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            self.logging.level = LogLevel::Debug;
        }
    }

    /// Parse the global static allow list.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidAllowListEntry`] for the first entry
    /// that does not parse.
    pub fn global_allow_list(&self) -> PolicyResult<Vec<IpNet>> {
        parse_allow_list("global", &self.ip_allowlist)
    }

    /// Resolve every resource entry into a [`ProtectedResource`].
    ///
    /// # Errors
    ///
    /// Returns the first unsupported type, unparsable range, missing
    /// coordinate or duplicate resource.
    pub fn protected_resources(&self) -> PolicyResult<Vec<ProtectedResource>> {
        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(self.resources.len());
        for entry in &self.resources {
            let resource = entry.resolve()?;
            if !seen.insert((resource.kind, resource.identity.clone())) {
                return Err(PolicyError::DuplicateResource(resource.to_string()));
            }
            resources.push(resource);
        }
        Ok(resources)
    }

    /// Store TTLs per namespace.
    #[must_use]
    pub fn namespace_ttls(&self) -> NamespaceTtls {
        NamespaceTtls::new(
            self.engine.grant_ttl,
            self.engine.group_cache_margin,
            self.engine.rate_limit_ttl,
        )
    }

    /// Reconciler timing.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            adapter_timeout: self.engine.adapter_timeout,
            conflict_backoff: self.engine.conflict_backoff,
            max_conflict_retries: self.engine.max_conflict_retries,
        }
    }
}

/// Engine section configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Lifetime of a grant.
    #[serde(with = "humantime_serde")]
    pub grant_ttl: Duration,

    /// How much longer cached groups live than the grant they back.
    #[serde(with = "humantime_serde")]
    pub group_cache_margin: Duration,

    /// Lifetime of a throttle marker.
    #[serde(with = "humantime_serde")]
    pub rate_limit_ttl: Duration,

    /// Interval between sweeps.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Bound on every adapter call.
    #[serde(with = "humantime_serde")]
    pub adapter_timeout: Duration,

    /// Delay before retrying a resource that reported a conflict.
    #[serde(with = "humantime_serde")]
    pub conflict_backoff: Duration,

    /// Consecutive conflicts tolerated per resource.
    pub max_conflict_retries: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            grant_ttl: Duration::from_secs(24 * 3600),
            group_cache_margin: Duration::from_secs(3600),
            rate_limit_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(3600),
            adapter_timeout: Duration::from_secs(30),
            conflict_backoff: Duration::from_secs(60),
            max_conflict_retries: 5,
        }
    }
}

/// Store section configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    /// Backend kind.
    pub backend: StoreBackend,

    /// Redis connection settings (when backend is "redis").
    pub redis: RedisSection,
}

/// Store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; state is lost on restart.
    #[default]
    Memory,
    /// Redis server.
    Redis,
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    /// Server host.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Password; usually supplied through `REDIS_TOKEN`.
    pub token: Option<String>,

    /// Connection establishment timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Single command timeout.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Interval between keep-alive pings.
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            token: None,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
            keep_alive: Duration::from_secs(300),
        }
    }
}

impl From<&RedisSection> for RedisStoreConfig {
    fn from(section: &RedisSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
            token: section.token.clone(),
            connect_timeout: section.connect_timeout,
            command_timeout: section.command_timeout,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Pretty format with colors (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

/// Protected resource entry in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Cloud provider; only "azure" is supported.
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Resource type (e.g., "frontdoor", "keyvault").
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Resource name.
    #[serde(default)]
    pub name: String,

    /// Subscription the resource lives in.
    #[serde(default)]
    pub subscription_id: String,

    /// Resource group.
    #[serde(default)]
    pub resource_group: String,

    /// Firewall policy name (frontdoor only; falls back to `name`).
    #[serde(default)]
    pub policy_name: Option<String>,

    /// Ranges always allowed on this resource.
    #[serde(default)]
    pub ip_allowlist: Vec<String>,

    /// Groups whose members' grants apply; empty means every grant.
    #[serde(default)]
    pub groups: Vec<String>,
}

fn default_cloud() -> String {
    "azure".to_string()
}

impl ResourceEntry {
    /// Create a new resource entry.
    pub fn new(resource_type: &str, subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            cloud: default_cloud(),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            policy_name: None,
            ip_allowlist: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Add always-allowed ranges.
    #[must_use]
    pub fn with_allow_list(mut self, entries: &[&str]) -> Self {
        self.ip_allowlist.extend(entries.iter().map(|e| e.to_string()));
        self
    }

    /// Restrict to group members.
    #[must_use]
    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups.extend(groups.iter().map(|g| g.to_string()));
        self
    }

    /// Name the resource is addressed by at the provider.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        match &self.policy_name {
            Some(policy) if !policy.is_empty() => policy,
            _ => &self.name,
        }
    }

    /// Resolve into a [`ProtectedResource`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported cloud or type, an empty
    /// coordinate, or an unparsable allow-list entry.
    pub fn resolve(&self) -> PolicyResult<ProtectedResource> {
        if !self.cloud.eq_ignore_ascii_case("azure") {
            return Err(PolicyError::UnsupportedResourceType(format!(
                "{}/{}",
                self.cloud, self.resource_type
            )));
        }
        let kind: ResourceKind = self.resource_type.parse()?;

        let name = self.effective_name();
        let label = if name.is_empty() { kind.as_str() } else { name };
        for (field, value) in [
            ("name", name),
            ("subscription_id", self.subscription_id.as_str()),
            ("resource_group", self.resource_group.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(PolicyError::MissingField {
                    resource: label.to_string(),
                    field,
                });
            }
        }

        let static_allow_list = parse_allow_list(name, &self.ip_allowlist)?;
        Ok(ProtectedResource::new(
            kind,
            ResourceIdentity::new(&self.subscription_id, &self.resource_group, name),
        )
        .with_static_allow_list(static_allow_list)
        .with_required_groups(self.groups.iter().map(|g| g.trim()).filter(|g| !g.is_empty())))
    }
}

fn parse_allow_list(resource: &str, entries: &[String]) -> PolicyResult<Vec<IpNet>> {
    entries
        .iter()
        .map(|entry| {
            parse_cidr(entry).map_err(|source| PolicyError::InvalidAllowListEntry {
                resource: resource.to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AllowlistConfig::default();
        assert_eq!(config.engine.grant_ttl, Duration::from_secs(86_400));
        assert_eq!(config.engine.max_conflict_retries, 5);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            ip_allowlist = ["85.0.0.0/24"]

            [engine]
            grant_ttl = "12h"
            sweep_interval = "30m"
            conflict_backoff = "90s"

            [store]
            backend = "redis"

            [store.redis]
            host = "cache.internal"
            port = 6380
            keep_alive = "1m"

            [logging]
            level = "debug"
            format = "json"

            [[resources]]
            type = "frontdoor"
            subscription_id = "sub-1"
            resource_group = "rg-edge"
            policy_name = "edgepolicy"
            groups = ["ops"]

            [[resources]]
            type = "postgres"
            subscription_id = "sub-1"
            resource_group = "rg-data"
            name = "pg-main"
            ip_allowlist = ["10.1.0.0/30"]
        "#;

        let config: AllowlistConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.grant_ttl, Duration::from_secs(12 * 3600));
        assert_eq!(config.engine.sweep_interval, Duration::from_secs(1800));
        assert_eq!(config.engine.adapter_timeout, Duration::from_secs(30));
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis.port, 6380);
        assert_eq!(config.store.redis.keep_alive, Duration::from_secs(60));
        assert_eq!(config.logging.format, LogFormat::Json);

        let resources = config.protected_resources().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].kind, ResourceKind::EdgeWafPolicy);
        assert_eq!(resources[0].identity.name, "edgepolicy");
        assert!(resources[0].required_groups.contains("ops"));
        assert_eq!(resources[1].kind, ResourceKind::RelationalDb);
        assert_eq!(resources[1].static_allow_list.len(), 1);

        let ttls = config.namespace_ttls();
        assert_eq!(ttls.group_cache, Duration::from_secs(13 * 3600));
        assert_eq!(config.reconciler_config().conflict_backoff, Duration::from_secs(90));
        assert_eq!(config.global_allow_list().unwrap().len(), 1);
    }

    #[test]
    fn test_unsupported_type() {
        let entry = ResourceEntry::new("mysql", "sub", "rg", "db");
        assert!(matches!(
            entry.resolve(),
            Err(PolicyError::UnsupportedResourceType(_))
        ));

        let mut entry = ResourceEntry::new("keyvault", "sub", "rg", "kv");
        entry.cloud = "aws".to_string();
        assert!(matches!(
            entry.resolve(),
            Err(PolicyError::UnsupportedResourceType(_))
        ));
    }

    #[test]
    fn test_missing_coordinates() {
        let entry = ResourceEntry::new("keyvault", "sub", "", "kv");
        assert!(matches!(
            entry.resolve(),
            Err(PolicyError::MissingField {
                field: "resource_group",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_allow_list_entry() {
        let entry = ResourceEntry::new("keyvault", "sub", "rg", "kv").with_allow_list(&["10.0.0.0/33"]);
        assert!(matches!(
            entry.resolve(),
            Err(PolicyError::InvalidAllowListEntry { .. })
        ));
    }

    #[test]
    fn test_duplicate_resource() {
        let config = AllowlistConfig {
            resources: vec![
                ResourceEntry::new("keyvault", "sub", "rg", "kv"),
                ResourceEntry::new("KeyVault", "sub", "rg", "kv"),
            ],
            ..AllowlistConfig::default()
        };
        assert!(matches!(
            config.protected_resources(),
            Err(PolicyError::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("REDIS_TOKEN", "s3cret"), ("DEBUG", "TRUE")].into();
        let mut config = AllowlistConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.redis.token.as_deref(), Some("s3cret"));
        assert_eq!(config.logging.level, LogLevel::Debug);

        let mut config = AllowlistConfig::default();
        config.apply_env_overrides(|_| None);
        assert!(config.store.redis.token.is_none());
        assert_eq!(config.logging.level, LogLevel::Info);
    }
}
