//! # Configuration System
//!
//! TOML configuration for the allow-list engine: grant lifetimes, the
//! access store backend, logging, the global static allow list and the
//! protected resources.
//!
//! Every resource is resolved to its [`ResourceKind`](crate::resource::ResourceKind)
//! when the file is loaded, so unsupported types and malformed ranges are
//! rejected before anything runs. Hot reload is not supported.
//!
//! ## Example Configuration
//!
//! ```toml
//! ip_allowlist = ["85.0.0.0/24"]
//!
//! [engine]
//! grant_ttl = "24h"
//! sweep_interval = "1h"
//!
//! [store]
//! backend = "redis"
//!
//! [store.redis]
//! host = "localhost"
//! port = 6379
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [[resources]]
//! type = "frontdoor"
//! subscription_id = "00000000-0000-0000-0000-000000000000"
//! resource_group = "rg-edge"
//! policy_name = "edgepolicy"
//! groups = ["11111111-1111-1111-1111-111111111111"]
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{config_path, ConfigLoader, CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE};
pub use types::{
    AllowlistConfig, EngineSection, LogFormat, LogLevel, LoggingConfig, RedisSection,
    ResourceEntry, StoreBackend, StoreSection, DEBUG_ENV, REDIS_TOKEN_ENV,
};
pub use validation::{
    BasicValidator, ResourceValidator, ValidationError, ValidationResult, ValidationSeverity,
    Validator,
};
