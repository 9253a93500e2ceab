//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::AllowlistConfig;
use super::validation::{ValidationResult, Validator};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Path used when neither the command line nor the environment names one.
pub const DEFAULT_CONFIG_FILE: &str = "config/config.toml";

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,

    /// Whether to apply environment overrides after parsing.
    env_overrides: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Apply `REDIS_TOKEN` and `DEBUG` from the process environment.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.env_overrides = true;
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<AllowlistConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        info!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load_str(&self, content: &str) -> ConfigResult<AllowlistConfig> {
        let mut config: AllowlistConfig = toml::from_str(content)?;
        if self.env_overrides {
            config.apply_env_overrides(|key| std::env::var(key).ok());
        }
        self.validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration against all registered validators.
    ///
    /// Every validator runs; errors from all of them are reported together.
    fn validate(&self, config: &AllowlistConfig) -> ConfigResult<()> {
        let mut result = ValidationResult::new();
        for validator in &self.validators {
            result.merge(validator.validate(config));
        }

        for warning in result.warnings() {
            warn!(field = %warning.field, "{}", warning.message);
        }
        if !result.is_valid() {
            let errors: Vec<String> = result
                .errors_only()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(ConfigError::ValidationError(errors.join("; ")));
        }
        Ok(())
    }
}

/// Resolve the configuration path from an explicit value, then
/// `CONFIG_FILE`, then the default.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> std::path::PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(Into::into))
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicValidator, ResourceValidator};
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
        ip_allowlist = ["85.0.0.0/24"]

        [[resources]]
        type = "keyvault"
        subscription_id = "sub"
        resource_group = "rg"
        name = "kv"
    "#;

    #[test]
    fn test_load_from_string() {
        let loader = ConfigLoader::new();
        let config = loader.load_str(SAMPLE).unwrap();
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.resources[0].name, "kv");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, SAMPLE).unwrap();

        let loader = ConfigLoader::new()
            .with_validator(BasicValidator::new())
            .with_validator(ResourceValidator::new());
        let config = loader.load(&config_path).unwrap();
        assert_eq!(config.ip_allowlist, vec!["85.0.0.0/24".to_string()]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let loader = ConfigLoader::new();
        let result = loader.load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let loader = ConfigLoader::new();
        let result = loader.load_str("[[resources]\ntype = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_failure_is_fatal() {
        let loader = ConfigLoader::new().with_validator(ResourceValidator::new());
        let result = loader.load_str(
            r#"
            [[resources]]
            type = "mysql"
            subscription_id = "sub"
            resource_group = "rg"
            name = "db"
        "#,
        );
        match result {
            Err(ConfigError::ValidationError(message)) => {
                assert!(message.contains("resources[0]"));
                assert!(message.contains("unsupported resource type 'mysql'"));
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_errors_from_every_validator_reported() {
        let loader = ConfigLoader::new()
            .with_validator(BasicValidator::new())
            .with_validator(ResourceValidator::new());
        let result = loader.load_str(
            r#"
            ip_allowlist = ["not-a-range"]

            [engine]
            grant_ttl = "0s"
        "#,
        );
        match result {
            Err(ConfigError::ValidationError(message)) => {
                assert!(message.contains("engine.grant_ttl"), "{message}");
                assert!(message.contains("ip_allowlist"), "{message}");
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_config_path_explicit() {
        let path = config_path(Some(Path::new("/etc/allowlist.toml")));
        assert_eq!(path, Path::new("/etc/allowlist.toml"));
    }
}
