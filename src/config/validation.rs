//! Configuration validation system.

use super::types::{AllowlistConfig, StoreBackend};

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only errors (not warnings).
    #[must_use]
    pub fn errors_only(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Error)
            .collect()
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &AllowlistConfig) -> ValidationResult;
}

/// Built-in validator for durations and store settings.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &AllowlistConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let engine = &config.engine;

        for (field, value) in [
            ("engine.grant_ttl", engine.grant_ttl),
            ("engine.rate_limit_ttl", engine.rate_limit_ttl),
            ("engine.sweep_interval", engine.sweep_interval),
            ("engine.adapter_timeout", engine.adapter_timeout),
        ] {
            if value.is_zero() {
                result.add_error(ValidationError::error(field, format!("{field} cannot be 0")));
            }
        }

        if engine.conflict_backoff.is_zero() {
            result.add_error(ValidationError::warning(
                "engine.conflict_backoff",
                "Conflicting resources will be retried without delay",
            ));
        }

        if config.store.backend == StoreBackend::Redis {
            let redis = &config.store.redis;
            if redis.host.trim().is_empty() {
                result.add_error(ValidationError::error(
                    "store.redis.host",
                    "Redis host cannot be empty",
                ));
            }
            if redis.port == 0 {
                result.add_error(ValidationError::error(
                    "store.redis.port",
                    "Redis port cannot be 0",
                ));
            }
            if redis.keep_alive.is_zero() {
                result.add_error(ValidationError::error(
                    "store.redis.keep_alive",
                    "Keep-alive interval cannot be 0",
                ));
            }
            if redis.token.is_none() {
                result.add_error(ValidationError::warning(
                    "store.redis.token",
                    "No Redis password configured",
                ));
            }
        }

        if config.resources.is_empty() {
            result.add_error(ValidationError::warning(
                "resources",
                "No resources configured; grants will not be enforced anywhere",
            ));
        }

        result
    }
}

/// Validator that resolves every resource definition and allow list.
#[derive(Debug, Default)]
pub struct ResourceValidator;

impl ResourceValidator {
    /// Create a new resource validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ResourceValidator {
    fn validate(&self, config: &AllowlistConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = config.global_allow_list() {
            result.add_error(ValidationError::error("ip_allowlist", e.to_string()));
        }

        for (index, entry) in config.resources.iter().enumerate() {
            if let Err(e) = entry.resolve() {
                result.add_error(ValidationError::error(
                    format!("resources[{index}]"),
                    e.to_string(),
                ));
            }
        }

        if result.is_valid() {
            if let Err(e) = config.protected_resources() {
                result.add_error(ValidationError::error("resources", e.to_string()));
            }
        }

        result
    }
}
