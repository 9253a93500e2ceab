//! Errors for malformed resource definitions.

use thiserror::Error;

use crate::cidr::CidrError;
use crate::resource::{ResourceKind, Strategy};

/// Result type for policy construction.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// A resource definition that cannot be enforced.
///
/// Raised while loading configuration and wiring the engine, never during
/// reconciliation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The configured resource type is not known.
    #[error("unsupported resource type '{0}'")]
    UnsupportedResourceType(String),

    /// An allow-list entry does not parse.
    #[error("resource '{resource}': invalid allow-list entry: {source}")]
    InvalidAllowListEntry {
        /// Resource name, or `global` for the global list.
        resource: String,
        /// Parse failure.
        #[source]
        source: CidrError,
    },

    /// A required coordinate is empty.
    #[error("resource '{resource}': missing {field}")]
    MissingField {
        /// Resource name.
        resource: String,
        /// Missing field.
        field: &'static str,
    },

    /// Two resources share the same type and coordinates.
    #[error("duplicate resource '{0}'")]
    DuplicateResource(String),

    /// No adapter is registered for the resource type.
    #[error("no adapter registered for resource type '{0}'")]
    MissingAdapter(ResourceKind),

    /// The registered adapter speaks the wrong strategy for the type.
    #[error("adapter for '{kind}' is {actual}, but the resource type requires {expected}")]
    StrategyMismatch {
        /// Resource type.
        kind: ResourceKind,
        /// Strategy the type needs.
        expected: Strategy,
        /// Strategy the adapter offers.
        actual: Strategy,
    },
}
