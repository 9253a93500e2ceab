//! Error types for CIDR handling.

use thiserror::Error;

/// Result type for CIDR operations.
pub type CidrResult<T> = Result<T, CidrError>;

/// Errors produced while parsing or expanding address ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    /// The input is neither an IP address nor a CIDR block.
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    /// The input is not an IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// The range is too large to enumerate.
    #[error("range {cidr} holds more than {limit} addresses")]
    RangeTooLarge {
        /// Offending range.
        cidr: String,
        /// Enumeration limit.
        limit: usize,
    },
}
