//! # CIDR Utilities
//!
//! Pure helpers over IPv4/IPv6 address ranges used by the policy evaluator
//! and the reconciler.
//!
//! - [`expand_range`]: network/broadcast bounds plus a bounded enumeration
//! - [`address_family`]: family detection for bare or masked input
//! - [`covers`]: containment by integer range comparison
//! - [`chunk`]: order-preserving split into groups of at most `n` entries
//! - [`strip_mask`]: lossy removal of a host mask (`/32`, `/128`)

mod chunk;
mod error;
mod range;

pub use chunk::chunk;
pub use error::{CidrError, CidrResult};
pub use range::{
    address_family, bounds, covers, expand_range, host_cidr, parse_cidr, strip_mask,
    AddressFamily, ExpandedRange, MAX_EXPANDED_ADDRESSES,
};
