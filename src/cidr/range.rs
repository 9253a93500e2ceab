//! Address range arithmetic.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use super::error::{CidrError, CidrResult};

/// Largest range [`expand_range`] will enumerate (a /20 in IPv4 terms).
pub const MAX_EXPANDED_ADDRESSES: usize = 4096;

/// Address family of an IP address or CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => write!(f, "ipv4"),
            Self::V6 => write!(f, "ipv6"),
        }
    }
}

/// Bounds and full enumeration of an address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedRange {
    /// Network address (lowest address in the range).
    pub first: IpAddr,
    /// Broadcast address (highest address in the range).
    pub last: IpAddr,
    /// Every address from `first` to `last`, inclusive.
    pub addresses: Vec<IpAddr>,
}

/// Parse a bare address or a CIDR block.
///
/// A bare address becomes a host range (`/32` or `/128`). Host bits of a
/// masked input are cleared, so `10.0.0.7/24` parses as `10.0.0.0/24`.
pub fn parse_cidr(input: &str) -> CidrResult<IpNet> {
    let input = input.trim();

    if input.contains('/') {
        input
            .parse::<IpNet>()
            .map(|net| net.trunc())
            .map_err(|_| CidrError::InvalidCidr(input.to_string()))
    } else {
        input
            .parse::<IpAddr>()
            .map(host_cidr)
            .map_err(|_| CidrError::InvalidAddress(input.to_string()))
    }
}

/// Build the single-host range for an address.
#[must_use]
pub fn host_cidr(ip: IpAddr) -> IpNet {
    match ip {
        IpAddr::V4(v4) => IpNet::V4(Ipv4Net::from(v4)),
        IpAddr::V6(v6) => IpNet::V6(Ipv6Net::from(v6)),
    }
}

/// Detect the address family of a bare address or CIDR block.
pub fn address_family(input: &str) -> CidrResult<AddressFamily> {
    match parse_cidr(input)? {
        IpNet::V4(_) => Ok(AddressFamily::V4),
        IpNet::V6(_) => Ok(AddressFamily::V6),
    }
}

/// Network and broadcast addresses of a range.
#[must_use]
pub fn bounds(net: &IpNet) -> (IpAddr, IpAddr) {
    match net {
        IpNet::V4(n) => {
            let addr = u32::from(n.addr());
            let mask = u32::from(n.netmask());
            (
                IpAddr::V4(Ipv4Addr::from(addr & mask)),
                IpAddr::V4(Ipv4Addr::from(addr | !mask)),
            )
        },
        IpNet::V6(n) => {
            let addr = u128::from(n.addr());
            let mask = u128::from(n.netmask());
            (
                IpAddr::V6(Ipv6Addr::from(addr & mask)),
                IpAddr::V6(Ipv6Addr::from(addr | !mask)),
            )
        },
    }
}

/// Expand a bare address or CIDR block into its bounds and members.
///
/// Enumeration is capped at [`MAX_EXPANDED_ADDRESSES`]; larger ranges fail
/// with [`CidrError::RangeTooLarge`].
pub fn expand_range(input: &str) -> CidrResult<ExpandedRange> {
    let net = parse_cidr(input)?;
    let (first, last) = bounds(&net);

    let start = to_int(first);
    let end = to_int(last);
    let count = end - start;
    if count >= MAX_EXPANDED_ADDRESSES as u128 {
        return Err(CidrError::RangeTooLarge {
            cidr: net.to_string(),
            limit: MAX_EXPANDED_ADDRESSES,
        });
    }

    let family = family_of(&net);
    let addresses = (start..=end).map(|value| from_int(family, value)).collect();

    Ok(ExpandedRange {
        first,
        last,
        addresses,
    })
}

/// Check whether `outer` fully contains `inner`.
///
/// Ranges of different families never contain each other.
#[must_use]
pub fn covers(outer: &IpNet, inner: &IpNet) -> bool {
    if family_of(outer) != family_of(inner) {
        return false;
    }

    let (outer_first, outer_last) = bounds(outer);
    let (inner_first, inner_last) = bounds(inner);

    to_int(outer_first) <= to_int(inner_first) && to_int(inner_last) <= to_int(outer_last)
}

/// Render a range without its mask when it denotes a single host.
///
/// `10.0.0.1/32` becomes `10.0.0.1`; wider ranges are returned unchanged.
/// Callers that need the mask back must re-append it.
#[must_use]
pub fn strip_mask(net: &IpNet) -> String {
    if net.prefix_len() == net.max_prefix_len() {
        net.addr().to_string()
    } else {
        net.to_string()
    }
}

fn family_of(net: &IpNet) -> AddressFamily {
    match net {
        IpNet::V4(_) => AddressFamily::V4,
        IpNet::V6(_) => AddressFamily::V6,
    }
}

fn to_int(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_int(family: AddressFamily, value: u128) -> IpAddr {
    match family {
        // Values come from a v4 range, so they fit in 32 bits.
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> IpNet {
        parse_cidr(s).unwrap()
    }

    #[test]
    fn test_expand_slash_31() {
        let range = expand_range("10.0.0.0/31").unwrap();
        assert_eq!(range.first, ip("10.0.0.0"));
        assert_eq!(range.last, ip("10.0.0.1"));
        assert_eq!(range.addresses, vec![ip("10.0.0.0"), ip("10.0.0.1")]);
    }

    #[test]
    fn test_expand_bare_address() {
        let range = expand_range("10.0.0.1").unwrap();
        assert_eq!(range.first, ip("10.0.0.1"));
        assert_eq!(range.last, ip("10.0.0.1"));
        assert_eq!(range.addresses, vec![ip("10.0.0.1")]);
    }

    #[test]
    fn test_expand_host_bits_set() {
        let range = expand_range("192.168.1.77/30").unwrap();
        assert_eq!(range.first, ip("192.168.1.76"));
        assert_eq!(range.last, ip("192.168.1.79"));
        assert_eq!(range.addresses.len(), 4);
    }

    #[test]
    fn test_expand_slash_24() {
        let range = expand_range("85.0.0.0/24").unwrap();
        assert_eq!(range.first, ip("85.0.0.0"));
        assert_eq!(range.last, ip("85.0.0.255"));
        assert_eq!(range.addresses.len(), 256);
    }

    #[test]
    fn test_expand_ipv6() {
        let range = expand_range("2001:db8::/126").unwrap();
        assert_eq!(range.first, ip("2001:db8::"));
        assert_eq!(range.last, ip("2001:db8::3"));
        assert_eq!(range.addresses.len(), 4);
    }

    #[test]
    fn test_expand_too_large() {
        assert!(matches!(
            expand_range("10.0.0.0/8"),
            Err(CidrError::RangeTooLarge { .. })
        ));
        assert!(expand_range("10.0.0.0/20").is_ok());
        assert!(expand_range("10.0.0.0/19").is_err());
    }

    #[test]
    fn test_expand_invalid() {
        assert!(matches!(
            expand_range("10.0.0"),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            expand_range("10.0.0.0/33"),
            Err(CidrError::InvalidCidr(_))
        ));
    }

    #[test]
    fn test_address_family() {
        assert_eq!(address_family("10.0.0.1").unwrap(), AddressFamily::V4);
        assert_eq!(address_family("10.0.0.0/8").unwrap(), AddressFamily::V4);
        assert_eq!(address_family("::1").unwrap(), AddressFamily::V6);
        assert_eq!(address_family("2001:db8::/32").unwrap(), AddressFamily::V6);
        assert!(address_family("not-an-ip").is_err());
        assert!(address_family("").is_err());
    }

    #[test]
    fn test_parse_cidr_normalizes() {
        assert_eq!(net("10.0.0.7/24").to_string(), "10.0.0.0/24");
        assert_eq!(net(" 10.0.0.7 ").to_string(), "10.0.0.7/32");
        assert_eq!(net("::1").to_string(), "::1/128");
    }

    #[test]
    fn test_covers() {
        assert!(covers(&net("85.0.0.0/24"), &net("85.0.0.17")));
        assert!(covers(&net("85.0.0.0/24"), &net("85.0.0.0/24")));
        assert!(covers(&net("0.0.0.0/0"), &net("200.1.2.3/32")));
        assert!(!covers(&net("85.0.0.0/24"), &net("85.0.1.1")));
        assert!(!covers(&net("85.0.0.0/25"), &net("85.0.0.0/24")));
        assert!(!covers(&net("0.0.0.0/0"), &net("::1")));
    }

    #[test]
    fn test_strip_mask() {
        assert_eq!(strip_mask(&net("10.0.0.1/32")), "10.0.0.1");
        assert_eq!(strip_mask(&net("2001:db8::1")), "2001:db8::1");
        assert_eq!(strip_mask(&net("10.0.0.0/24")), "10.0.0.0/24");

        // Re-appending restores the host range.
        let stripped = strip_mask(&net("10.0.0.1/32"));
        assert_eq!(net(&format!("{stripped}/32")), net("10.0.0.1"));
    }

    #[test]
    fn test_host_cidr() {
        assert_eq!(host_cidr(ip("80.18.81.18")).to_string(), "80.18.81.18/32");
        assert_eq!(host_cidr(ip("::1")).to_string(), "::1/128");
    }
}
