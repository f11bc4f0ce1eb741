//! Block targets and address matching.
//!
//! A block targets exactly one of: a registered account (matched by name),
//! a single IP address, or a CIDR range. Targets are a closed sum type with
//! exhaustive matching; there is no string sniffing at lookup time.

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Address family of an IP-based target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Family of a concrete address.
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Total bits in an address of this family.
    pub fn width(self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Stable short name, used as the database discriminator column.
    pub fn as_str(self) -> &'static str {
        match self {
            AddressFamily::V4 => "v4",
            AddressFamily::V6 => "v6",
        }
    }
}

/// Errors from parsing a stored block target.
#[derive(Debug, Error)]
pub enum TargetParseError {
    #[error("empty block target")]
    Empty,
    #[error("invalid CIDR range: {0}")]
    InvalidRange(String),
}

/// What a block applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTarget {
    /// A registered account, matched by exact name. Id 0 means the account
    /// is not local (e.g. a foreign-wiki identity).
    Account { id: u64, name: String },
    /// A single IP address, matched by equality after normalization.
    SingleIp(IpAddr),
    /// A CIDR range. Prefix bounds (0..=32 for IPv4, 0..=128 for IPv6) are
    /// enforced by `IpNet` construction.
    Range(IpNet),
}

/// Ordering key for target specificity. Lower sorts first = more specific.
///
/// Account blocks are the most specific (they name one identity), then
/// exact IPs, then ranges ordered by host bits: a /30 leaves 2 bits free
/// and outranks a /20 with 12. Comparing host bits rather than prefix
/// length keeps the ordering meaningful across address families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    class: u8,
    host_bits: u8,
}

impl BlockTarget {
    /// Parse a stored target string. `user_id` is attached to account
    /// targets (0 when unknown).
    ///
    /// A `/` marks the token as a CIDR range: if it does not parse as one,
    /// that is an error rather than an odd account name. Full-width ranges
    /// normalize to `SingleIp`, and range bases are truncated to their
    /// network address.
    pub fn parse(raw: &str, user_id: u64) -> Result<Self, TargetParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TargetParseError::Empty);
        }

        if raw.contains('/') {
            let net = IpNet::from_str(raw)
                .map_err(|_| TargetParseError::InvalidRange(raw.to_string()))?;
            if net.prefix_len() == net.max_prefix_len() {
                return Ok(BlockTarget::SingleIp(net.addr()));
            }
            return Ok(BlockTarget::Range(net.trunc()));
        }

        if let Ok(addr) = raw.parse::<IpAddr>() {
            return Ok(BlockTarget::SingleIp(addr));
        }

        Ok(BlockTarget::Account {
            id: user_id,
            name: raw.to_string(),
        })
    }

    /// Address family, or `None` for account targets.
    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            BlockTarget::Account { .. } => None,
            BlockTarget::SingleIp(addr) => Some(AddressFamily::of(*addr)),
            BlockTarget::Range(net) => Some(match net {
                IpNet::V4(_) => AddressFamily::V4,
                IpNet::V6(_) => AddressFamily::V6,
            }),
        }
    }

    /// Whether this target covers the given address.
    ///
    /// Account targets never match an address. Family mismatch is a
    /// non-match, never an error.
    pub fn matches_address(&self, addr: IpAddr) -> bool {
        match self {
            BlockTarget::Account { .. } => false,
            BlockTarget::SingleIp(ip) => *ip == addr,
            BlockTarget::Range(net) => match (net, addr) {
                (IpNet::V4(n), IpAddr::V4(a)) => n.contains(&a),
                (IpNet::V6(n), IpAddr::V6(a)) => n.contains(&a),
                _ => false,
            },
        }
    }

    /// Whether this target names the given account.
    pub fn matches_name(&self, username: &str) -> bool {
        match self {
            BlockTarget::Account { name, .. } => name == username,
            _ => false,
        }
    }

    /// Specificity ordering key; see [`Specificity`].
    pub fn specificity(&self) -> Specificity {
        match self {
            BlockTarget::Account { .. } => Specificity {
                class: 0,
                host_bits: 0,
            },
            BlockTarget::SingleIp(_) => Specificity {
                class: 1,
                host_bits: 0,
            },
            BlockTarget::Range(net) => Specificity {
                class: 2,
                host_bits: net.max_prefix_len() - net.prefix_len(),
            },
        }
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTarget::Account { name, .. } => write!(f, "{}", name),
            BlockTarget::SingleIp(addr) => write!(f, "{}", addr),
            BlockTarget::Range(net) => write!(f, "{}", net),
        }
    }
}

impl FromStr for BlockTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockTarget::parse(s, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_account_ip_and_range() {
        assert!(matches!(
            "SomeUser".parse::<BlockTarget>(),
            Ok(BlockTarget::Account { .. })
        ));
        assert!(matches!(
            "192.168.1.1".parse::<BlockTarget>(),
            Ok(BlockTarget::SingleIp(_))
        ));
        assert!(matches!(
            "70.2.0.0/16".parse::<BlockTarget>(),
            Ok(BlockTarget::Range(_))
        ));
        assert!(matches!(
            "2001:4860:4001::/48".parse::<BlockTarget>(),
            Ok(BlockTarget::Range(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_and_bad_ranges() {
        assert!(matches!(
            "".parse::<BlockTarget>(),
            Err(TargetParseError::Empty)
        ));
        assert!(matches!(
            "  ".parse::<BlockTarget>(),
            Err(TargetParseError::Empty)
        ));
        assert!(matches!(
            "1.2.3.0/99".parse::<BlockTarget>(),
            Err(TargetParseError::InvalidRange(_))
        ));
        assert!(matches!(
            "not/a/range".parse::<BlockTarget>(),
            Err(TargetParseError::InvalidRange(_))
        ));
    }

    #[test]
    fn full_width_range_normalizes_to_single_ip() {
        let target = "10.0.0.1/32".parse::<BlockTarget>().unwrap();
        assert_eq!(target, BlockTarget::SingleIp("10.0.0.1".parse().unwrap()));

        let target = "::1/128".parse::<BlockTarget>().unwrap();
        assert_eq!(target, BlockTarget::SingleIp("::1".parse().unwrap()));
    }

    #[test]
    fn range_base_is_truncated() {
        let target = "70.2.1.1/16".parse::<BlockTarget>().unwrap();
        assert_eq!(target.to_string(), "70.2.0.0/16");
    }

    #[test]
    fn range_matching_respects_family() {
        let range = "70.2.0.0/16".parse::<BlockTarget>().unwrap();
        assert!(range.matches_address("70.2.1.1".parse().unwrap()));
        assert!(!range.matches_address("70.3.0.1".parse().unwrap()));
        // IPv6 address against an IPv4 range: non-match, not an error.
        assert!(!range.matches_address("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn account_never_matches_an_address() {
        let account = "SomeUser".parse::<BlockTarget>().unwrap();
        assert!(!account.matches_address("127.0.0.1".parse().unwrap()));
        assert!(account.matches_name("SomeUser"));
        assert!(!account.matches_name("someuser"));
    }

    #[test]
    fn specificity_orders_narrower_first() {
        let exact = "0.0.0.0".parse::<BlockTarget>().unwrap();
        let narrow = "0.0.0.0/30".parse::<BlockTarget>().unwrap();
        let mid = "0.0.0.0/25".parse::<BlockTarget>().unwrap();
        let wide = "0.0.0.0/20".parse::<BlockTarget>().unwrap();
        let account = "SomeUser".parse::<BlockTarget>().unwrap();

        assert!(account.specificity() < exact.specificity());
        assert!(exact.specificity() < narrow.specificity());
        assert!(narrow.specificity() < mid.specificity());
        assert!(mid.specificity() < wide.specificity());
    }

    #[test]
    fn specificity_across_families_compares_host_bits() {
        // /48 IPv6 leaves 80 host bits; /16 IPv4 leaves 16. The v4 range
        // pins down more of its address space and ranks as more specific.
        let v6 = "2001:4860:4001::/48".parse::<BlockTarget>().unwrap();
        let v4 = "50.2.0.0/16".parse::<BlockTarget>().unwrap();
        assert!(v4.specificity() < v6.specificity());

        // An exact IP of either family outranks any range.
        let v6_exact = "2001:db8::1".parse::<BlockTarget>().unwrap();
        assert!(v6_exact.specificity() < v4.specificity());
    }
}
