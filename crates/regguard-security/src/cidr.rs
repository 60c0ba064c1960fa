// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CIDR network blocks for IPv4 and IPv6.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("missing `/` prefix length")]
    MissingPrefix,
    #[error("invalid network address")]
    InvalidAddress,
    #[error("prefix length {0} out of range")]
    InvalidPrefix(String),
}

/// A network block. Host bits are always zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// Build a block, masking host bits. `None` if the prefix is too long.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Option<Self> {
        let network = match addr {
            IpAddr::V4(v4) => {
                if prefix_len > 32 {
                    return None;
                }
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix_len)))
            }
            IpAddr::V6(v6) => {
                if prefix_len > 128 {
                    return None;
                }
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix_len)))
            }
        };
        Some(Self { network, prefix_len })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                u32::from(*ip) & v4_mask(self.prefix_len) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                u128::from(*ip) & v6_mask(self.prefix_len) == u128::from(net)
            }
            _ => false,
        }
    }

    /// Whether `other` lies entirely inside this block.
    pub fn covers(&self, other: &Cidr) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(&other.network)
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix_len))
    }
}

impl FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.trim().split_once('/').ok_or(CidrParseError::MissingPrefix)?;
        let addr: IpAddr = addr.parse().map_err(|_| CidrParseError::InvalidAddress)?;
        let prefix_len: u8 = len
            .parse()
            .map_err(|_| CidrParseError::InvalidPrefix(len.to_string()))?;
        Cidr::new(addr, prefix_len).ok_or_else(|| CidrParseError::InvalidPrefix(len.to_string()))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_masks_host_bits() {
        let cidr: Cidr = "192.168.1.77/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "192.168.0.0/16");
        assert!(cidr.contains(&"192.168.200.1".parse().unwrap()));
        assert!(!cidr.contains(&"192.169.0.1".parse().unwrap()));
    }

    #[test]
    fn ipv6_blocks() {
        let cidr: Cidr = "fe80::/10".parse().unwrap();
        assert!(cidr.contains(&"fe80::1".parse().unwrap()));
        assert!(cidr.contains(&"febf::1".parse().unwrap()));
        assert!(!cidr.contains(&"fec0::1".parse().unwrap()));
        assert!(!cidr.contains(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn zero_prefix_matches_family() {
        let cidr: Cidr = "0.0.0.0/0".parse().unwrap();
        assert!(cidr.contains(&"8.8.8.8".parse().unwrap()));
        assert!(!cidr.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn covers_nested_blocks() {
        let outer: Cidr = "198.51.100.0/24".parse().unwrap();
        let inner: Cidr = "198.51.100.128/25".parse().unwrap();
        assert!(outer.covers(&inner));
        assert!(!inner.covers(&outer));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("10.0.0.0".parse::<Cidr>(), Err(CidrParseError::MissingPrefix));
        assert_eq!("10.0.0/8".parse::<Cidr>(), Err(CidrParseError::InvalidAddress));
        assert!(matches!("10.0.0.0/33".parse::<Cidr>(), Err(CidrParseError::InvalidPrefix(_))));
    }
}
