// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address range policy and a pinned DNS resolver for outbound connections.
//!
//! [`AddressPolicy`] decides whether an address may ever be contacted.
//! [`PinnedResolver`] implements `reqwest::dns::Resolve` so the HTTP client can
//! only connect to addresses the boundary guard already authorized; it never
//! performs a live lookup, which closes the DNS rebinding window.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use regguard_core::RegguardError;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{error, info};

use crate::cidr::Cidr;

/// Decides which addresses are reachable.
///
/// Built-in private, loopback and link-local ranges are always blocked unless
/// an address is in the explicit allowlist. Extra ranges can be denied on top.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    allowed_private_ips: Vec<IpAddr>,
    denied_ranges: Vec<Cidr>,
}

impl AddressPolicy {
    /// Create a policy from config strings. Unparsable entries are ignored
    /// (config validation reports them).
    pub fn new(allowed: &[String], denied: &[String]) -> Self {
        let allowed_private_ips = allowed
            .iter()
            .filter_map(|s| s.parse::<IpAddr>().ok())
            .collect();
        let denied_ranges = denied.iter().filter_map(|s| s.parse::<Cidr>().ok()).collect();
        Self {
            allowed_private_ips,
            denied_ranges,
        }
    }

    /// Check if an IP is in a private or reserved range.
    ///
    /// Blocks: RFC 1918, loopback, link-local, broadcast, unspecified,
    /// cloud metadata, IPv6 loopback, unique-local, link-local, and
    /// IPv4-mapped forms of all of the above.
    pub fn is_private(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || *v4 == Ipv4Addr::new(169, 254, 169, 254) // cloud metadata
            }
            IpAddr::V6(v6) => {
                if let Some(mapped) = v6.to_ipv4_mapped() {
                    return Self::is_private(&IpAddr::V4(mapped));
                }
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 unique local
                    || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 link-local
            }
        }
    }

    /// Whether this policy blocks the address.
    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        if self.allowed_private_ips.contains(ip) {
            return false;
        }
        Self::is_private(ip) || self.denied_ranges.iter().any(|r| r.contains(ip))
    }

    /// Reject the whole set if any single address is blocked.
    ///
    /// A mixed answer (public and private) is never trimmed down to its public
    /// part: one disallowed address poisons the result.
    pub fn check_all(&self, addresses: &[IpAddr]) -> Result<(), RegguardError> {
        for ip in addresses {
            if self.allowed_private_ips.contains(ip) && Self::is_private(ip) {
                info!(ip = %ip, "allowing configured private IP");
                continue;
            }
            if self.is_blocked(ip) {
                error!(ip = %ip, "SSRF blocked: address in disallowed range");
                return Err(RegguardError::PrivateAddressBlocked { address: *ip });
            }
        }
        Ok(())
    }
}

/// Convenience function to check if an IP is private/reserved.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    AddressPolicy::is_private(ip)
}

/// A `reqwest` resolver that only answers for one pinned host.
///
/// Any other name (redirect targets, smuggled hosts) fails resolution, so the
/// client cannot be steered anywhere the guard did not authorize.
pub struct PinnedResolver {
    host: String,
    addresses: Vec<IpAddr>,
}

impl PinnedResolver {
    pub fn new(host: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            addresses,
        }
    }

    fn lookup(&self, name: &str) -> Result<Vec<SocketAddr>, String> {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        if name != self.host {
            return Err(format!("SSRF blocked: {name} is not the pinned host"));
        }
        if self.addresses.is_empty() {
            return Err(format!("SSRF blocked: no pinned addresses for {name}"));
        }
        Ok(self
            .addresses
            .iter()
            .map(|ip| SocketAddr::new(*ip, 0))
            .collect())
    }
}

impl Resolve for PinnedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let result = self.lookup(name.as_str());
        Box::pin(async move {
            match result {
                Ok(addrs) => {
                    let addrs: Addrs = Box::new(addrs.into_iter());
                    Ok(addrs)
                }
                Err(message) => {
                    error!(%message, "pinned resolver refused lookup");
                    let err: Box<dyn std::error::Error + Send + Sync> = message.into();
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    // --- IPv4 private range tests ---

    #[test]
    fn blocks_rfc1918_ranges() {
        assert!(AddressPolicy::is_private(&v4(10, 0, 0, 1)));
        assert!(AddressPolicy::is_private(&v4(172, 16, 0, 1)));
        assert!(AddressPolicy::is_private(&v4(172, 31, 255, 255)));
        assert!(AddressPolicy::is_private(&v4(192, 168, 1, 1)));
        assert!(!AddressPolicy::is_private(&v4(172, 32, 0, 1)));
    }

    #[test]
    fn blocks_loopback_and_link_local_v4() {
        assert!(AddressPolicy::is_private(&v4(127, 0, 0, 1)));
        assert!(AddressPolicy::is_private(&v4(127, 255, 255, 255)));
        assert!(AddressPolicy::is_private(&v4(169, 254, 1, 1)));
        assert!(AddressPolicy::is_private(&v4(169, 254, 169, 254)));
    }

    #[test]
    fn blocks_unspecified_and_broadcast() {
        assert!(AddressPolicy::is_private(&v4(0, 0, 0, 0)));
        assert!(AddressPolicy::is_private(&v4(255, 255, 255, 255)));
    }

    // --- IPv6 private range tests ---

    #[test]
    fn blocks_ipv6_special_ranges() {
        assert!(AddressPolicy::is_private(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(AddressPolicy::is_private(&IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        assert!(AddressPolicy::is_private(&IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(AddressPolicy::is_private(&IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn blocks_ipv4_mapped_loopback() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(AddressPolicy::is_private(&mapped));
        let mapped_public: IpAddr = "::ffff:8.8.8.8".parse().unwrap();
        assert!(!AddressPolicy::is_private(&mapped_public));
    }

    // --- Public IP tests ---

    #[test]
    fn allows_public_addresses() {
        assert!(!AddressPolicy::is_private(&v4(8, 8, 8, 8)));
        assert!(!AddressPolicy::is_private(&v4(1, 1, 1, 1)));
        let google_v6 = IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888));
        assert!(!AddressPolicy::is_private(&google_v6));
    }

    // --- Policy tests ---

    #[test]
    fn mixed_result_is_rejected_wholesale() {
        let policy = AddressPolicy::default();
        let err = policy
            .check_all(&[v4(8, 8, 8, 8), v4(10, 0, 0, 5), v4(1, 1, 1, 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            RegguardError::PrivateAddressBlocked { address } if address == v4(10, 0, 0, 5)
        ));
    }

    #[test]
    fn allowlist_overrides_private_range() {
        let policy = AddressPolicy::new(
            &["10.0.0.1".to_string(), "invalid".to_string()],
            &[],
        );
        assert_eq!(policy.allowed_private_ips.len(), 1);
        assert!(policy.check_all(&[v4(10, 0, 0, 1)]).is_ok());
        assert!(policy.check_all(&[v4(10, 0, 0, 2)]).is_err());
    }

    #[test]
    fn denied_ranges_extend_builtin_blocks() {
        let policy = AddressPolicy::new(&[], &["100.64.0.0/10".to_string()]);
        assert!(policy.is_blocked(&v4(100, 64, 1, 1)));
        assert!(!policy.is_blocked(&v4(100, 128, 0, 1)));
    }

    // --- Pinned resolver tests ---

    #[test]
    fn pinned_resolver_only_answers_for_pinned_host() {
        let resolver = PinnedResolver::new("RDAP.example.net", vec![v4(198, 51, 100, 7)]);
        let addrs = resolver.lookup("rdap.example.net.").unwrap();
        assert_eq!(addrs, vec![SocketAddr::new(v4(198, 51, 100, 7), 0)]);
        assert!(resolver.lookup("metadata.internal").is_err());
    }

    #[test]
    fn pinned_resolver_without_addresses_refuses() {
        let resolver = PinnedResolver::new("rdap.example.net", vec![]);
        assert!(resolver.lookup("rdap.example.net").is_err());
    }
}
