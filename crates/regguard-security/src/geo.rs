// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Geographic fencing of destination addresses.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use regguard_config::model::GeoFenceConfig;
use regguard_core::{GeoLocator, RegguardError};
use tracing::warn;

use crate::cidr::Cidr;

/// Country code reported when no locator entry matches.
pub const UNKNOWN_COUNTRY: &str = "ZZ";

/// Locator backed by a static CIDR-to-country table. Longest prefix wins.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoLocator {
    ranges: Vec<(Cidr, String)>,
}

impl StaticGeoLocator {
    pub fn from_config(config: &GeoFenceConfig) -> Self {
        let ranges = config
            .ranges
            .iter()
            .filter_map(|r| {
                let cidr = r.cidr.parse::<Cidr>().ok()?;
                Some((cidr, r.country.trim().to_ascii_uppercase()))
            })
            .collect();
        Self { ranges }
    }
}

impl GeoLocator for StaticGeoLocator {
    fn locate(&self, address: &IpAddr) -> Option<String> {
        self.ranges
            .iter()
            .filter(|(cidr, _)| cidr.contains(address))
            .max_by_key(|(cidr, _)| cidr.prefix_len())
            .map(|(_, country)| country.clone())
    }
}

/// Allow/deny by destination country.
///
/// When an allow-list exists, addresses that cannot be located are rejected.
#[derive(Clone)]
pub struct GeoFence {
    enabled: bool,
    allowed: HashSet<String>,
    blocked: HashSet<String>,
    locator: Arc<dyn GeoLocator>,
}

impl std::fmt::Debug for GeoFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoFence")
            .field("enabled", &self.enabled)
            .field("allowed", &self.allowed)
            .field("blocked", &self.blocked)
            .finish_non_exhaustive()
    }
}

impl GeoFence {
    /// Fence using the static table from config.
    pub fn from_config(config: &GeoFenceConfig) -> Self {
        Self::with_locator(config, Arc::new(StaticGeoLocator::from_config(config)))
    }

    pub fn with_locator(config: &GeoFenceConfig, locator: Arc<dyn GeoLocator>) -> Self {
        let upper = |v: &[String]| -> HashSet<String> {
            v.iter().map(|c| c.trim().to_ascii_uppercase()).collect()
        };
        Self {
            enabled: config.enabled,
            allowed: upper(&config.allowed_countries),
            blocked: upper(&config.blocked_countries),
            locator,
        }
    }

    pub fn check(&self, addresses: &[IpAddr]) -> Result<(), RegguardError> {
        if !self.enabled {
            return Ok(());
        }
        for address in addresses {
            let country = self
                .locator
                .locate(address)
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());
            let denied = self.blocked.contains(&country)
                || (!self.allowed.is_empty() && !self.allowed.contains(&country));
            if denied {
                warn!(%address, %country, "destination outside geo-fence");
                return Err(RegguardError::GeoFenced {
                    address: *address,
                    country,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regguard_config::model::GeoRangeConfig;

    fn config(allowed: &[&str], blocked: &[&str]) -> GeoFenceConfig {
        GeoFenceConfig {
            enabled: true,
            allowed_countries: allowed.iter().map(|s| s.to_string()).collect(),
            blocked_countries: blocked.iter().map(|s| s.to_string()).collect(),
            ranges: vec![
                GeoRangeConfig {
                    cidr: "198.51.0.0/16".into(),
                    country: "de".into(),
                },
                GeoRangeConfig {
                    cidr: "198.51.100.0/24".into(),
                    country: "NL".into(),
                },
                GeoRangeConfig {
                    cidr: "203.0.113.0/24".into(),
                    country: "KP".into(),
                },
            ],
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let locator = StaticGeoLocator::from_config(&config(&[], &[]));
        assert_eq!(locator.locate(&ip("198.51.100.9")).as_deref(), Some("NL"));
        assert_eq!(locator.locate(&ip("198.51.7.1")).as_deref(), Some("DE"));
        assert_eq!(locator.locate(&ip("192.0.2.1")), None);
    }

    #[test]
    fn blocked_country_is_fenced() {
        let fence = GeoFence::from_config(&config(&[], &["kp"]));
        let err = fence.check(&[ip("203.0.113.5")]).unwrap_err();
        assert!(matches!(err, RegguardError::GeoFenced { ref country, .. } if country == "KP"));
        assert!(fence.check(&[ip("198.51.100.9")]).is_ok());
    }

    #[test]
    fn allow_list_rejects_unknown() {
        let fence = GeoFence::from_config(&config(&["NL", "DE"], &[]));
        assert!(fence.check(&[ip("198.51.100.9"), ip("198.51.7.1")]).is_ok());
        let err = fence.check(&[ip("192.0.2.1")]).unwrap_err();
        assert!(matches!(err, RegguardError::GeoFenced { ref country, .. } if country == UNKNOWN_COUNTRY));
    }

    #[test]
    fn disabled_fence_allows_everything() {
        let mut cfg = config(&["NL"], &["KP"]);
        cfg.enabled = false;
        let fence = GeoFence::from_config(&cfg);
        assert!(fence.check(&[ip("203.0.113.5")]).is_ok());
    }
}
