// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry endpoint selection.
//!
//! Maps a validated target onto one configured registry and the lookup URL
//! to request from it: longest domain suffix for names, most specific
//! containing range for addresses and networks, containing range for ASNs.

use regguard_config::model::RegistryConfig;
use regguard_config::validation::parse_asn_range;
use regguard_core::{Protocol, RegguardError, RegistryIdentity};
use regguard_security::{Cidr, QueryTarget, TargetValue};
use tracing::{debug, error};

/// One configured registry, parsed.
#[derive(Debug, Clone)]
struct RegistryEndpoint {
    identity: RegistryIdentity,
    base: String,
    host: String,
    port: u16,
    protocol: Protocol,
    domain_suffixes: Vec<String>,
    ip_ranges: Vec<Cidr>,
    asn_ranges: Vec<(u32, u32)>,
}

/// Where to send one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEndpoint {
    pub identity: RegistryIdentity,
    pub url: String,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

/// The `[[registries]]` table in lookup form.
#[derive(Debug, Clone, Default)]
pub struct RegistryDirectory {
    registries: Vec<RegistryEndpoint>,
}

impl RegistryDirectory {
    pub fn from_config(configs: &[RegistryConfig]) -> Result<Self, RegguardError> {
        let registries = configs
            .iter()
            .map(RegistryEndpoint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { registries })
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    /// Pick the registry for `target` and build its lookup URL.
    pub fn select(&self, target: &QueryTarget) -> Result<SelectedEndpoint, RegguardError> {
        let (registry, path) = match target.value() {
            TargetValue::Domain(name) => (
                self.best_by(|r| r.suffix_match_len(name)),
                format!("domain/{name}"),
            ),
            TargetValue::IpAddress(ip) => (
                self.best_by(|r| {
                    r.ip_ranges
                        .iter()
                        .filter(|range| range.contains(ip))
                        .map(|range| usize::from(range.prefix_len()))
                        .max()
                }),
                format!("ip/{ip}"),
            ),
            TargetValue::IpRange(cidr) => (
                self.best_by(|r| {
                    r.ip_ranges
                        .iter()
                        .filter(|range| range.covers(cidr))
                        .map(|range| usize::from(range.prefix_len()))
                        .max()
                }),
                format!("ip/{}/{}", cidr.network(), cidr.prefix_len()),
            ),
            TargetValue::Asn(asn) => (
                self.best_by(|r| {
                    r.asn_ranges
                        .iter()
                        .filter(|(start, end)| (*start..=*end).contains(asn))
                        // Narrower ranges score higher.
                        .map(|(start, end)| usize::MAX - (end - start) as usize)
                        .max()
                }),
                format!("autnum/{asn}"),
            ),
        };

        let Some(registry) = registry else {
            error!(target = target.canonical(), kind = target.kind(), "no registry serves target");
            return Err(RegguardError::ResolutionBlocked {
                reason: format!("no registry configured for {} {}", target.kind(), target.canonical()),
            });
        };

        debug!(target = target.canonical(), registry = %registry.identity.name, "registry selected");
        Ok(SelectedEndpoint {
            identity: registry.identity.clone(),
            url: format!("{}/{path}", registry.base),
            host: registry.host.clone(),
            port: registry.port,
            protocol: registry.protocol,
        })
    }

    /// Highest-scoring registry; earlier entries win ties.
    fn best_by<F>(&self, score: F) -> Option<&RegistryEndpoint>
    where
        F: Fn(&RegistryEndpoint) -> Option<usize>,
    {
        let mut best: Option<(usize, &RegistryEndpoint)> = None;
        for registry in &self.registries {
            if let Some(s) = score(registry)
                && best.is_none_or(|(b, _)| s > b)
            {
                best = Some((s, registry));
            }
        }
        best.map(|(_, r)| r)
    }
}

impl RegistryEndpoint {
    fn parse(config: &RegistryConfig) -> Result<Self, RegguardError> {
        let invalid = |what: String| RegguardError::Config(format!("registry `{}`: {what}", config.name));

        let url = url::Url::parse(&config.base_url)
            .map_err(|e| invalid(format!("invalid base_url: {e}")))?;
        let protocol = match url.scheme() {
            "https" => Protocol::Https,
            "http" => Protocol::Http,
            other => return Err(invalid(format!("unsupported scheme `{other}`"))),
        };
        let host = match url.host() {
            Some(url::Host::Domain(d)) => d.to_ascii_lowercase(),
            Some(url::Host::Ipv4(ip)) => ip.to_string(),
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(invalid("base_url has no host".to_string())),
        };
        let port = url.port_or_known_default().unwrap_or(protocol.default_port());

        let ip_ranges = config
            .ip_ranges
            .iter()
            .map(|r| r.parse::<Cidr>().map_err(|e| invalid(format!("ip range `{r}`: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let asn_ranges = config
            .asn_ranges
            .iter()
            .map(|r| parse_asn_range(r).ok_or_else(|| invalid(format!("invalid ASN range `{r}`"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            identity: RegistryIdentity {
                name: config.name.clone(),
                base_url: config.base_url.clone(),
            },
            base: config.base_url.trim_end_matches('/').to_string(),
            host,
            port,
            protocol,
            domain_suffixes: config
                .domain_suffixes
                .iter()
                .map(|s| s.trim().trim_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            ip_ranges,
            asn_ranges,
        })
    }

    /// Length of the longest configured suffix `name` falls under.
    fn suffix_match_len(&self, name: &str) -> Option<usize> {
        self.domain_suffixes
            .iter()
            .filter(|suffix| {
                name == suffix.as_str()
                    || name
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
            .map(String::len)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regguard_config::model::ValidatorConfig;
    use regguard_security::TargetValidator;

    fn registry(name: &str, url: &str, suffixes: &[&str], ips: &[&str], asns: &[&str]) -> RegistryConfig {
        RegistryConfig {
            name: name.into(),
            base_url: url.into(),
            domain_suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            ip_ranges: ips.iter().map(|s| s.to_string()).collect(),
            asn_ranges: asns.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn directory() -> RegistryDirectory {
        RegistryDirectory::from_config(&[
            registry("generic", "https://rdap.generic.test/", &["com"], &["198.51.0.0/16"], &["64496-64511"]),
            registry("eu", "https://rdap.eu.test/rdap", &["eu", "co.eu"], &["198.51.100.0/24"], &["64500"]),
            registry("specific", "https://rdap.specific.test:8443", &["example.com"], &[], &[]),
        ])
        .unwrap()
    }

    fn target(raw: &str) -> QueryTarget {
        TargetValidator::new(&ValidatorConfig::default()).validate(raw).unwrap()
    }

    #[test]
    fn longest_suffix_wins() {
        let dir = directory();
        let selected = dir.select(&target("www.example.com")).unwrap();
        assert_eq!(selected.identity.name, "specific");
        assert_eq!(selected.url, "https://rdap.specific.test:8443/domain/www.example.com");
        assert_eq!(selected.port, 8443);

        let selected = dir.select(&target("shop.com")).unwrap();
        assert_eq!(selected.identity.name, "generic");
        assert_eq!(selected.url, "https://rdap.generic.test/domain/shop.com");
        assert_eq!(selected.host, "rdap.generic.test");
        assert_eq!(selected.port, 443);
    }

    #[test]
    fn suffix_matches_whole_labels() {
        let dir = directory();
        // "notcom" is not under "com".
        assert!(dir.select(&target("example.notcom")).is_err());
    }

    #[test]
    fn most_specific_ip_range_wins() {
        let dir = directory();
        let selected = dir.select(&target("198.51.100.7")).unwrap();
        assert_eq!(selected.identity.name, "eu");
        assert_eq!(selected.url, "https://rdap.eu.test/rdap/ip/198.51.100.7");

        let selected = dir.select(&target("198.51.7.1")).unwrap();
        assert_eq!(selected.identity.name, "generic");
    }

    #[test]
    fn networks_need_a_covering_range() {
        let dir = directory();
        let selected = dir.select(&target("198.51.100.0/25")).unwrap();
        assert_eq!(selected.identity.name, "eu");
        assert_eq!(selected.url, "https://rdap.eu.test/rdap/ip/198.51.100.0/25");

        assert!(dir.select(&target("198.0.0.0/8")).is_err());
    }

    #[test]
    fn asn_prefers_narrow_range() {
        let dir = directory();
        let selected = dir.select(&target("AS64500")).unwrap();
        assert_eq!(selected.identity.name, "eu");
        assert_eq!(selected.url, "https://rdap.eu.test/rdap/autnum/64500");

        let selected = dir.select(&target("AS64501")).unwrap();
        assert_eq!(selected.identity.name, "generic");
    }

    #[test]
    fn unknown_target_is_blocked() {
        let err = RegistryDirectory::default().select(&target("example.org")).unwrap_err();
        assert!(matches!(err, RegguardError::ResolutionBlocked { .. }));
    }

    #[test]
    fn bad_config_is_rejected() {
        let err = RegistryDirectory::from_config(&[registry("x", "ftp://x.test", &[], &[], &[])]).unwrap_err();
        assert!(matches!(err, RegguardError::Config(_)));
        let err = RegistryDirectory::from_config(&[registry("x", "https://x.test", &[], &["nope"], &[])])
            .unwrap_err();
        assert!(matches!(err, RegguardError::Config(_)));
    }
}
