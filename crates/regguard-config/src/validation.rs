// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the TTL ceiling bound, parsable address ranges, pin formats and
//! unique policy identifiers.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::diagnostic::ConfigError;
use crate::model::RegguardConfig;

/// Hard upper bound on the resolution cache TTL.
pub const MAX_TTL_CEILING_SECS: u64 = 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RegguardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.pipeline.max_concurrency == 0 {
        fail("pipeline.max_concurrency must be at least 1".to_string());
    }

    if config.resolver.ttl_ceiling_secs > MAX_TTL_CEILING_SECS {
        fail(format!(
            "resolver.ttl_ceiling_secs must be at most {MAX_TTL_CEILING_SECS}, got {}",
            config.resolver.ttl_ceiling_secs
        ));
    }

    if config.resolver.timeout_ms == 0 {
        fail("resolver.timeout_ms must be greater than 0".to_string());
    }

    for ns in &config.resolver.nameservers {
        if ns.parse::<IpAddr>().is_err() {
            fail(format!("resolver.nameservers entry `{ns}` is not an IP address"));
        }
    }

    if config.boundary.rate_limit.capacity == 0 {
        fail("boundary.rate_limit.capacity must be at least 1".to_string());
    }
    if config.boundary.rate_limit.window_secs == 0 {
        fail("boundary.rate_limit.window_secs must be at least 1".to_string());
    }

    if config.boundary.allowed_protocols.is_empty() {
        fail("boundary.allowed_protocols must not be empty".to_string());
    }

    for ip in &config.boundary.allowed_private_ips {
        if ip.parse::<IpAddr>().is_err() {
            fail(format!("boundary.allowed_private_ips entry `{ip}` is not an IP address"));
        }
    }

    for cidr in &config.boundary.denied_ranges {
        if !is_valid_cidr(cidr) {
            fail(format!("boundary.denied_ranges entry `{cidr}` is not a valid CIDR"));
        }
    }

    for pin in &config.boundary.certificate_pins {
        if pin.sha256.is_empty() {
            fail(format!("boundary.certificate_pins for `{}` has no fingerprints", pin.host));
        }
        for fp in &pin.sha256 {
            if !is_sha256_hex(fp) {
                fail(format!(
                    "boundary.certificate_pins for `{}`: `{fp}` is not a 64-character hex SHA-256",
                    pin.host
                ));
            }
        }
    }

    for range in &config.boundary.geo_fence.ranges {
        if !is_valid_cidr(&range.cidr) {
            fail(format!("boundary.geo_fence.ranges entry `{}` is not a valid CIDR", range.cidr));
        }
    }

    let mut registry_names = HashSet::new();
    for (i, registry) in config.registries.iter().enumerate() {
        if registry.name.trim().is_empty() {
            fail(format!("registries[{i}].name must not be empty"));
        } else if !registry_names.insert(registry.name.as_str()) {
            fail(format!("duplicate registry name `{}` in [[registries]] array", registry.name));
        }
        match url::Url::parse(&registry.base_url) {
            Ok(url) if url.host_str().is_some() => {
                let scheme_allowed = config
                    .boundary
                    .allowed_protocols
                    .iter()
                    .any(|p| p.to_string() == url.scheme());
                if !scheme_allowed {
                    fail(format!(
                        "registries[{i}].base_url scheme `{}` is not in boundary.allowed_protocols",
                        url.scheme()
                    ));
                }
            }
            _ => fail(format!(
                "registries[{i}].base_url `{}` is not an absolute URL",
                registry.base_url
            )),
        }
        for cidr in &registry.ip_ranges {
            if !is_valid_cidr(cidr) {
                fail(format!("registries[{i}].ip_ranges entry `{cidr}` is not a valid CIDR"));
            }
        }
        for range in &registry.asn_ranges {
            if parse_asn_range(range).is_none() {
                fail(format!("registries[{i}].asn_ranges entry `{range}` is not a valid ASN range"));
            }
        }
    }

    let threshold = config.schema.threat_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        fail(format!("schema.threat_threshold must be in (0, 1], got {threshold}"));
    }

    let strict = config.redaction.strict_threat_score;
    if !(0.0..=1.0).contains(&strict) {
        fail(format!("redaction.strict_threat_score must be in [0, 1], got {strict}"));
    }

    let mut policy_ids = HashSet::new();
    for (i, policy) in config.redaction.policies.iter().enumerate() {
        if policy.id.trim().is_empty() {
            fail(format!("redaction.policies[{i}].id must not be empty"));
        } else if !policy_ids.insert(policy.id.as_str()) {
            fail(format!("duplicate policy id `{}` in [[redaction.policies]]", policy.id));
        }
        if policy.rules.is_empty() {
            fail(format!("redaction.policies[{i}] (`{}`) has no rules", policy.id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check `addr/len` syntax with a prefix length that fits the address family.
fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, len)) = cidr.split_once('/') else {
        return false;
    };
    match (addr.parse::<IpAddr>(), len.parse::<u8>()) {
        (Ok(IpAddr::V4(_)), Ok(len)) => len <= 32,
        (Ok(IpAddr::V6(_)), Ok(len)) => len <= 128,
        _ => false,
    }
}

fn is_sha256_hex(s: &str) -> bool {
    let cleaned: String = s.chars().filter(|c| *c != ':').collect();
    cleaned.len() == 64 && cleaned.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse `"start-end"` or `"n"` into an inclusive range.
pub fn parse_asn_range(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let s = s.strip_prefix("AS").or_else(|| s.strip_prefix("as")).unwrap_or(s);
    let (start, end) = match s.split_once('-') {
        Some((a, b)) => (a.trim().parse().ok()?, b.trim().parse().ok()?),
        None => {
            let n = s.parse().ok()?;
            (n, n)
        }
    };
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CertificatePinConfig, PolicyConfig, RegistryConfig, RuleConfig};
    use crate::model::{ActionParams, RedactionAction};

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    fn policy(id: &str) -> PolicyConfig {
        PolicyConfig {
            id: id.to_string(),
            jurisdictions: vec!["EU".into()],
            legal_bases: vec![],
            priority: 10,
            conditions: vec![],
            rules: vec![RuleConfig {
                field: "email".into(),
                action: RedactionAction::Remove,
                params: ActionParams::default(),
                conditions: vec![],
                exceptions: vec![],
            }],
        }
    }

    #[test]
    fn default_config_validates() {
        let config = RegguardConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn ttl_ceiling_above_sixty_fails() {
        let mut config = RegguardConfig::default();
        config.resolver.ttl_ceiling_secs = 300;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "ttl_ceiling_secs"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = RegguardConfig::default();
        config.pipeline.max_concurrency = 0;
        config.boundary.rate_limit.capacity = 0;
        config.boundary.denied_ranges = vec!["10.0.0.0/33".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn bad_certificate_pin_fails() {
        let mut config = RegguardConfig::default();
        config.boundary.certificate_pins = vec![CertificatePinConfig {
            host: "rdap.example.net".into(),
            sha256: vec!["abc123".into()],
        }];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "64-character hex"));
    }

    #[test]
    fn colon_separated_pin_is_accepted() {
        let fp = ["ab"; 32].join(":");
        assert!(is_sha256_hex(&fp));
    }

    #[test]
    fn duplicate_policy_ids_fail() {
        let mut config = RegguardConfig::default();
        config.redaction.policies = vec![policy("gdpr-policy"), policy("gdpr-policy")];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "duplicate policy id"));
    }

    #[test]
    fn plain_http_registry_rejected_by_default() {
        let mut config = RegguardConfig::default();
        config.registries = vec![RegistryConfig {
            name: "example".into(),
            base_url: "http://rdap.example.net".into(),
            domain_suffixes: vec!["example".into()],
            ip_ranges: vec![],
            asn_ranges: vec!["64496-64511".into()],
        }];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "scheme `http`"));
    }

    #[test]
    fn asn_ranges_parse() {
        assert_eq!(parse_asn_range("64496-64511"), Some((64496, 64511)));
        assert_eq!(parse_asn_range("AS13335"), Some((13335, 13335)));
        assert_eq!(parse_asn_range("10-1"), None);
        assert_eq!(parse_asn_range("x"), None);
    }
}
