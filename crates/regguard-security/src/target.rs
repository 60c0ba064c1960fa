// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query target validation.
//!
//! Every lookup starts here. Raw input is classified as a domain, IP address,
//! IP range or autonomous system number and canonicalized. A [`QueryTarget`]
//! can only be obtained from [`TargetValidator::validate`], so holding one is
//! proof the input passed validation.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use regguard_config::model::ValidatorConfig;
use regguard_core::RegguardError;
use tracing::{debug, warn};

use crate::cidr::Cidr;
use crate::homograph::{HeuristicHomographDetector, HomographDetector};
use crate::ssrf::is_private_ip;

/// Longest permitted domain name, in octets.
pub const MAX_DOMAIN_LEN: usize = 253;

const MAX_LABEL_LEN: usize = 63;

/// Classified target value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetValue {
    /// ASCII (A-label) form, lower case, no trailing dot.
    Domain(String),
    IpAddress(IpAddr),
    IpRange(Cidr),
    Asn(u32),
}

/// A validated, canonicalized lookup target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    value: TargetValue,
    raw: String,
    canonical: String,
    non_ascii_origin: bool,
}

impl QueryTarget {
    pub fn value(&self) -> &TargetValue {
        &self.value
    }

    /// Input exactly as supplied.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// True when the input contained non-ASCII characters and was converted.
    pub fn is_non_ascii_origin(&self) -> bool {
        self.non_ascii_origin
    }

    pub fn kind(&self) -> &'static str {
        match self.value {
            TargetValue::Domain(_) => "domain",
            TargetValue::IpAddress(_) => "ip",
            TargetValue::IpRange(_) => "ip_range",
            TargetValue::Asn(_) => "autnum",
        }
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Validates raw lookup input.
#[derive(Clone)]
pub struct TargetValidator {
    reserved_labels: HashSet<String>,
    detector: Option<Arc<dyn HomographDetector>>,
}

impl fmt::Debug for TargetValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetValidator")
            .field("reserved_labels", &self.reserved_labels)
            .field("homograph_detection", &self.detector.is_some())
            .finish()
    }
}

impl TargetValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        let detector: Option<Arc<dyn HomographDetector>> = if config.homograph.enabled {
            Some(Arc::new(HeuristicHomographDetector::new(&config.homograph)))
        } else {
            None
        };
        Self {
            reserved_labels: config
                .reserved_labels
                .iter()
                .map(|l| l.trim().to_ascii_lowercase())
                .collect(),
            detector,
        }
    }

    /// Replace the homograph detector.
    pub fn with_detector(mut self, detector: Arc<dyn HomographDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Classify and canonicalize raw input.
    ///
    /// Pure apart from logging: no network access, no clock.
    pub fn validate(&self, raw: &str) -> Result<QueryTarget, RegguardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("target is empty"));
        }
        if trimmed.len() > MAX_DOMAIN_LEN {
            return Err(invalid(format!(
                "target exceeds {MAX_DOMAIN_LEN} characters"
            )));
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(invalid("target contains whitespace or control characters"));
        }

        if let Some(asn) = parse_asn(trimmed)? {
            return Ok(self.finish(raw, TargetValue::Asn(asn), format!("AS{asn}"), false));
        }

        if trimmed.contains('/') {
            let cidr: Cidr = trimmed
                .parse()
                .map_err(|e| invalid(format!("invalid IP range: {e}")))?;
            return Ok(self.finish(raw, TargetValue::IpRange(cidr), cidr.to_string(), false));
        }

        let bracketless = trimmed.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bracketless.parse::<IpAddr>() {
            let ip = match ip {
                IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
                v4 => v4,
            };
            return Ok(self.finish(raw, TargetValue::IpAddress(ip), ip.to_string(), false));
        }

        let (domain, non_ascii_origin) = self.canonical_domain(trimmed)?;
        let canonical = domain.clone();
        Ok(self.finish(raw, TargetValue::Domain(domain), canonical, non_ascii_origin))
    }

    fn finish(
        &self,
        raw: &str,
        value: TargetValue,
        canonical: String,
        non_ascii_origin: bool,
    ) -> QueryTarget {
        let target = QueryTarget {
            value,
            raw: raw.to_string(),
            canonical,
            non_ascii_origin,
        };
        debug!(kind = target.kind(), canonical = %target.canonical, "target validated");
        target
    }

    fn canonical_domain(&self, input: &str) -> Result<(String, bool), RegguardError> {
        let input = input.strip_suffix('.').unwrap_or(input);
        let non_ascii_origin = !input.is_ascii();

        let ascii = if non_ascii_origin {
            idna::domain_to_ascii(input)
                .map_err(|_| invalid("domain cannot be converted to ASCII form"))?
        } else {
            input.to_ascii_lowercase()
        };

        if ascii.len() > MAX_DOMAIN_LEN {
            return Err(invalid(format!(
                "domain exceeds {MAX_DOMAIN_LEN} octets in ASCII form"
            )));
        }

        let labels: Vec<&str> = ascii.split('.').collect();
        for label in &labels {
            check_label_syntax(label)?;
        }
        if labels.last().is_some_and(|tld| tld.bytes().all(|b| b.is_ascii_digit())) {
            return Err(invalid("top-level label must not be numeric"));
        }

        for label in &labels {
            if self.reserved_labels.contains(*label) {
                warn!(label, "reserved label in target");
                return Err(RegguardError::DisallowedPattern {
                    reason: format!("reserved label `{label}`"),
                });
            }
        }

        check_ip_shaped_labels(&labels)?;
        self.check_idn_labels(&ascii, &labels)?;

        Ok((ascii, non_ascii_origin))
    }

    /// Decode punycode labels and re-check the Unicode form.
    fn check_idn_labels(&self, ascii: &str, labels: &[&str]) -> Result<(), RegguardError> {
        if !labels.iter().any(|l| l.starts_with("xn--")) {
            return Ok(());
        }
        let (unicode, result) = idna::domain_to_unicode(ascii);
        if result.is_err() {
            return Err(invalid("invalid punycode label"));
        }
        let decoded: Vec<&str> = unicode.split('.').collect();
        if decoded.len() != labels.len() {
            return Err(invalid("punycode decoding changed label structure"));
        }

        for (ascii_label, unicode_label) in labels.iter().zip(&decoded) {
            if !ascii_label.starts_with("xn--") {
                continue;
            }
            if self.reserved_labels.contains(*unicode_label) {
                return Err(RegguardError::DisallowedPattern {
                    reason: format!("reserved label `{unicode_label}`"),
                });
            }
            if let Some(detector) = &self.detector {
                if let Some(reason) = detector.assess(unicode_label) {
                    warn!(label = %ascii_label, %reason, "homograph risk");
                    return Err(RegguardError::DisallowedPattern {
                        reason: format!("homograph risk in `{ascii_label}`: {reason}"),
                    });
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> RegguardError {
    RegguardError::InvalidTargetFormat {
        reason: reason.into(),
    }
}

/// `AS64496`, `as64496` or a bare number. `Ok(None)` when the input is not
/// ASN-shaped at all.
fn parse_asn(input: &str) -> Result<Option<u32>, RegguardError> {
    let digits = match input.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &input[2..],
        _ => input,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let asn: u32 = digits
        .parse()
        .map_err(|_| invalid("AS number out of range"))?;
    if asn == 0 {
        return Err(invalid("AS0 is reserved"));
    }
    Ok(Some(asn))
}

fn check_label_syntax(label: &str) -> Result<(), RegguardError> {
    if label.is_empty() {
        return Err(invalid("empty label"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(invalid(format!("label exceeds {MAX_LABEL_LEN} octets")));
    }
    if !label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid(format!("label `{label}` contains invalid characters")));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid(format!("label `{label}` starts or ends with a hyphen")));
    }
    Ok(())
}

/// Reject names that embed a private IPv4 address, e.g. `127.0.0.1.nip.io`
/// or `10-0-0-1.example.com`. These resolve to the embedded address on
/// wildcard DNS services and are refused before any lookup.
fn check_ip_shaped_labels(labels: &[&str]) -> Result<(), RegguardError> {
    let blocked = |ip: Ipv4Addr| -> Result<(), RegguardError> {
        if is_private_ip(&IpAddr::V4(ip)) {
            warn!(%ip, "private address embedded in domain");
            return Err(RegguardError::DisallowedPattern {
                reason: format!("domain embeds private address {ip}"),
            });
        }
        Ok(())
    };

    for window in labels.windows(4) {
        if let Ok(ip) = window.join(".").parse::<Ipv4Addr>() {
            blocked(ip)?;
        }
    }
    for label in labels {
        let dotted = label.replace('-', ".");
        if dotted != *label {
            if let Ok(ip) = dotted.parse::<Ipv4Addr>() {
                blocked(ip)?;
            }
        }
    }
    Ok(())
}
