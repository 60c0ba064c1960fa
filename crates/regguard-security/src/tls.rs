// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS enforcement for outbound registry connections.
//!
//! Provides the protocol allow-list check, certificate pin verification and a
//! reqwest client builder that enforces TLS 1.2+ and connects only to
//! pre-authorized addresses.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use regguard_config::model::CertificatePinConfig;
use regguard_core::{Protocol, RegguardError};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::ssrf::PinnedResolver;

/// A SHA-256 fingerprint of a DER-encoded certificate.
pub type Fingerprint = [u8; 32];

/// Build a reqwest::Client bound to a single authorized host.
///
/// - Minimum TLS 1.2 for all connections.
/// - DNS answers come only from the pinned address set.
/// - Redirects are never followed and system proxies are ignored.
/// - TLS session info is retained so the peer certificate can be pinned.
pub fn build_pinned_client(
    host: &str,
    addresses: Vec<IpAddr>,
    timeout: Duration,
) -> Result<reqwest::Client, RegguardError> {
    let resolver = PinnedResolver::new(host, addresses);

    reqwest::Client::builder()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .dns_resolver(Arc::new(resolver))
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .tls_info(true)
        .timeout(timeout)
        .build()
        .map_err(|e| {
            error!("failed to build pinned HTTP client: {e}");
            RegguardError::Internal(format!("failed to build pinned HTTP client: {e}"))
        })
}

/// Check a URL's scheme against the protocol allow-list.
///
/// Call this before making requests; there is no loopback exemption.
pub fn validate_url(url: &str, allowed: &[Protocol]) -> Result<Protocol, RegguardError> {
    let parsed = url::Url::parse(url).map_err(|e| RegguardError::InvalidTargetFormat {
        reason: format!("invalid registry URL: {e}"),
    })?;
    let protocol = match parsed.scheme() {
        "https" => Protocol::Https,
        "http" => Protocol::Http,
        "whois" => Protocol::Whois,
        other => {
            error!(scheme = other, "protocol not allowed");
            return Err(RegguardError::ProtocolNotAllowed {
                protocol: other.to_string(),
            });
        }
    };
    check_protocol(protocol, allowed)?;
    Ok(protocol)
}

/// Reject protocols outside the allow-list.
pub fn check_protocol(protocol: Protocol, allowed: &[Protocol]) -> Result<(), RegguardError> {
    if allowed.contains(&protocol) {
        Ok(())
    } else {
        error!(%protocol, "protocol not allowed");
        Err(RegguardError::ProtocolNotAllowed {
            protocol: protocol.to_string(),
        })
    }
}

/// SHA-256 fingerprint of a DER certificate.
pub fn fingerprint(der: &[u8]) -> Fingerprint {
    Sha256::digest(der).into()
}

/// Configured certificate pins, keyed by lowercase host name.
#[derive(Debug, Clone, Default)]
pub struct CertificatePins {
    pins: HashMap<String, Vec<Fingerprint>>,
}

impl CertificatePins {
    /// Build from config. Malformed fingerprints are skipped (config
    /// validation reports them).
    pub fn from_config(entries: &[CertificatePinConfig]) -> Self {
        let mut pins: HashMap<String, Vec<Fingerprint>> = HashMap::new();
        for entry in entries {
            let decoded = entry.sha256.iter().filter_map(|fp| decode_fingerprint(fp));
            pins.entry(entry.host.to_ascii_lowercase())
                .or_default()
                .extend(decoded);
        }
        Self { pins }
    }

    pub fn pins_for(&self, host: &str) -> &[Fingerprint] {
        self.pins
            .get(&host.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_pins(&self, host: &str) -> bool {
        !self.pins_for(host).is_empty()
    }
}

/// Compare a presented certificate against the pin set.
///
/// An empty pin set accepts any certificate that passed normal chain
/// validation. A non-empty set requires the leaf to match one fingerprint.
pub fn verify_peer_certificate(
    host: &str,
    pins: &[Fingerprint],
    der: Option<&[u8]>,
) -> Result<(), RegguardError> {
    if pins.is_empty() {
        return Ok(());
    }
    let Some(der) = der else {
        error!(host, "no peer certificate available for pinned host");
        return Err(RegguardError::CertificateValidationFailed {
            host: host.to_string(),
            reason: "peer certificate unavailable".to_string(),
        });
    };
    let presented = fingerprint(der);
    if pins.iter().any(|p| *p == presented) {
        debug!(host, "certificate pin matched");
        Ok(())
    } else {
        error!(host, presented = %hex::encode(presented), "certificate pin mismatch");
        Err(RegguardError::CertificateValidationFailed {
            host: host.to_string(),
            reason: "certificate does not match any configured pin".to_string(),
        })
    }
}

fn decode_fingerprint(fp: &str) -> Option<Fingerprint> {
    let cleaned: String = fp.chars().filter(|c| *c != ':').collect();
    let bytes = hex::decode(cleaned).ok()?;
    bytes.try_into().ok()
}
