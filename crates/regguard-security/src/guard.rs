// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network boundary guard.
//!
//! Final authorization before any outbound connection. Checks run in a fixed
//! order: address ranges, protocol, certificate pin policy, geo-fence, and
//! the rate limit last so a request rejected for another reason never spends
//! a token.

use std::net::IpAddr;
use std::sync::Arc;

use regguard_config::model::BoundaryConfig;
use regguard_core::{Protocol, RegguardError, ResolutionResult, SecurityContext};
use tracing::{error, info};

use crate::geo::GeoFence;
use crate::rate_limit::{RateLimitPermit, RateLimiter};
use crate::ssrf::AddressPolicy;
use crate::tls::{check_protocol, verify_peer_certificate, CertificatePins, Fingerprint};

/// Permission to open exactly one connection to a pinned address set.
///
/// Not `Clone`: it carries the rate-limit permit for this request.
#[derive(Debug)]
pub struct Authorization {
    host: String,
    protocol: Protocol,
    addresses: Vec<IpAddr>,
    pins: Vec<Fingerprint>,
    permit: RateLimitPermit,
}

impl Authorization {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The only addresses the fetcher may connect to.
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    pub fn pins(&self) -> &[Fingerprint] {
        &self.pins
    }

    pub fn client_id(&self) -> &str {
        self.permit.client_id()
    }
}

/// Enforces the outbound network policy.
#[derive(Debug)]
pub struct BoundaryGuard {
    addresses: AddressPolicy,
    allowed_protocols: Vec<Protocol>,
    pins: CertificatePins,
    require_pins: bool,
    limiter: Arc<RateLimiter>,
    geo: GeoFence,
}

impl BoundaryGuard {
    pub fn new(config: &BoundaryConfig) -> Self {
        Self {
            addresses: AddressPolicy::new(&config.allowed_private_ips, &config.denied_ranges),
            allowed_protocols: config.allowed_protocols.clone(),
            pins: CertificatePins::from_config(&config.certificate_pins),
            require_pins: config.require_certificate_pins,
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            geo: GeoFence::from_config(&config.geo_fence),
        }
    }

    /// Swap in a geo-fence backed by an external locator.
    pub fn with_geo_fence(mut self, fence: GeoFence) -> Self {
        self.geo = fence;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn allowed_protocols(&self) -> &[Protocol] {
        &self.allowed_protocols
    }

    /// Range and geo checks only. Consumes no rate-limit token.
    pub fn check_addresses(&self, resolution: &ResolutionResult) -> Result<(), RegguardError> {
        if resolution.addresses().is_empty() {
            error!(name = resolution.canonical_name(), "no addresses to authorize");
            return Err(RegguardError::ResolutionBlocked {
                reason: "no addresses to authorize".to_string(),
            });
        }
        self.addresses.check_all(resolution.addresses())?;
        self.geo.check(resolution.addresses())
    }

    /// Authorize one connection to the resolved host.
    pub fn authorize(
        &self,
        resolution: &ResolutionResult,
        protocol: Protocol,
        ctx: &SecurityContext,
    ) -> Result<Authorization, RegguardError> {
        let host = resolution.canonical_name();

        if resolution.addresses().is_empty() {
            error!(host, "no addresses to authorize");
            return Err(RegguardError::ResolutionBlocked {
                reason: "no addresses to authorize".to_string(),
            });
        }
        self.addresses.check_all(resolution.addresses())?;
        check_protocol(protocol, &self.allowed_protocols)?;

        let pins = self.pins.pins_for(host).to_vec();
        if !protocol.is_encrypted() && !pins.is_empty() {
            error!(host, %protocol, "pinned host requested over unencrypted protocol");
            return Err(RegguardError::CertificateValidationFailed {
                host: host.to_string(),
                reason: "pinned host requires an encrypted protocol".to_string(),
            });
        }
        if self.require_pins && protocol.is_encrypted() && pins.is_empty() {
            error!(host, "no certificate pin configured for host");
            return Err(RegguardError::CertificateValidationFailed {
                host: host.to_string(),
                reason: "no certificate pin configured".to_string(),
            });
        }

        self.geo.check(resolution.addresses())?;

        let permit = self.limiter.try_acquire(ctx.client_id())?;

        info!(
            request_id = ctx.request_id(),
            host,
            %protocol,
            addresses = resolution.addresses().len(),
            "connection authorized"
        );
        Ok(Authorization {
            host: host.to_string(),
            protocol,
            addresses: resolution.addresses().to_vec(),
            pins,
            permit,
        })
    }

    /// Check the certificate the peer presented against the pins captured at
    /// authorization time.
    pub fn verify_certificate(
        &self,
        authorization: &Authorization,
        der: Option<&[u8]>,
    ) -> Result<(), RegguardError> {
        verify_peer_certificate(&authorization.host, &authorization.pins, der)
    }

    /// Give back the rate-limit token of a cancelled request.
    pub fn release(&self, authorization: Authorization) {
        self.limiter.release(authorization.permit);
    }
}
