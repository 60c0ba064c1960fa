// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DNS backend built on `hickory-resolver`.
//!
//! When DNSSEC is not ignored, lookups go through a validating resolver
//! first. A validation failure is retried once without validation and
//! reported as [`DnssecStatus::Bogus`] so the secure resolver can apply its
//! policy (fail or downgrade).

use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig as HickoryConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use regguard_config::model::{DnssecPolicy, ResolverConfig};
use regguard_config::validation::MAX_TTL_CEILING_SECS;
use regguard_core::{Collaborator, DnsAnswer, DnsBackend, DnssecStatus, HealthStatus, RegguardError};
use tracing::{debug, info, warn};

/// Production DNS backend.
pub struct HickoryBackend {
    validating: Option<TokioAsyncResolver>,
    plain: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryBackend {
    /// Build from resolver config. Uses the system configuration unless
    /// explicit nameservers are given.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, RegguardError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let ttl_ceiling = Duration::from_secs(config.ttl_ceiling_secs.min(MAX_TTL_CEILING_SECS));
        let servers: Vec<IpAddr> = config
            .nameservers
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        let build = |validate: bool| -> Result<TokioAsyncResolver, RegguardError> {
            let mut opts = ResolverOpts::default();
            opts.validate = validate;
            opts.timeout = timeout;
            opts.attempts = 1;
            opts.positive_max_ttl = Some(ttl_ceiling);
            opts.negative_max_ttl = Some(ttl_ceiling);
            if servers.is_empty() {
                let (system, _) = hickory_resolver::system_conf::read_system_conf().map_err(|e| {
                    RegguardError::Config(format!("cannot read system DNS configuration: {e}"))
                })?;
                Ok(TokioAsyncResolver::tokio(system, opts))
            } else {
                let group = NameServerConfigGroup::from_ips_clear(&servers, 53, true);
                let hickory_config = HickoryConfig::from_parts(None, vec![], group);
                Ok(TokioAsyncResolver::tokio(hickory_config, opts))
            }
        };

        let validating = match config.dnssec_policy {
            DnssecPolicy::Ignore => None,
            DnssecPolicy::Require | DnssecPolicy::Downgrade => Some(build(true)?),
        };
        info!(
            nameservers = servers.len(),
            dnssec = ?config.dnssec_policy,
            "hickory DNS backend initialized"
        );
        Ok(Self {
            validating,
            plain: build(false)?,
            timeout,
        })
    }

    async fn lookup_with(
        resolver: &TokioAsyncResolver,
        name: &str,
        dnssec: DnssecStatus,
    ) -> Result<DnsAnswer, ResolveError> {
        match resolver.lookup_ip(name).await {
            Ok(lookup) => {
                let ttl = lookup
                    .valid_until()
                    .saturating_duration_since(Instant::now());
                Ok(DnsAnswer {
                    addresses: lookup.iter().collect(),
                    ttl,
                    dnssec,
                    canonical_name: None,
                })
            }
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(DnsAnswer {
                addresses: Vec::new(),
                ttl: Duration::ZERO,
                dnssec,
                canonical_name: None,
            }),
            Err(e) => Err(e),
        }
    }

    fn classify(&self, name: &str, e: ResolveError) -> RegguardError {
        if matches!(e.kind(), ResolveErrorKind::Timeout) {
            return RegguardError::ResolutionTimeout {
                duration: self.timeout,
            };
        }
        warn!(host = name, error = %e, "DNS lookup failed");
        RegguardError::ResolutionBlocked {
            reason: "lookup failed".to_string(),
        }
    }
}

/// Outcome of a failed validating lookup, judged from the error text.
///
/// hickory reports DNSSEC problems as proto errors that mention signatures
/// or keys. Unsigned zones surface as "insecure" and are not treated as bogus.
fn dnssec_failure(e: &ResolveError) -> Option<DnssecStatus> {
    let text = e.to_string().to_ascii_lowercase();
    if text.contains("insecure") {
        return Some(DnssecStatus::Insecure);
    }
    ["rrsig", "dnssec", "dnskey", "signature", "bogus"]
        .iter()
        .any(|marker| text.contains(marker))
        .then_some(DnssecStatus::Bogus)
}

#[async_trait]
impl Collaborator for HickoryBackend {
    fn name(&self) -> &str {
        "hickory"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl DnsBackend for HickoryBackend {
    async fn lookup(&self, name: &str) -> Result<DnsAnswer, RegguardError> {
        let Some(validating) = &self.validating else {
            return Self::lookup_with(&self.plain, name, DnssecStatus::Insecure)
                .await
                .map_err(|e| self.classify(name, e));
        };

        match Self::lookup_with(validating, name, DnssecStatus::Secure).await {
            Ok(answer) => Ok(answer),
            Err(e) => match dnssec_failure(&e) {
                Some(status) => {
                    debug!(host = name, error = %e, %status, "validating lookup failed, retrying without DNSSEC");
                    Self::lookup_with(&self.plain, name, status)
                        .await
                        .map_err(|e| self.classify(name, e))
                }
                None => Err(self.classify(name, e)),
            },
        }
    }
}
