// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The secure resolver.
//!
//! Turns a validated target into a pinned address set. Advertised TTLs are
//! capped so a cached answer can never outlive the rebinding window, and the
//! resulting [`ResolutionResult`] is the only address source downstream.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regguard_config::model::{DnssecPolicy, ResolverConfig};
use regguard_config::validation::MAX_TTL_CEILING_SECS;
use regguard_core::{DnsBackend, DnssecStatus, RegguardError, ResolutionResult, SecurityContext};
use regguard_security::{QueryTarget, TargetValue};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::cache::{CacheEntry, ResolutionCache};

/// Resolves validated targets and registry hosts.
pub struct SecureResolver {
    backend: Arc<dyn DnsBackend>,
    cache: ResolutionCache,
    timeout: Duration,
    ttl_ceiling: Duration,
    dnssec_policy: DnssecPolicy,
    denied_suffixes: Vec<String>,
}

impl std::fmt::Debug for SecureResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureResolver")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .field("ttl_ceiling", &self.ttl_ceiling)
            .field("dnssec_policy", &self.dnssec_policy)
            .finish_non_exhaustive()
    }
}

impl SecureResolver {
    pub fn new(config: &ResolverConfig, backend: Arc<dyn DnsBackend>) -> Self {
        let ceiling = config.ttl_ceiling_secs.min(MAX_TTL_CEILING_SECS);
        Self {
            backend,
            cache: ResolutionCache::new(config.cache_capacity),
            timeout: Duration::from_millis(config.timeout_ms),
            ttl_ceiling: Duration::from_secs(ceiling),
            dnssec_policy: config.dnssec_policy,
            denied_suffixes: config
                .denied_suffixes
                .iter()
                .map(|s| s.trim().trim_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn DnsBackend> {
        &self.backend
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve a validated lookup target.
    ///
    /// Literal addresses resolve to themselves and ranges to their network
    /// address, so range checks downstream still apply. AS numbers carry no
    /// address and yield an empty, not-applicable result.
    pub async fn resolve(
        &self,
        target: &QueryTarget,
        ctx: &mut SecurityContext,
    ) -> Result<ResolutionResult, RegguardError> {
        match target.value() {
            TargetValue::Domain(name) => self.resolve_host(name, ctx).await,
            TargetValue::IpAddress(ip) => Ok(literal(target.canonical(), vec![*ip])),
            TargetValue::IpRange(cidr) => Ok(literal(target.canonical(), vec![cidr.network()])),
            TargetValue::Asn(_) => Ok(literal(target.canonical(), Vec::new())),
        }
    }

    /// Resolve a hostname to a pinned address set.
    pub async fn resolve_host(
        &self,
        host: &str,
        ctx: &mut SecurityContext,
    ) -> Result<ResolutionResult, RegguardError> {
        let name = host.trim_end_matches('.').to_ascii_lowercase();

        if let Some(suffix) = self.denied_suffix(&name) {
            error!(host = %name, suffix, "resolution denied by suffix policy");
            return Err(RegguardError::ResolutionBlocked {
                reason: format!("suffix `{suffix}` is denied"),
            });
        }

        let now = Instant::now();
        if let Some(entry) = self.cache.get(&name, now) {
            debug!(host = %name, "resolution cache hit");
            self.apply_dnssec_policy(&name, entry.dnssec, ctx)?;
            return Ok(ResolutionResult::new(
                entry.addresses.clone(),
                entry.canonical_name.clone(),
                entry.dnssec,
                entry.resolved_at,
                entry.ttl_ceiling,
            ));
        }

        debug!(host = %name, backend = self.backend.name(), "resolving");
        let answer = tokio::time::timeout(self.timeout, self.backend.lookup(&name))
            .await
            .map_err(|_| {
                warn!(host = %name, timeout_ms = self.timeout.as_millis() as u64, "resolution timed out");
                RegguardError::ResolutionTimeout {
                    duration: self.timeout,
                }
            })??;

        self.apply_dnssec_policy(&name, answer.dnssec, ctx)?;

        if answer.addresses.is_empty() {
            warn!(host = %name, "no addresses in answer");
            return Err(RegguardError::ResolutionBlocked {
                reason: "name has no addresses".to_string(),
            });
        }

        let ttl = answer.ttl.min(self.ttl_ceiling);
        let canonical_name = answer
            .canonical_name
            .map(|c| c.trim_end_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| name.clone());
        let resolved_at = Utc::now();

        self.cache.insert(
            name.clone(),
            CacheEntry::new(
                answer.addresses.clone(),
                canonical_name.clone(),
                answer.dnssec,
                resolved_at,
                ttl,
                now,
            ),
        );

        debug!(
            host = %name,
            addresses = answer.addresses.len(),
            ttl_secs = ttl.as_secs(),
            dnssec = %answer.dnssec,
            "resolved"
        );
        Ok(ResolutionResult::new(
            answer.addresses,
            canonical_name,
            answer.dnssec,
            resolved_at,
            ttl,
        ))
    }

    fn denied_suffix(&self, name: &str) -> Option<&str> {
        self.denied_suffixes
            .iter()
            .find(|suffix| {
                name == suffix.as_str()
                    || name
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
            .map(String::as_str)
    }

    fn apply_dnssec_policy(
        &self,
        name: &str,
        status: DnssecStatus,
        ctx: &mut SecurityContext,
    ) -> Result<(), RegguardError> {
        if status != DnssecStatus::Bogus {
            return Ok(());
        }
        match self.dnssec_policy {
            DnssecPolicy::Require => {
                error!(host = name, "DNSSEC validation failed");
                Err(RegguardError::DnssecValidationFailed {
                    name: name.to_string(),
                })
            }
            DnssecPolicy::Downgrade => {
                ctx.downgrade_security_level();
                warn!(
                    host = name,
                    level = %ctx.security_level(),
                    "DNSSEC validation failed, security level downgraded"
                );
                Ok(())
            }
            DnssecPolicy::Ignore => Ok(()),
        }
    }
}

fn literal(canonical: &str, addresses: Vec<IpAddr>) -> ResolutionResult {
    ResolutionResult::new(
        addresses,
        canonical,
        DnssecStatus::NotApplicable,
        Utc::now(),
        Duration::ZERO,
    )
}
