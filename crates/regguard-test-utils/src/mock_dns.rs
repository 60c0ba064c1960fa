// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock DNS backend with a static zone.
//!
//! Unknown names fail with `ResolutionBlocked`, like an NXDOMAIN from the
//! real backend.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use regguard_core::{Collaborator, DnsAnswer, DnsBackend, DnssecStatus, HealthStatus, RegguardError};

pub struct MockDns {
    zone: RwLock<HashMap<String, DnsAnswer>>,
    lookups: AtomicUsize,
    delay: Option<Duration>,
}

impl MockDns {
    pub fn new() -> Self {
        Self {
            zone: RwLock::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Add a DNSSEC-secure A/AAAA answer.
    ///
    /// Panics on unparsable addresses; test input only.
    pub fn with_host(self, name: &str, addresses: &[&str]) -> Self {
        self.insert(
            name,
            DnsAnswer {
                addresses: addresses.iter().map(|a| a.parse::<IpAddr>().unwrap()).collect(),
                ttl: Duration::from_secs(300),
                dnssec: DnssecStatus::Secure,
                canonical_name: None,
            },
        );
        self
    }

    /// Delay every answer, to exercise resolver timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, name: &str, answer: DnsAnswer) {
        self.zone
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_ascii_lowercase(), answer);
    }

    /// Backend lookups so far (cache hits do not count).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for MockDns {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for MockDns {
    fn name(&self) -> &str {
        "mock-dns"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl DnsBackend for MockDns {
    async fn lookup(&self, name: &str) -> Result<DnsAnswer, RegguardError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.zone
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegguardError::ResolutionBlocked {
                reason: format!("no such domain: {name}"),
            })
    }
}
