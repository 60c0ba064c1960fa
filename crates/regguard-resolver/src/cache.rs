// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution cache keyed by canonical host name.
//!
//! Entries are immutable once written. Expiry replaces an entry wholesale;
//! nothing is updated in place.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regguard_core::DnssecStatus;
use tokio::time::Instant;
use tracing::debug;

/// One cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub addresses: Vec<IpAddr>,
    pub canonical_name: String,
    pub dnssec: DnssecStatus,
    pub resolved_at: DateTime<Utc>,
    /// Effective TTL, already capped.
    pub ttl_ceiling: Duration,
    pub(crate) stored_at: Instant,
}

impl CacheEntry {
    pub fn new(
        addresses: Vec<IpAddr>,
        canonical_name: String,
        dnssec: DnssecStatus,
        resolved_at: DateTime<Utc>,
        ttl_ceiling: Duration,
        stored_at: Instant,
    ) -> Self {
        Self {
            addresses,
            canonical_name,
            dnssec,
            resolved_at,
            ttl_ceiling,
            stored_at,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl_ceiling
    }
}

/// Bounded map of host name to immutable entry.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    capacity: usize,
}

impl ResolutionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &str, now: Instant) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(Arc::clone)
    }

    /// Store an entry, replacing any previous one for the same key.
    pub fn insert(&self, key: String, entry: CacheEntry) {
        if self.capacity == 0 || entry.ttl_ceiling.is_zero() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let now = entry.stored_at;
            entries.retain(|_, e| e.is_fresh(now));
            if entries.len() >= self.capacity {
                // Still full of live entries: evict the oldest.
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        debug!(host = %key, ttl_secs = entry.ttl_ceiling.as_secs(), "resolution cached");
        entries.insert(key, Arc::new(entry));
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
