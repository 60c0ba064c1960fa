// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded cache of redaction outcomes.
//!
//! The key covers every input the engine reads: the validated record hash,
//! a hash of every context field a condition can match on, and the policy
//! snapshot version. An entry is only reused when all three match exactly.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use regguard_core::SecurityContext;
use sha2::{Digest, Sha256};

use crate::engine::RedactionOutcome;

/// Hash of the context fields redaction depends on.
///
/// Request-scope conditions may match on `request_id`, so it is part of the
/// hash and a replay under the same id is the only cross-call reuse.
pub fn context_hash(ctx: &SecurityContext) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        ctx.request_id().to_string(),
        ctx.client_id().to_string(),
        ctx.tenant_id().to_string(),
        ctx.jurisdiction().unwrap_or_default().to_string(),
        ctx.legal_basis().unwrap_or_default().to_string(),
        ctx.security_level().to_string(),
        ctx.threat_score().to_bits().to_string(),
        ctx.request_day().to_string(),
        ctx.registry().unwrap_or_default().to_string(),
    ];
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// `sha256(record hash ‖ context hash ‖ snapshot version)`.
pub fn cache_key(record_hash: &str, context_hash: &str, version: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(context_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(version.to_be_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Arc<RedactionOutcome>>,
    order: VecDeque<String>,
}

/// FIFO-evicting outcome cache.
#[derive(Debug)]
pub struct DecisionCache {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl DecisionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<RedactionOutcome>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(key).cloned()
    }

    pub fn insert(&self, key: String, outcome: Arc<RedactionOutcome>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.contains_key(&key) {
            return;
        }
        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(key, outcome);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn outcome() -> Arc<RedactionOutcome> {
        Arc::new(RedactionOutcome {
            record: json!({}),
            decisions: vec![],
            policy_version: 1,
        })
    }

    fn ctx(jurisdiction: &str) -> SecurityContext {
        SecurityContext::builder("req", "client")
            .jurisdiction(jurisdiction)
            .request_day(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .build()
    }

    #[test]
    fn key_depends_on_every_input() {
        let base = cache_key("r", "c", 1);
        assert_ne!(base, cache_key("r2", "c", 1));
        assert_ne!(base, cache_key("r", "c2", 1));
        assert_ne!(base, cache_key("r", "c", 2));
    }

    #[test]
    fn context_hash_covers_request_id() {
        let a = SecurityContext::builder("req-a", "client")
            .jurisdiction("EU")
            .request_day(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .build();
        assert_ne!(context_hash(&a), context_hash(&ctx("EU")));
        assert_eq!(context_hash(&ctx("EU")), context_hash(&ctx("EU")));
        assert_ne!(context_hash(&ctx("EU")), context_hash(&ctx("US")));
        let mut raised = ctx("EU");
        raised.raise_threat_score(0.2);
        assert_ne!(context_hash(&raised), context_hash(&ctx("EU")));
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let cache = DecisionCache::new(2);
        cache.insert("a".into(), outcome());
        cache.insert("b".into(), outcome());
        cache.insert("c".into(), outcome());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let cache = DecisionCache::new(0);
        cache.insert("a".into(), outcome());
        assert!(cache.is_empty());
    }
}
