// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Copy-on-write policy registry.
//!
//! Readers take an immutable [`PolicySnapshot`] and keep it for the whole
//! run. Writers build a new snapshot and publish it atomically, so updates
//! only reach runs that start afterwards.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use regguard_config::model::PolicyConfig;
use tracing::info;

use crate::policy::{Policy, PolicyError};

/// An immutable set of policies in registration order.
#[derive(Debug, Default)]
pub struct PolicySnapshot {
    version: u64,
    next_seq: u64,
    policies: Vec<Arc<Policy>>,
}

impl PolicySnapshot {
    /// Incremented by every published change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn policies(&self) -> &[Arc<Policy>] {
        &self.policies
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Policy>> {
        self.policies.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Holds the current snapshot and serializes writers.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    current: ArcSwap<PolicySnapshot>,
    write_lock: Mutex<()>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry seeded with policies in declaration order.
    pub fn from_configs(configs: &[PolicyConfig]) -> Result<Self, PolicyError> {
        let registry = Self::new();
        registry.replace(configs)?;
        Ok(registry)
    }

    /// The snapshot in-flight runs should hold on to.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Compile and append a policy. Ids must be unique.
    pub fn register(&self, config: &PolicyConfig) -> Result<u64, PolicyError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        if current.get(config.id.trim()).is_some() {
            return Err(PolicyError::DuplicateId(config.id.trim().to_string()));
        }
        let policy = Policy::compile(config, current.next_seq)?;
        let mut policies = current.policies.clone();
        policies.push(Arc::new(policy));
        Ok(self.publish(current.version + 1, current.next_seq + 1, policies))
    }

    /// Replace every policy at once. Nothing changes if any policy fails to
    /// compile.
    pub fn replace(&self, configs: &[PolicyConfig]) -> Result<u64, PolicyError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        let mut policies: Vec<Arc<Policy>> = Vec::with_capacity(configs.len());
        let mut seq = current.next_seq;
        for config in configs {
            if policies.iter().any(|p| p.id() == config.id.trim()) {
                return Err(PolicyError::DuplicateId(config.id.trim().to_string()));
            }
            policies.push(Arc::new(Policy::compile(config, seq)?));
            seq += 1;
        }
        Ok(self.publish(current.version + 1, seq, policies))
    }

    /// Drop a policy by id. Returns the new version, or `None` if absent.
    pub fn remove(&self, id: &str) -> Option<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        current.get(id)?;
        let policies = current
            .policies
            .iter()
            .filter(|p| p.id() != id)
            .cloned()
            .collect();
        Some(self.publish(current.version + 1, current.next_seq, policies))
    }

    fn publish(&self, version: u64, next_seq: u64, policies: Vec<Arc<Policy>>) -> u64 {
        let count = policies.len();
        self.current.store(Arc::new(PolicySnapshot {
            version,
            next_seq,
            policies,
        }));
        info!(version, policies = count, "published redaction policy snapshot");
        version
    }
}
