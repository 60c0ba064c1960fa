// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The redaction policy engine.
//!
//! For every object member (and every vCard property) of a validated record
//! the engine looks for the first matching rule across the selected
//! policies, ordered by descending priority then registration order. A
//! PII-looking field that no rule decides is removed whenever the fail-safe
//! default is active. The engine never fails: a rule that cannot be applied
//! to a field removes that field instead.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use regguard_config::model::{RedactionAction, RedactionConfig};
use regguard_core::SecurityContext;
use regguard_validate::ValidatedRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;
use tracing::{debug, warn};

use crate::actions::{self, HashContext};
use crate::cache::{DecisionCache, cache_key, context_hash};
use crate::condition::EvalContext;
use crate::hash::{FieldHasher, TokenVault};
use crate::pii::PiiDetector;
use crate::policy::{ActionSpec, ExceptionOutcome, Policy, PolicyError};
use crate::registry::{PolicyRegistry, PolicySnapshot};

/// Policy id recorded for fail-safe removals.
pub const FAIL_SAFE_POLICY_ID: &str = "fail-safe-default";

/// The outcome recorded for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Remove,
    Mask,
    Hash,
    Replace,
    Partial,
    /// An exception let the field through unredacted.
    Bypass,
}

impl From<RedactionAction> for DecisionAction {
    fn from(action: RedactionAction) -> Self {
        match action {
            RedactionAction::Remove => Self::Remove,
            RedactionAction::Mask => Self::Mask,
            RedactionAction::Hash => Self::Hash,
            RedactionAction::Replace => Self::Replace,
            RedactionAction::Partial => Self::Partial,
        }
    }
}

/// A per-field redaction decision.
///
/// `value` is only set for bypassed fields that do not look like PII.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecision {
    pub field: String,
    pub action: DecisionAction,
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// The redacted record and the decisions that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactionOutcome {
    pub record: Value,
    pub decisions: Vec<FieldDecision>,
    /// Version of the policy snapshot used.
    pub policy_version: u64,
}

impl RedactionOutcome {
    /// Distinct policy ids across decisions, sorted.
    pub fn policies_applied(&self) -> BTreeSet<&str> {
        self.decisions.iter().map(|d| d.policy_id.as_str()).collect()
    }
}

/// Applies the current policy set to validated records.
#[derive(Debug)]
pub struct RedactionEngine {
    policies: Arc<PolicyRegistry>,
    pii: PiiDetector,
    hasher: FieldHasher,
    vault: TokenVault,
    cache: DecisionCache,
    permissive_jurisdictions: Vec<String>,
    strict_threat_score: f64,
}

impl RedactionEngine {
    /// Build an engine whose registry is seeded from `config.policies`.
    pub fn from_config(config: &RedactionConfig) -> Result<Self, PolicyError> {
        let registry = PolicyRegistry::from_configs(&config.policies)?;
        Self::with_registry(config, Arc::new(registry))
    }

    /// Build an engine around an existing registry.
    pub fn with_registry(config: &RedactionConfig, policies: Arc<PolicyRegistry>) -> Result<Self, PolicyError> {
        Ok(Self {
            policies,
            pii: PiiDetector::new(&config.pii_field_patterns)?,
            hasher: FieldHasher::new(config.hash_secret.as_deref(), config.salt_version),
            vault: TokenVault::new(),
            cache: DecisionCache::new(config.decision_cache_capacity),
            permissive_jurisdictions: config
                .permissive_jurisdictions
                .iter()
                .map(|j| j.trim().to_ascii_uppercase())
                .collect(),
            strict_threat_score: config.strict_threat_score,
        })
    }

    /// The registry, for hot reload and snapshotting.
    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    /// The original value behind a reversible hash token.
    pub fn reveal(&self, token: &str) -> Option<String> {
        self.vault.reveal(token)
    }

    /// Apply the current snapshot.
    pub fn apply(&self, record: &ValidatedRecord, ctx: &SecurityContext) -> RedactionOutcome {
        let snapshot = self.policies.snapshot();
        self.apply_with_snapshot(&snapshot, record, ctx)
    }

    /// Apply a snapshot the caller took earlier (at pipeline start).
    pub fn apply_with_snapshot(
        &self,
        snapshot: &PolicySnapshot,
        record: &ValidatedRecord,
        ctx: &SecurityContext,
    ) -> RedactionOutcome {
        let registry = record.registry();
        let record_key = format!("{}|{}|{}", record.content_hash(), registry.name, registry.base_url);
        let key = cache_key(&record_key, &context_hash(ctx), snapshot.version());
        if let Some(hit) = self.cache.get(&key) {
            debug!(request_id = %ctx.request_id(), "redaction decision cache hit");
            return hit.as_ref().clone();
        }

        let outcome = self.evaluate(snapshot, record, ctx);
        self.cache.insert(key, Arc::new(outcome.clone()));
        outcome
    }

    /// Whether PII fields without a rule are removed for this context.
    pub fn fail_safe_active(&self, ctx: &SecurityContext, selected_policies: usize) -> bool {
        let permissive = ctx
            .jurisdiction()
            .is_some_and(|j| self.permissive_jurisdictions.iter().any(|p| p == j));
        selected_policies > 0 || !permissive || ctx.threat_score() >= self.strict_threat_score
    }

    fn evaluate(&self, snapshot: &PolicySnapshot, record: &ValidatedRecord, ctx: &SecurityContext) -> RedactionOutcome {
        let original = record.record();
        let eval = EvalContext {
            security: ctx,
            registry: record.registry(),
            record: original,
        };

        let mut selected: Vec<&Policy> = snapshot
            .policies()
            .iter()
            .map(Arc::as_ref)
            .filter(|p| p.is_selected(&eval))
            .collect();
        selected.sort_by_key(|p| (Reverse(p.priority()), p.seq()));

        let fail_safe = self.fail_safe_active(ctx, selected.len());
        let salt = self.hasher.salt(ctx.tenant_id(), ctx.request_day());
        let mut walk = Walk {
            pii: &self.pii,
            selected: &selected,
            eval,
            fail_safe,
            hashing: HashContext {
                hasher: &self.hasher,
                vault: &self.vault,
                salt: &salt,
            },
            decisions: Vec::new(),
        };

        let mut redacted = original.clone();
        walk.visit(&mut redacted, &mut Vec::new());
        let decisions = walk.decisions;

        debug!(
            request_id = %ctx.request_id(),
            policies = selected.len(),
            decisions = decisions.len(),
            fail_safe,
            version = snapshot.version(),
            "redaction applied"
        );

        RedactionOutcome {
            record: redacted,
            decisions,
            policy_version: snapshot.version(),
        }
    }
}

/// How one field is settled.
enum Verdict<'a> {
    Remove { policy_id: &'a str },
    Transform { spec: &'a ActionSpec, policy_id: &'a str },
    Bypass { policy_id: &'a str },
}

/// One traversal of one record.
struct Walk<'a> {
    pii: &'a PiiDetector,
    selected: &'a [&'a Policy],
    eval: EvalContext<'a>,
    fail_safe: bool,
    hashing: HashContext<'a>,
    decisions: Vec<FieldDecision>,
}

impl<'a> Walk<'a> {
    fn decide(&self, path: &[String]) -> Option<Verdict<'a>> {
        let mut bypassed_by = None;
        for &policy in self.selected {
            for rule in policy.rules() {
                if !rule.applies_to(path, &self.eval) {
                    continue;
                }
                let spec = match rule.exception_for(&self.eval) {
                    Some(ExceptionOutcome::Bypass) => {
                        bypassed_by.get_or_insert(policy.id());
                        continue;
                    }
                    Some(ExceptionOutcome::Modify(spec)) => spec,
                    None => rule.spec(),
                };
                let policy_id = policy.id();
                return Some(match spec.action {
                    RedactionAction::Remove => Verdict::Remove { policy_id },
                    _ => Verdict::Transform { spec, policy_id },
                });
            }
        }
        if let Some(policy_id) = bypassed_by {
            return Some(Verdict::Bypass { policy_id });
        }
        if self.fail_safe && self.pii.is_pii(path) {
            return Some(Verdict::Remove {
                policy_id: FAIL_SAFE_POLICY_ID,
            });
        }
        None
    }

    fn visit(&mut self, value: &mut Value, path: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    path.push(key.clone());
                    match self.decide(path) {
                        Some(verdict) => self.settle_member(map, &key, verdict, path),
                        None => {
                            if let Some(child) = map.get_mut(&key) {
                                if key == "vcardArray" {
                                    self.visit_vcard(child, path);
                                } else {
                                    self.visit(child, path);
                                }
                            }
                        }
                    }
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    path.push(i.to_string());
                    self.visit(item, path);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    /// Properties of a `["vcard", [[name, params, type, value...], ...]]`
    /// array are fields named `<path>.<property>`.
    fn visit_vcard(&mut self, vcard: &mut Value, path: &mut Vec<String>) {
        let is_vcard = vcard.get(0).and_then(Value::as_str) == Some("vcard")
            && vcard.get(1).is_some_and(Value::is_array);
        if !is_vcard {
            self.visit(vcard, path);
            return;
        }
        let Some(properties) = vcard.get_mut(1).and_then(Value::as_array_mut) else {
            return;
        };

        let mut retain = Vec::with_capacity(properties.len());
        for property in properties.iter_mut() {
            let Some(name) = property.get(0).and_then(Value::as_str).map(str::to_ascii_lowercase) else {
                retain.push(true);
                continue;
            };
            path.push(name);
            let keep = match self.decide(path) {
                Some(verdict) => self.settle_property(property, verdict, path),
                None => true,
            };
            path.pop();
            retain.push(keep);
        }
        let mut flags = retain.into_iter();
        properties.retain(|_| flags.next().unwrap_or(true));
    }

    fn settle_member(&mut self, map: &mut Map<String, Value>, key: &str, verdict: Verdict<'a>, path: &[String]) {
        let field = path.join(".");
        match verdict {
            Verdict::Bypass { policy_id } => {
                let value = map.get(key).filter(|_| !self.pii.is_pii(path)).map(render);
                self.record(field, DecisionAction::Bypass, policy_id, value);
            }
            Verdict::Remove { policy_id } => {
                map.remove(key);
                self.record(field, DecisionAction::Remove, policy_id, None);
            }
            Verdict::Transform { spec, policy_id } => {
                let Some(value) = map.get_mut(key) else {
                    return;
                };
                match actions::apply(spec, value, &self.hashing) {
                    Ok(()) => self.record(field, spec.action.into(), policy_id, None),
                    Err(error) => {
                        warn!(field = %field, policy = policy_id, %error, "redaction action failed, removing field");
                        map.remove(key);
                        self.record(field, DecisionAction::Remove, policy_id, None);
                    }
                }
            }
        }
    }

    /// Returns whether the property stays in the vCard.
    fn settle_property(&mut self, property: &mut Value, verdict: Verdict<'a>, path: &[String]) -> bool {
        let field = path.join(".");
        match verdict {
            Verdict::Bypass { policy_id } => {
                let value = (!self.pii.is_pii(path)).then(|| render(property));
                self.record(field, DecisionAction::Bypass, policy_id, value);
                true
            }
            Verdict::Remove { policy_id } => {
                self.record(field, DecisionAction::Remove, policy_id, None);
                false
            }
            Verdict::Transform { spec, policy_id } => {
                let hashing = self.hashing;
                let result = match property.as_array_mut() {
                    Some(parts) => parts
                        .iter_mut()
                        .skip(3)
                        .try_for_each(|v| actions::apply(spec, v, &hashing)),
                    None => actions::apply(spec, property, &hashing),
                };
                match result {
                    Ok(()) => {
                        self.record(field, spec.action.into(), policy_id, None);
                        true
                    }
                    Err(error) => {
                        warn!(field = %field, policy = policy_id, %error, "redaction action failed, removing property");
                        self.record(field, DecisionAction::Remove, policy_id, None);
                        false
                    }
                }
            }
        }
    }

    fn record(&mut self, field: String, action: DecisionAction, policy_id: &str, value: Option<String>) {
        self.decisions.push(FieldDecision {
            field,
            action,
            policy_id: policy_id.to_string(),
            value,
        });
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
