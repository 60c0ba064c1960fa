// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compliance metadata composer.
//!
//! Wraps a redacted record with jurisdiction, legal basis, retention and a
//! redaction summary. The record and decisions pass through untouched.

use std::collections::BTreeMap;

use regguard_config::model::RedactionConfig;
use regguard_core::{DnssecStatus, SecurityContext, SecurityLevel};
use regguard_redaction::{DecisionAction, FieldDecision, RedactionOutcome, FAIL_SAFE_POLICY_ID};
use regguard_validate::ValidatedRecord;
use serde::Serialize;
use serde_json::Value;
use strum::Display;

/// How much of the record was altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RedactionLevel {
    /// No field was altered.
    None,
    /// Matching policies altered some fields.
    Partial,
    /// The fail-safe default removed PII no policy covered.
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceMetadata {
    pub registry: String,
    pub jurisdiction: Option<String>,
    pub legal_basis: Option<String>,
    pub retention_days: u32,
    pub redaction_level: RedactionLevel,
    /// Distinct owning policies across decisions, sorted.
    pub policies_applied: Vec<String>,
    pub redacted_fields: usize,
    pub policy_version: u64,
    pub security_level: SecurityLevel,
    pub threat_score: f64,
    pub dnssec: DnssecStatus,
    pub content_hash: String,
}

/// What `process` hands back on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalRecord {
    pub record: Value,
    pub decisions: Vec<FieldDecision>,
    pub compliance: ComplianceMetadata,
}

#[derive(Debug, Clone)]
pub struct ComplianceComposer {
    retention: BTreeMap<String, u32>,
    default_retention: u32,
}

impl ComplianceComposer {
    pub fn new(config: &RedactionConfig) -> Self {
        Self {
            retention: config
                .retention_days
                .iter()
                .map(|(basis, days)| (normalize_basis(basis), *days))
                .collect(),
            default_retention: config.default_retention_days,
        }
    }

    /// Retention period for a legal basis, or the default.
    pub fn retention_days(&self, legal_basis: Option<&str>) -> u32 {
        legal_basis
            .and_then(|basis| self.retention.get(basis))
            .copied()
            .unwrap_or(self.default_retention)
    }

    pub fn compose(
        &self,
        outcome: RedactionOutcome,
        validated: &ValidatedRecord,
        ctx: &SecurityContext,
        dnssec: DnssecStatus,
    ) -> FinalRecord {
        let policies_applied = outcome
            .policies_applied()
            .into_iter()
            .map(str::to_string)
            .collect();
        let compliance = ComplianceMetadata {
            registry: validated.registry().name.clone(),
            jurisdiction: ctx.jurisdiction().map(str::to_string),
            legal_basis: ctx.legal_basis().map(str::to_string),
            retention_days: self.retention_days(ctx.legal_basis()),
            redaction_level: redaction_level(&outcome.decisions),
            policies_applied,
            redacted_fields: outcome
                .decisions
                .iter()
                .filter(|d| d.action != DecisionAction::Bypass)
                .count(),
            policy_version: outcome.policy_version,
            security_level: ctx.security_level(),
            threat_score: ctx.threat_score(),
            dnssec,
            content_hash: validated.content_hash().to_string(),
        };
        FinalRecord {
            record: outcome.record,
            decisions: outcome.decisions,
            compliance,
        }
    }
}

fn redaction_level(decisions: &[FieldDecision]) -> RedactionLevel {
    let mut altered = decisions.iter().filter(|d| d.action != DecisionAction::Bypass).peekable();
    if altered.peek().is_none() {
        RedactionLevel::None
    } else if altered.any(|d| d.policy_id == FAIL_SAFE_POLICY_ID) {
        RedactionLevel::Full
    } else {
        RedactionLevel::Partial
    }
}

fn normalize_basis(basis: &str) -> String {
    basis
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
