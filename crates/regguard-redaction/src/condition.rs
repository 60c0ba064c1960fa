// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Policy conditions: a closed set of operators over a closed set of
//! context scopes.

use regex::Regex;
use regguard_config::model::{ConditionConfig, ConditionOperator, ConditionValue, ContextScope};
use regguard_core::{RegistryIdentity, SecurityContext};
use serde_json::Value;

use crate::policy::PolicyError;

#[derive(Debug, Clone)]
enum Operator {
    Equals(String),
    Contains(String),
    Regex(Regex),
    In(Vec<String>),
    NotIn(Vec<String>),
}

/// A compiled condition.
#[derive(Debug, Clone)]
pub struct Condition {
    field: String,
    scope: ContextScope,
    operator: Operator,
}

/// Everything a condition may look at.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub security: &'a SecurityContext,
    pub registry: &'a RegistryIdentity,
    /// The validated record, before any redaction.
    pub record: &'a Value,
}

impl Condition {
    pub fn compile(config: &ConditionConfig, policy_id: &str) -> Result<Self, PolicyError> {
        let one = || match &config.value {
            ConditionValue::One(v) => v.clone(),
            ConditionValue::Many(vs) => vs.join(","),
        };
        let many = || match &config.value {
            ConditionValue::One(v) => vec![v.clone()],
            ConditionValue::Many(vs) => vs.clone(),
        };
        let operator = match config.operator {
            ConditionOperator::Equals => Operator::Equals(one()),
            ConditionOperator::Contains => Operator::Contains(one().to_lowercase()),
            ConditionOperator::Regex => {
                let pattern = one();
                let regex = Regex::new(&pattern).map_err(|source| PolicyError::InvalidRegex {
                    policy: policy_id.to_string(),
                    pattern,
                    source,
                })?;
                Operator::Regex(regex)
            }
            ConditionOperator::In => Operator::In(many()),
            ConditionOperator::NotIn => Operator::NotIn(many()),
        };
        Ok(Self {
            field: config.field.trim().to_string(),
            scope: config.scope,
            operator,
        })
    }

    /// Evaluate against a context. A field the scope does not carry never
    /// matches, whatever the operator.
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        let Some(actual) = self.lookup(ctx) else {
            return false;
        };
        match &self.operator {
            Operator::Equals(expected) => actual.eq_ignore_ascii_case(expected),
            Operator::Contains(needle) => actual.to_lowercase().contains(needle.as_str()),
            Operator::Regex(regex) => regex.is_match(&actual),
            Operator::In(list) => list.iter().any(|v| v.eq_ignore_ascii_case(&actual)),
            Operator::NotIn(list) => !list.iter().any(|v| v.eq_ignore_ascii_case(&actual)),
        }
    }

    fn lookup(&self, ctx: &EvalContext<'_>) -> Option<String> {
        let security = ctx.security;
        match self.scope {
            ContextScope::User => match self.field.as_str() {
                "client" | "client_id" => Some(security.client_id().to_string()),
                "tenant" | "tenant_id" => Some(security.tenant_id().to_string()),
                _ => None,
            },
            ContextScope::Request => match self.field.as_str() {
                "jurisdiction" => security.jurisdiction().map(str::to_string),
                "legal_basis" => security.legal_basis().map(str::to_string),
                "security_level" => Some(security.security_level().to_string()),
                "threat_score" => Some(security.threat_score().to_string()),
                "request_id" => Some(security.request_id().to_string()),
                _ => None,
            },
            ContextScope::Registry => match self.field.as_str() {
                "name" | "registry" => Some(ctx.registry.name.clone()),
                "base_url" => Some(ctx.registry.base_url.clone()),
                _ => None,
            },
            ContextScope::Data => data_value(ctx.record, &self.field),
        }
    }
}

/// Resolve a dotted path (`entities.0.handle`) to a scalar rendered as text.
fn data_value(record: &Value, path: &str) -> Option<String> {
    let mut current = record;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
