// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled redaction policies.
//!
//! [`Policy::compile`] turns a [`PolicyConfig`] into an immutable value with
//! parsed locators, compiled regexes and checked action parameters. Policies
//! are data only; nothing here runs user-supplied code.

use regguard_config::model::{
    ActionParams, ExceptionConfig, ExceptionEffect, PartialPattern, PolicyConfig, RedactionAction,
    RuleConfig,
};

use crate::condition::{Condition, EvalContext};
use crate::locator::FieldLocator;

/// Errors raised while compiling or registering policies.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy id must not be empty")]
    EmptyId,

    #[error("policy `{0}` is already registered")]
    DuplicateId(String),

    #[error("policy `{policy}`: invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        policy: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("policy `{policy}`: {reason}")]
    InvalidLocator { policy: String, reason: String },

    #[error("policy `{policy}`: rule for `{field}` needs `{parameter}` for `{action:?}`")]
    MissingParameter {
        policy: String,
        field: String,
        action: RedactionAction,
        parameter: &'static str,
    },

    #[error("invalid PII field pattern `{pattern}`: {source}")]
    InvalidPiiPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// An action with its parameters checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub action: RedactionAction,
    pub params: ActionParams,
}

impl ActionSpec {
    fn compile(
        action: RedactionAction,
        params: &ActionParams,
        policy: &str,
        field: &str,
    ) -> Result<Self, PolicyError> {
        let missing = |parameter| PolicyError::MissingParameter {
            policy: policy.to_string(),
            field: field.to_string(),
            action,
            parameter,
        };
        match action {
            RedactionAction::Replace if params.replacement.is_none() => return Err(missing("replacement")),
            RedactionAction::Partial if params.pattern.is_none() => return Err(missing("pattern")),
            _ => {}
        }
        Ok(Self {
            action,
            params: params.clone(),
        })
    }

    pub fn mask_char(&self) -> char {
        self.params.mask_char.unwrap_or('*')
    }

    pub fn preserve_length(&self) -> bool {
        self.params.preserve_length.unwrap_or(true)
    }

    pub fn reversible(&self) -> bool {
        self.params.reversible.unwrap_or(false)
    }

    pub fn partial_pattern(&self) -> PartialPattern {
        self.params.pattern.unwrap_or(PartialPattern::Edges)
    }
}

/// What a matching exception does to its rule.
#[derive(Debug, Clone)]
pub enum ExceptionOutcome {
    Bypass,
    Modify(ActionSpec),
}

#[derive(Debug, Clone)]
pub struct Exception {
    when: Condition,
    outcome: ExceptionOutcome,
}

impl Exception {
    fn compile(config: &ExceptionConfig, rule: &RuleConfig, policy: &str) -> Result<Self, PolicyError> {
        let when = Condition::compile(&config.when, policy)?;
        let outcome = match config.effect {
            ExceptionEffect::Bypass => ExceptionOutcome::Bypass,
            ExceptionEffect::Modify => {
                let action = config.action.unwrap_or(rule.action);
                // Parameters the exception leaves out come from the rule.
                let params = ActionParams {
                    mask_char: config.params.mask_char.or(rule.params.mask_char),
                    preserve_length: config.params.preserve_length.or(rule.params.preserve_length),
                    replacement: config.params.replacement.clone().or_else(|| rule.params.replacement.clone()),
                    pattern: config.params.pattern.or(rule.params.pattern),
                    keep_first: config.params.keep_first.or(rule.params.keep_first),
                    keep_last: config.params.keep_last.or(rule.params.keep_last),
                    reversible: config.params.reversible.or(rule.params.reversible),
                };
                ExceptionOutcome::Modify(ActionSpec::compile(action, &params, policy, &rule.field)?)
            }
        };
        Ok(Self { when, outcome })
    }
}

/// A field rule with its own conditions and ordered exceptions.
#[derive(Debug, Clone)]
pub struct Rule {
    locator: FieldLocator,
    spec: ActionSpec,
    conditions: Vec<Condition>,
    exceptions: Vec<Exception>,
}

impl Rule {
    fn compile(config: &RuleConfig, policy: &str) -> Result<Self, PolicyError> {
        let locator = FieldLocator::parse(&config.field).map_err(|reason| PolicyError::InvalidLocator {
            policy: policy.to_string(),
            reason,
        })?;
        let spec = ActionSpec::compile(config.action, &config.params, policy, &config.field)?;
        let conditions = config
            .conditions
            .iter()
            .map(|c| Condition::compile(c, policy))
            .collect::<Result<Vec<_>, _>>()?;
        let exceptions = config
            .exceptions
            .iter()
            .map(|e| Exception::compile(e, config, policy))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            locator,
            spec,
            conditions,
            exceptions,
        })
    }

    pub fn locator(&self) -> &FieldLocator {
        &self.locator
    }

    pub fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    /// Whether the rule targets `path` and its own conditions hold.
    pub fn applies_to<S: AsRef<str>>(&self, path: &[S], ctx: &EvalContext<'_>) -> bool {
        self.locator.matches(path) && self.conditions.iter().all(|c| c.matches(ctx))
    }

    /// The first exception whose condition holds, in declared order.
    pub fn exception_for(&self, ctx: &EvalContext<'_>) -> Option<&ExceptionOutcome> {
        self.exceptions
            .iter()
            .find(|e| e.when.matches(ctx))
            .map(|e| &e.outcome)
    }
}

/// A compiled, immutable redaction policy.
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    jurisdictions: Vec<String>,
    legal_bases: Vec<String>,
    priority: i32,
    conditions: Vec<Condition>,
    rules: Vec<Rule>,
    /// Registration order, used to break priority ties.
    seq: u64,
}

impl Policy {
    pub fn compile(config: &PolicyConfig, seq: u64) -> Result<Self, PolicyError> {
        let id = config.id.trim();
        if id.is_empty() {
            return Err(PolicyError::EmptyId);
        }
        let conditions = config
            .conditions
            .iter()
            .map(|c| Condition::compile(c, id))
            .collect::<Result<Vec<_>, _>>()?;
        let rules = config
            .rules
            .iter()
            .map(|r| Rule::compile(r, id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: id.to_string(),
            jurisdictions: config.jurisdictions.iter().map(|j| j.trim().to_ascii_uppercase()).collect(),
            legal_bases: config.legal_bases.iter().map(|b| b.trim().to_ascii_lowercase()).collect(),
            priority: config.priority,
            conditions,
            rules,
            seq,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Jurisdiction scope, legal basis list and every condition must hold.
    ///
    /// An empty jurisdiction list matches any request; `*` matches any
    /// request that declares a jurisdiction.
    pub fn is_selected(&self, ctx: &EvalContext<'_>) -> bool {
        let jurisdiction_ok = self.jurisdictions.is_empty()
            || ctx.security.jurisdiction().is_some_and(|j| {
                self.jurisdictions.iter().any(|scope| scope == "*" || scope == j)
            });
        let basis_ok = self.legal_bases.is_empty()
            || ctx
                .security
                .legal_basis()
                .is_some_and(|b| self.legal_bases.iter().any(|l| l == b));
        jurisdiction_ok && basis_ok && self.conditions.iter().all(|c| c.matches(ctx))
    }
}
