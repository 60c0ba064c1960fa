// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context-specific business rules.
//!
//! Rules see the parsed record and the registry it came from. Built-in rules
//! bound resource usage and check link hygiene; deployments can add their
//! own through [`BusinessRule`].

use std::net::IpAddr;

use regguard_config::model::SchemaConfig;
use regguard_core::{RegguardError, RegistryIdentity};
use regguard_security::is_private_ip;
use serde_json::Value;

use crate::Finding;

/// Score for links that leave the encrypted, public internet.
const UNSAFE_LINK_SCORE: f64 = 0.6;

/// A pluggable business-rule check.
pub trait BusinessRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return findings, or a hard error for records that must not proceed.
    fn evaluate(
        &self,
        record: &Value,
        registry: &RegistryIdentity,
    ) -> Result<Vec<Finding>, RegguardError>;
}

/// Nesting depth, entity count and string length limits.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    max_depth: usize,
    max_entities: usize,
    max_string_length: usize,
}

impl ResourceLimits {
    pub fn new(config: &SchemaConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_entities: config.max_entities,
            max_string_length: config.max_string_length,
        }
    }

    fn walk(&self, value: &Value, depth: usize, entities: &mut usize) -> Result<(), RegguardError> {
        if depth > self.max_depth {
            return Err(RegguardError::SchemaViolation {
                detail: format!("nesting deeper than {}", self.max_depth),
            });
        }
        match value {
            Value::String(s) if s.len() > self.max_string_length => {
                Err(RegguardError::SchemaViolation {
                    detail: format!("string longer than {} bytes", self.max_string_length),
                })
            }
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.walk(item, depth + 1, entities)),
            Value::Object(map) => {
                if let Some(list) = map.get("entities").and_then(Value::as_array) {
                    *entities += list.len();
                    if *entities > self.max_entities {
                        return Err(RegguardError::SchemaViolation {
                            detail: format!("more than {} entities", self.max_entities),
                        });
                    }
                }
                map.values()
                    .try_for_each(|item| self.walk(item, depth + 1, entities))
            }
            _ => Ok(()),
        }
    }
}

impl BusinessRule for ResourceLimits {
    fn name(&self) -> &'static str {
        "resource_limits"
    }

    fn evaluate(&self, record: &Value, _registry: &RegistryIdentity) -> Result<Vec<Finding>, RegguardError> {
        let mut entities = 0;
        self.walk(record, 0, &mut entities)?;
        Ok(Vec::new())
    }
}

/// Every `links[].href` must be https and must not point at a private
/// address literal.
#[derive(Debug, Clone, Default)]
pub struct LinkHygiene;

impl LinkHygiene {
    fn collect(value: &Value, path: &str, findings: &mut Vec<Finding>) {
        let Some(map) = value.as_object() else {
            if let Some(items) = value.as_array() {
                for (i, item) in items.iter().enumerate() {
                    Self::collect(item, &format!("{path}{i}."), findings);
                }
            }
            return;
        };
        if let Some(links) = map.get("links").and_then(Value::as_array) {
            for (i, link) in links.iter().enumerate() {
                let Some(href) = link.get("href").and_then(Value::as_str) else {
                    continue;
                };
                if let Some(reason) = unsafe_link(href) {
                    findings.push(Finding::new(
                        "business",
                        UNSAFE_LINK_SCORE,
                        format!("{path}links.{i}.href {reason}"),
                    ));
                }
            }
        }
        for (key, item) in map {
            if key != "links" {
                Self::collect(item, &format!("{path}{key}."), findings);
            }
        }
    }
}

fn unsafe_link(href: &str) -> Option<&'static str> {
    let Ok(url) = url::Url::parse(href) else {
        return Some("is not an absolute URL");
    };
    if url.scheme() != "https" {
        return Some("is not https");
    }
    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(ip) if is_private_ip(&ip) => Some("points at a private address"),
        _ if host.eq_ignore_ascii_case("localhost") => Some("points at localhost"),
        _ => None,
    }
}

impl BusinessRule for LinkHygiene {
    fn name(&self) -> &'static str {
        "link_hygiene"
    }

    fn evaluate(&self, record: &Value, _registry: &RegistryIdentity) -> Result<Vec<Finding>, RegguardError> {
        let mut findings = Vec::new();
        Self::collect(record, "", &mut findings);
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> RegistryIdentity {
        RegistryIdentity {
            name: "example".into(),
            base_url: "https://rdap.example.net".into(),
        }
    }

    #[test]
    fn depth_limit_is_enforced() {
        let limits = ResourceLimits::new(&SchemaConfig {
            max_depth: 3,
            ..SchemaConfig::default()
        });
        let shallow = json!({"a": {"b": 1}});
        assert!(limits.evaluate(&shallow, &registry()).is_ok());
        let deep = json!({"a": {"b": {"c": {"d": 1}}}});
        assert!(limits.evaluate(&deep, &registry()).is_err());
    }

    #[test]
    fn entity_count_includes_nested_entities() {
        let limits = ResourceLimits::new(&SchemaConfig {
            max_entities: 2,
            ..SchemaConfig::default()
        });
        let record = json!({"entities": [{"entities": [{}, {}]}]});
        assert!(limits.evaluate(&record, &registry()).is_err());
    }

    #[test]
    fn long_strings_are_rejected() {
        let limits = ResourceLimits::new(&SchemaConfig {
            max_string_length: 8,
            ..SchemaConfig::default()
        });
        assert!(limits.evaluate(&json!({"x": "123456789"}), &registry()).is_err());
    }

    #[test]
    fn unsafe_links_are_flagged() {
        let record = json!({
            "links": [
                {"href": "https://rdap.example.net/domain/example.eu"},
                {"href": "http://rdap.example.net/domain/example.eu"},
                {"href": "https://169.254.169.254/latest/meta-data"}
            ],
            "entities": [{"links": [{"href": "https://localhost/x"}]}]
        });
        let findings = LinkHygiene.evaluate(&record, &registry()).unwrap();
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(|f| f.score == UNSAFE_LINK_SCORE));
        assert!(findings.iter().any(|f| f.detail.starts_with("entities.0.links.0")));
    }
}
