// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The combined schema and threat validator.

use regguard_config::model::SchemaConfig;
use regguard_core::{RawRecord, RegguardError, RegistryIdentity};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::business::{BusinessRule, LinkHygiene, ResourceLimits};
use crate::{schema, semantic, threat, Finding};

/// Content types accepted for registry bodies.
const JSON_CONTENT_TYPES: &[&str] = &["application/rdap+json", "application/json"];

/// A registry record that passed every validation layer.
///
/// Only [`SchemaThreatValidator::validate`] constructs one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    record: Value,
    registry: RegistryIdentity,
    threat_score: f64,
    content_hash: String,
}

impl ValidatedRecord {
    pub fn record(&self) -> &Value {
        &self.record
    }

    pub fn registry(&self) -> &RegistryIdentity {
        &self.registry
    }

    /// Aggregate score across layers, below the blocking threshold.
    pub fn threat_score(&self) -> f64 {
        self.threat_score
    }

    /// Hex SHA-256 of the canonical (key-sorted) JSON serialization.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

/// Runs the structural, semantic, pattern and business-rule layers.
pub struct SchemaThreatValidator {
    threshold: f64,
    rules: Vec<Box<dyn BusinessRule>>,
}

impl std::fmt::Debug for SchemaThreatValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaThreatValidator")
            .field("threshold", &self.threshold)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaThreatValidator {
    pub fn new(config: &SchemaConfig) -> Self {
        Self {
            threshold: config.threat_threshold,
            rules: vec![Box::new(ResourceLimits::new(config)), Box::new(LinkHygiene)],
        }
    }

    /// Add a deployment-specific business rule.
    pub fn with_rule(mut self, rule: Box<dyn BusinessRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn validate(
        &self,
        raw: &RawRecord,
        registry: &RegistryIdentity,
    ) -> Result<ValidatedRecord, RegguardError> {
        if let Some(content_type) = &raw.content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !JSON_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(RegguardError::SchemaViolation {
                    detail: format!("unexpected content type `{essence}`"),
                });
            }
        }

        let record: Value =
            serde_json::from_slice(&raw.body).map_err(|e| RegguardError::SchemaViolation {
                detail: format!("body is not valid JSON: {e}"),
            })?;

        // Resource limits first: they bound the cost of every later layer.
        let mut findings: Vec<Finding> = Vec::new();
        for rule in &self.rules {
            findings.extend(rule.evaluate(&record, registry)?);
        }
        schema::check_structure(&record)?;
        findings.extend(semantic::inspect(&record)?);
        findings.extend(threat::scan(&record));

        let worst = findings.iter().max_by(|a, b| a.score.total_cmp(&b.score));
        let threat_score = worst.map_or(0.0, |f| f.score);

        if let Some(worst) = worst {
            if threat_score >= self.threshold {
                warn!(
                    registry = %registry.name,
                    layer = worst.layer,
                    score = threat_score,
                    "record blocked by threat score"
                );
                return Err(RegguardError::ThreatPatternDetected {
                    score: threat_score,
                    detail: worst.detail.clone(),
                });
            }
            debug!(
                registry = %registry.name,
                findings = findings.len(),
                score = threat_score,
                "record passed with findings"
            );
        }

        let canonical = serde_json::to_vec(&record).map_err(|e| {
            RegguardError::Internal(format!("cannot serialize validated record: {e}"))
        })?;
        let content_hash = hex::encode(Sha256::digest(&canonical));

        Ok(ValidatedRecord {
            record,
            registry: registry.clone(),
            threat_score,
            content_hash,
        })
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

    fn raw(value: Value) -> RawRecord {
        RawRecord {
            body: serde_json::to_vec(&value).unwrap(),
            content_type: Some("application/rdap+json; charset=utf-8".into()),
        }
    }

    fn validator() -> SchemaThreatValidator {
        SchemaThreatValidator::new(&SchemaConfig::default())
    }

    #[test]
    fn clean_record_scores_zero() {
        let record = validator()
            .validate(&raw(json!({"objectClassName": "domain", "ldhName": "example.eu"})), &registry())
            .unwrap();
        assert_eq!(record.threat_score(), 0.0);
        assert_eq!(record.content_hash().len(), 64);
        assert_eq!(record.registry().name, "example");
    }

    #[test]
    fn sub_threshold_findings_pass_with_score() {
        let value = json!({
            "objectClassName": "domain",
            "ldhName": "example.eu",
            "status": ["active", "inactive"]
        });
        let record = validator().validate(&raw(value), &registry()).unwrap();
        assert!((record.threat_score() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn script_tag_is_blocked() {
        let value = json!({
            "objectClassName": "domain",
            "ldhName": "example.eu",
            "remarks": [{"description": ["<script>alert(1)</script>"]}]
        });
        let err = validator().validate(&raw(value), &registry()).unwrap_err();
        assert!(matches!(err, RegguardError::ThreatPatternDetected { score, .. } if score >= 0.9));
    }

    #[test]
    fn invalid_json_is_schema_violation() {
        let raw = RawRecord {
            body: b"{not json".to_vec(),
            content_type: None,
        };
        let err = validator().validate(&raw, &registry()).unwrap_err();
        assert!(matches!(err, RegguardError::SchemaViolation { .. }));
    }

    #[test]
    fn html_content_type_is_rejected() {
        let raw = RawRecord {
            body: b"{}".to_vec(),
            content_type: Some("text/html".into()),
        };
        assert!(matches!(
            validator().validate(&raw, &registry()),
            Err(RegguardError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn custom_rule_can_block() {
        struct RequireHandle;
        impl BusinessRule for RequireHandle {
            fn name(&self) -> &'static str {
                "require_handle"
            }
            fn evaluate(&self, record: &Value, _r: &RegistryIdentity) -> Result<Vec<Finding>, RegguardError> {
                if record.get("handle").is_none() {
                    return Ok(vec![Finding::new("business", 1.0, "missing handle")]);
                }
                Ok(vec![])
            }
        }
        let validator = validator().with_rule(Box::new(RequireHandle));
        let value = json!({"objectClassName": "domain", "ldhName": "example.eu"});
        assert!(validator.validate(&raw(value), &registry()).is_err());
    }

    #[test]
    fn content_hash_ignores_key_order() {
        let a = RawRecord {
            body: br#"{"objectClassName":"domain","ldhName":"example.eu"}"#.to_vec(),
            content_type: None,
        };
        let b = RawRecord {
            body: br#"{"ldhName":"example.eu","objectClassName":"domain"}"#.to_vec(),
            content_type: None,
        };
        let v = validator();
        assert_eq!(
            v.validate(&a, &registry()).unwrap().content_hash(),
            v.validate(&b, &registry()).unwrap().content_hash()
        );
    }
}
