// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Regguard configuration system.

use regguard_config::diagnostic::ConfigError;
use regguard_config::model::{DnssecPolicy, RedactionAction};
use regguard_config::{load_and_validate_str, load_config_from_str};
use regguard_core::Protocol;

/// Valid TOML with all sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_regguard_config() {
    let toml = r#"
[pipeline]
max_concurrency = 8
queue_capacity = 16
fetch_timeout_ms = 5000

[resolver]
timeout_ms = 2000
ttl_ceiling_secs = 30
dnssec_policy = "require"
nameservers = ["9.9.9.9"]

[boundary]
allowed_protocols = ["https"]
denied_ranges = ["100.64.0.0/10"]

[boundary.rate_limit]
capacity = 10
window_secs = 60

[[boundary.certificate_pins]]
host = "rdap.example.net"
sha256 = ["0000000000000000000000000000000000000000000000000000000000000000"]

[[registries]]
name = "example-registry"
base_url = "https://rdap.example.net/rdap"
domain_suffixes = ["eu"]
ip_ranges = ["198.51.100.0/24"]
asn_ranges = ["64496-64511"]

[schema]
threat_threshold = 0.8

[redaction]
permissive_jurisdictions = ["US", "CA"]
hash_secret = "s3cret"

[[redaction.policies]]
id = "gdpr-policy"
jurisdictions = ["EU"]
legal_bases = ["legitimate-interest"]
priority = 100

[[redaction.policies.rules]]
field = "email"
action = "replace"
params = { replacement = "Please query the RDDS service of the Registrar of Record" }

[audit]
emergency_log_path = "/var/log/regguard/emergency.jsonl"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.pipeline.max_concurrency, 8);
    assert_eq!(config.pipeline.queue_capacity, 16);
    assert_eq!(config.resolver.ttl_ceiling_secs, 30);
    assert_eq!(config.resolver.dnssec_policy, DnssecPolicy::Require);
    assert_eq!(config.boundary.allowed_protocols, vec![Protocol::Https]);
    assert_eq!(config.boundary.rate_limit.capacity, 10);
    assert_eq!(config.boundary.certificate_pins.len(), 1);
    assert_eq!(config.registries[0].name, "example-registry");
    assert_eq!(config.schema.threat_threshold, 0.8);
    assert_eq!(config.redaction.permissive_jurisdictions, vec!["US", "CA"]);
    assert_eq!(config.redaction.policies[0].rules[0].action, RedactionAction::Replace);
    assert_eq!(
        config.audit.emergency_log_path.as_deref(),
        Some("/var/log/regguard/emergency.jsonl")
    );
}

/// Missing sections fall back to defaults.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.pipeline.max_concurrency, 64);
    assert_eq!(config.resolver.timeout_ms, 3000);
    assert_eq!(config.resolver.dnssec_policy, DnssecPolicy::Downgrade);
    assert!(config.audit.emergency_log_path.is_none());
}

/// Unknown field in [resolver] section produces an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[resolver]
ttl_celing_secs = 30
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "ttl_celing_secs"
                && suggestion.as_deref() == Some("ttl_ceiling_secs")
                && valid_keys.contains("dnssec_policy")
        })
    });
    assert!(
        has_unknown_key,
        "should suggest ttl_ceiling_secs, got: {errors:?}"
    );
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown section");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telemetry"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Invalid type (string where number expected) produces clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[pipeline]
max_concurrency = "lots"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("max_concurrency"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// Unknown enum variant for an action is rejected at load time.
#[test]
fn unknown_redaction_action_rejected() {
    let toml = r#"
[[redaction.policies]]
id = "p"
jurisdictions = ["EU"]

[[redaction.policies.rules]]
field = "email"
action = "shred"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_catches_ttl_ceiling_above_bound() {
    let toml = r#"
[resolver]
ttl_ceiling_secs = 3600
"#;

    let errors = load_and_validate_str(toml).expect_err("TTL above 60s should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("ttl_ceiling_secs"))
    });
    assert!(has_validation_error, "should flag ttl_ceiling_secs, got: {errors:?}");
}

/// ConfigError implements miette::Diagnostic (can be rendered).
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "max_concurency".to_string(),
        section: "pipeline".to_string(),
        suggestion: Some("max_concurrency".to_string()),
        valid_keys: "max_concurrency, queue_capacity".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `max_concurrency`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("max_concurency"));
}
