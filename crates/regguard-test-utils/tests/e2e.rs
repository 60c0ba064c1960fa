// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete lookup pipeline.
//!
//! Each test builds an isolated TestHarness with mock DNS, a mock registry,
//! an in-memory audit sink and a temp emergency log. Tests are independent
//! and order-insensitive.

use std::time::Duration;

use regguard_audit::{verify_chain, GENESIS};
use regguard_config::model::{
    ActionParams, PartialPattern, PolicyConfig, RedactionAction, RuleConfig,
};
use regguard_core::{AuditCategory, AuditDecision, DnssecStatus, FailureCode};
use regguard_pipeline::{PipelineState, RedactionLevel};
use regguard_redaction::{is_hash_token, DecisionAction, FieldDecision, FAIL_SAFE_POLICY_ID};
use regguard_test_utils::{domain_record, TestHarness, CLIENT_ID, REGISTRY_ADDR, REGISTRY_NAME};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const RDDS_NOTICE: &str = "Please query the RDDS service of the Registrar of Record";

fn rule(field: &str, action: RedactionAction, params: ActionParams) -> RuleConfig {
    RuleConfig {
        field: field.into(),
        action,
        params,
        conditions: vec![],
        exceptions: vec![],
    }
}

fn policy(id: &str, priority: i32, rules: Vec<RuleConfig>) -> PolicyConfig {
    PolicyConfig {
        id: id.into(),
        jurisdictions: vec!["EU".into()],
        legal_bases: vec![],
        priority,
        conditions: vec![],
        rules,
    }
}

fn gdpr_policy() -> PolicyConfig {
    PolicyConfig {
        legal_bases: vec!["legitimate-interest".into()],
        ..policy(
            "gdpr-policy",
            100,
            vec![rule(
                "email",
                RedactionAction::Replace,
                ActionParams {
                    replacement: Some(RDDS_NOTICE.into()),
                    ..ActionParams::default()
                },
            )],
        )
    }
}

fn harness_with(policies: Vec<PolicyConfig>) -> TestHarness {
    TestHarness::builder().with_policies(policies).build().unwrap()
}

// ---- Boundary: private and mixed addresses ----

#[tokio::test]
async fn loopback_target_is_blocked_with_one_audit_event() {
    let harness = harness_with(vec![gdpr_policy()]);

    let report = harness
        .pipeline
        .process_with_report("127.0.0.1", harness.options())
        .await;
    let failure = report.outcome.as_ref().unwrap_err();
    assert_eq!(failure.code, FailureCode::PrivateAddressBlocked);
    assert!(!failure.retryable);
    assert_eq!(
        report.final_state(),
        PipelineState::Failed(FailureCode::PrivateAddressBlocked)
    );

    let events = harness.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].category, AuditCategory::Boundary);
    assert_eq!(events[0].decision, AuditDecision::Block);
    assert_eq!(events[0].request_id, report.request_id);
    assert!(harness.fetcher.requests().is_empty());
}

#[tokio::test]
async fn name_resolving_to_any_private_address_is_blocked() {
    let harness = harness_with(vec![]);
    let failure = harness
        .process("rebind.example.com", harness.options())
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::PrivateAddressBlocked);
    assert!(harness.fetcher.requests().is_empty());
}

#[tokio::test]
async fn fetch_is_pinned_to_the_authorized_registry_address() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve("domain/example.eu", &domain_record("example.eu", json!({})));

    harness.process("example.eu", harness.options()).await.unwrap();

    let requests = harness.fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://rdap.example.test/domain/example.eu");
    assert_eq!(requests[0].addresses, vec![REGISTRY_ADDR.parse::<std::net::IpAddr>().unwrap()]);
    assert_eq!(requests[0].port, 443);
}

// ---- Redaction through the full pipeline ----

#[tokio::test]
async fn gdpr_email_is_replaced_with_notice() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu"})),
    );

    let options = harness
        .options()
        .jurisdiction("EU")
        .legal_basis("legitimate-interest");
    let record = harness.process("example.eu", options).await.unwrap();

    assert_eq!(record.record["email"], json!(RDDS_NOTICE));
    assert_eq!(record.record["ldhName"], json!("example.eu"));
    assert_eq!(
        record.decisions,
        vec![FieldDecision {
            field: "email".into(),
            action: DecisionAction::Replace,
            policy_id: "gdpr-policy".into(),
            value: None,
        }]
    );

    let meta = &record.compliance;
    assert_eq!(meta.registry, REGISTRY_NAME);
    assert_eq!(meta.jurisdiction.as_deref(), Some("EU"));
    assert_eq!(meta.legal_basis.as_deref(), Some("legitimate-interest"));
    assert_eq!(meta.retention_days, 180);
    assert_eq!(meta.redaction_level, RedactionLevel::Partial);
    assert_eq!(meta.policies_applied, vec!["gdpr-policy".to_string()]);
    assert_eq!(meta.redacted_fields, 1);
    assert_eq!(meta.dnssec, DnssecStatus::Secure);
    assert!(!meta.content_hash.is_empty());

    let events = harness.audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].category, AuditCategory::Boundary);
    assert_eq!(events[0].decision, AuditDecision::Allow);
    assert_eq!(events[1].category, AuditCategory::Pipeline);
    assert_eq!(events[1].decision, AuditDecision::Redact);
}

#[tokio::test]
async fn us_request_without_policy_passes_through() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve(
        "domain/example.com",
        &domain_record("example.com", json!({"email": "user@example.com"})),
    );

    let options = harness
        .options()
        .jurisdiction("US")
        .legal_basis("legitimate-interest");
    let record = harness.process("example.com", options).await.unwrap();

    assert_eq!(record.record["email"], json!("user@example.com"));
    assert!(record.decisions.is_empty());
    assert_eq!(record.compliance.redaction_level, RedactionLevel::None);
    assert_eq!(harness.audit.events()[1].decision, AuditDecision::Allow);
}

#[tokio::test]
async fn phone_is_partially_masked() {
    let phone_policy = policy(
        "phone-policy",
        10,
        vec![rule(
            "phone",
            RedactionAction::Partial,
            ActionParams {
                pattern: Some(PartialPattern::Phone),
                ..ActionParams::default()
            },
        )],
    );
    let harness = harness_with(vec![phone_policy]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"phone": "+1.5555551234"})),
    );

    let options = harness.options().jurisdiction("EU").legal_basis("contract");
    let record = harness.process("example.eu", options).await.unwrap();

    assert_eq!(record.record["phone"], json!("+1.******1234"));
    assert_eq!(record.decisions[0].action, DecisionAction::Partial);
    assert_eq!(record.compliance.retention_days, 730);
}

#[tokio::test]
async fn higher_priority_hash_beats_lower_priority_remove() {
    let hash = policy("a", 100, vec![rule("email", RedactionAction::Hash, ActionParams::default())]);
    let remove = policy("b", 50, vec![rule("email", RedactionAction::Remove, ActionParams::default())]);
    let harness = harness_with(vec![remove, hash]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu"})),
    );

    let options = harness.options().jurisdiction("EU").legal_basis("consent");
    let record = harness.process("example.eu", options).await.unwrap();

    let email = record.record["email"].as_str().unwrap();
    assert!(is_hash_token(email), "{email}");
    assert_eq!(record.decisions[0].policy_id, "a");
    assert_eq!(record.decisions[0].action, DecisionAction::Hash);
}

#[tokio::test]
async fn identical_requests_produce_identical_records() {
    let hash = policy("a", 100, vec![rule("email", RedactionAction::Hash, ActionParams::default())]);
    let harness = harness_with(vec![hash]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu", "phone": "+1.5555551234"})),
    );

    let options = || harness.options().jurisdiction("EU").legal_basis("consent");
    let first = harness.process("example.eu", options()).await.unwrap();
    let second = harness.process("example.eu", options()).await.unwrap();

    assert_eq!(first.record, second.record);
    assert_eq!(first.decisions, second.decisions);
    assert_eq!(first.compliance.content_hash, second.compliance.content_hash);
}

#[tokio::test]
async fn unmatched_pii_is_removed_without_jurisdiction() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu", "handle": "D1"})),
    );

    let record = harness.process("example.eu", harness.options()).await.unwrap();

    assert!(record.record.get("email").is_none());
    assert_eq!(record.record["handle"], json!("D1"));
    assert_eq!(record.decisions[0].policy_id, FAIL_SAFE_POLICY_ID);
    assert_eq!(record.compliance.redaction_level, RedactionLevel::Full);
    assert_eq!(record.compliance.retention_days, 30);
}

#[tokio::test]
async fn policies_registered_at_runtime_apply_to_new_requests() {
    let harness = harness_with(vec![]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu"})),
    );
    let options = || {
        harness
            .options()
            .jurisdiction("EU")
            .legal_basis("legitimate-interest")
    };

    let before = harness.process("example.eu", options()).await.unwrap();
    assert_eq!(before.decisions[0].policy_id, FAIL_SAFE_POLICY_ID);

    harness
        .pipeline
        .redaction()
        .policies()
        .register(&gdpr_policy())
        .unwrap();

    let after = harness.process("example.eu", options()).await.unwrap();
    assert_eq!(after.record["email"], json!(RDDS_NOTICE));
    assert!(after.compliance.policy_version > before.compliance.policy_version);
}

// ---- Failures from the registry ----

#[tokio::test]
async fn malformed_registry_record_is_a_schema_violation() {
    let harness = harness_with(vec![]);
    harness.serve("domain/example.eu", &json!({"objectClassName": "domain"}));

    let report = harness
        .pipeline
        .process_with_report("example.eu", harness.options())
        .await;
    assert_eq!(
        report.outcome.unwrap_err().code,
        FailureCode::SchemaViolation
    );

    let events = harness.audit.events();
    let last = events.last().unwrap();
    assert_eq!(last.category, AuditCategory::SchemaValidation);
    assert_eq!(last.decision, AuditDecision::Block);
}

#[tokio::test]
async fn unknown_record_is_a_fetch_failure() {
    let harness = harness_with(vec![]);
    let failure = harness
        .process("example.eu", harness.options())
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::FetchFailed);
}

#[tokio::test]
async fn invalid_target_never_reaches_dns() {
    let harness = harness_with(vec![]);
    let lookups = harness.dns.lookups();
    let failure = harness
        .process("exa mple.eu", harness.options())
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::InvalidTargetFormat);
    assert_eq!(harness.dns.lookups(), lookups);
}

// ---- Rate limiting and admission ----

#[tokio::test(start_paused = true)]
async fn request_over_rate_limit_is_rejected() {
    let harness = harness_with(vec![]);
    harness.serve("domain/example.com", &domain_record("example.com", json!({})));
    let options = || harness.options().jurisdiction("US");

    for _ in 0..100 {
        harness.process("example.com", options()).await.unwrap();
    }
    let failure = harness.process("example.com", options()).await.unwrap_err();

    assert_eq!(failure.code, FailureCode::RateLimited);
    assert!(failure.retryable);
    assert!(failure.retry_after_secs.is_some_and(|secs| secs > 0.0));

    let events = harness.audit.events();
    let last = events.last().unwrap();
    assert_eq!(last.category, AuditCategory::Boundary);
    assert_eq!(last.decision, AuditDecision::Block);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_is_per_client() {
    let harness = TestHarness::builder().with_rate_limit(1, 3600).build().unwrap();
    harness.serve("domain/example.com", &domain_record("example.com", json!({})));

    harness
        .process("example.com", harness.options().jurisdiction("US"))
        .await
        .unwrap();
    let other = regguard_pipeline::ProcessOptions::new("client-b")
        .jurisdiction("US")
        .request_day(regguard_test_utils::request_day());
    harness.process("example.com", other).await.unwrap();

    let failure = harness
        .process("example.com", harness.options().jurisdiction("US"))
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::RateLimited);
}

#[tokio::test(start_paused = true)]
async fn request_beyond_queue_capacity_is_overloaded() {
    let harness = TestHarness::builder().with_concurrency(1, 0).build().unwrap();
    harness.serve("domain/example.com", &domain_record("example.com", json!({})));
    harness.fetcher.set_delay(Some(Duration::from_secs(5)));

    let pipeline = harness.pipeline.clone();
    let options = harness.options().jurisdiction("US");
    let first = tokio::spawn(async move { pipeline.process("example.com", options).await });
    harness.fetcher.wait_started().await;

    let failure = harness
        .process("example.com", harness.options().jurisdiction("US"))
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::Overloaded);
    assert!(failure.retryable);

    assert!(first.await.unwrap().is_ok());
}

// ---- Cancellation ----

#[tokio::test(start_paused = true)]
async fn cancellation_mid_fetch_refunds_the_rate_limit_token() {
    let harness = TestHarness::builder()
        .with_rate_limit(1, 3600)
        .configure(|config| config.pipeline.fetch_timeout_ms = 60_000)
        .build()
        .unwrap();
    harness.serve("domain/example.com", &domain_record("example.com", json!({})));
    harness.fetcher.set_delay(Some(Duration::from_secs(30)));

    let cancel = CancellationToken::new();
    let pipeline = harness.pipeline.clone();
    let options = harness.options().jurisdiction("US").cancel_token(cancel.clone());
    let run = tokio::spawn(async move { pipeline.process_with_report("example.com", options).await });

    harness.fetcher.wait_started().await;
    cancel.cancel();
    let report = run.await.unwrap();

    assert_eq!(report.final_state(), PipelineState::Cancelled);
    assert!(report.states.contains(&PipelineState::Fetching));
    assert_eq!(report.outcome.unwrap_err().code, FailureCode::Cancelled);

    let events = harness.audit.events();
    let last = events.last().unwrap();
    assert_eq!(last.category, AuditCategory::Pipeline);
    assert_eq!(last.decision, AuditDecision::Cancel);

    // The single token came back, so the next request is admitted.
    harness.fetcher.set_delay(None);
    harness
        .process("example.com", harness.options().jurisdiction("US"))
        .await
        .unwrap();
}

#[tokio::test]
async fn request_cancelled_before_start_does_no_work() {
    let harness = harness_with(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = harness
        .pipeline
        .process_with_report("example.com", harness.options().cancel_token(cancel))
        .await;

    assert_eq!(report.final_state(), PipelineState::Cancelled);
    assert_eq!(harness.dns.lookups(), 0);
    assert!(harness.fetcher.requests().is_empty());
}

// ---- Audit ----

#[tokio::test]
async fn audit_events_form_a_verifiable_chain() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu"})),
    );

    let options = || {
        harness
            .options()
            .jurisdiction("EU")
            .legal_basis("legitimate-interest")
    };
    harness.process("example.eu", options()).await.unwrap();
    harness.process("127.0.0.1", options()).await.unwrap_err();
    harness.process("example.eu", options()).await.unwrap();

    let events = harness.audit.events();
    assert_eq!(events.len(), 5);
    let key = harness.pipeline.audit().verification_key();
    verify_chain(key, GENESIS, &events).unwrap();

    let mut tampered = events.clone();
    tampered[1].reason = "nothing to see".into();
    assert!(verify_chain(key, GENESIS, &tampered).is_err());
}

#[tokio::test]
async fn audit_sink_failure_diverts_to_emergency_log() {
    let harness = harness_with(vec![gdpr_policy()]);
    harness.serve(
        "domain/example.eu",
        &domain_record("example.eu", json!({"email": "user@example.eu"})),
    );
    harness.audit.set_failing(true);

    let options = harness
        .options()
        .jurisdiction("EU")
        .legal_basis("legitimate-interest");
    let record = harness.process("example.eu", options).await.unwrap();
    assert_eq!(record.record["email"], json!(RDDS_NOTICE));

    assert!(harness.audit.events().is_empty());
    let entries = harness.emergency_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["event"]["category"], json!("boundary"));
    assert_eq!(entries[1]["event"]["decision"], json!("redact"));
    assert!(entries.iter().all(|e| e["sink_error"].is_string()));
}

#[tokio::test]
async fn client_identity_reaches_the_rate_limiter_not_the_record() {
    let harness = harness_with(vec![]);
    harness.serve("domain/example.com", &domain_record("example.com", json!({})));
    let record = harness
        .process("example.com", harness.options().jurisdiction("US"))
        .await
        .unwrap();
    assert!(!record.record.to_string().contains(CLIENT_ID));
}
