// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! `TestHarness` assembles a full pipeline around mock DNS, a mock registry
//! fetcher and an in-memory audit sink, with the emergency audit log in a
//! temp directory. One registry, `rdap.example.test`, serves every target.

use std::sync::Arc;

use chrono::NaiveDate;
use regguard_audit::MemoryAuditSink;
use regguard_config::model::{PolicyConfig, RegguardConfig, RegistryConfig};
use regguard_core::{ClassifiedFailure, RegguardError};
use regguard_pipeline::{FinalRecord, Pipeline, PipelineBuilder, ProcessOptions};
use serde_json::{json, Value};

use crate::mock_dns::MockDns;
use crate::mock_fetcher::{json_response, MockFetcher};

pub const REGISTRY_NAME: &str = "example-registry";
pub const REGISTRY_URL: &str = "https://rdap.example.test";
pub const REGISTRY_HOST: &str = "rdap.example.test";
pub const REGISTRY_ADDR: &str = "198.51.100.10";
pub const CLIENT_ID: &str = "client-a";

/// Fixed day bucket so hashed output is reproducible.
pub fn request_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default()
}

/// A minimal RDAP domain object with extra top-level members.
pub fn domain_record(name: &str, extra: Value) -> Value {
    let mut record = json!({
        "objectClassName": "domain",
        "ldhName": name,
        "status": ["active"],
    });
    if let (Some(base), Some(extra)) = (record.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    record
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: RegguardConfig,
    dns: MockDns,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = RegguardConfig::default();
        config.registries = vec![RegistryConfig {
            name: REGISTRY_NAME.to_string(),
            base_url: REGISTRY_URL.to_string(),
            domain_suffixes: ["eu", "com", "net", "org"].iter().map(|s| s.to_string()).collect(),
            ip_ranges: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
            asn_ranges: vec!["1-4294967295".to_string()],
        }];
        config.redaction.hash_secret = Some("harness-secret".to_string());
        config.audit.signing_key = Some("harness-audit-key".to_string());

        let dns = MockDns::new()
            .with_host(REGISTRY_HOST, &[REGISTRY_ADDR])
            .with_host("example.eu", &["203.0.113.20"])
            .with_host("example.com", &["203.0.113.21"])
            .with_host("rebind.example.com", &["203.0.113.30", "10.0.0.5"]);

        Self { config, dns }
    }

    pub fn with_policies(mut self, policies: Vec<PolicyConfig>) -> Self {
        self.config.redaction.policies = policies;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize, queue_capacity: usize) -> Self {
        self.config.pipeline.max_concurrency = max_concurrency;
        self.config.pipeline.queue_capacity = queue_capacity;
        self
    }

    pub fn with_rate_limit(mut self, capacity: u32, window_secs: u64) -> Self {
        self.config.boundary.rate_limit.capacity = capacity;
        self.config.boundary.rate_limit.window_secs = window_secs;
        self
    }

    /// Arbitrary config edits.
    pub fn configure(mut self, edit: impl FnOnce(&mut RegguardConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn with_dns_host(mut self, name: &str, addresses: &[&str]) -> Self {
        self.dns = self.dns.with_host(name, addresses);
        self
    }

    pub fn build(self) -> Result<TestHarness, RegguardError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| RegguardError::Internal(format!("cannot create temp dir: {e}")))?;
        let emergency_log = temp_dir.path().join("emergency.jsonl");

        let mut config = self.config;
        config.audit.emergency_log_path = Some(emergency_log.display().to_string());

        let dns = Arc::new(self.dns);
        let fetcher = Arc::new(MockFetcher::new());
        let audit = Arc::new(MemoryAuditSink::new());

        let pipeline = PipelineBuilder::new(config.clone())
            .dns_backend(dns.clone())
            .fetcher(fetcher.clone())
            .audit_sink(audit.clone())
            .build()?;

        Ok(TestHarness {
            pipeline: Arc::new(pipeline),
            dns,
            fetcher,
            audit,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline over mock collaborators.
pub struct TestHarness {
    pub pipeline: Arc<Pipeline>,
    pub dns: Arc<MockDns>,
    pub fetcher: Arc<MockFetcher>,
    pub audit: Arc<MemoryAuditSink>,
    pub config: RegguardConfig,
    /// Kept alive so the emergency log survives until drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Serve `record` for the lookup path (`domain/example.eu`, `ip/…`).
    pub fn serve(&self, lookup_path: &str, record: &Value) {
        self.fetcher
            .set_response(format!("{REGISTRY_URL}/{lookup_path}"), json_response(record));
    }

    /// Default options for [`CLIENT_ID`] on the fixed [`request_day`].
    pub fn options(&self) -> ProcessOptions {
        ProcessOptions::new(CLIENT_ID).request_day(request_day())
    }

    pub async fn process(&self, target: &str, options: ProcessOptions) -> Result<FinalRecord, ClassifiedFailure> {
        self.pipeline.process(target, options).await
    }

    /// Parsed entries of the emergency audit log, oldest first.
    pub fn emergency_entries(&self) -> Vec<Value> {
        let path = self._temp_dir.path().join("emergency.jsonl");
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}
