// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles a [`Pipeline`] from configuration and injected collaborators.

use std::sync::Arc;
use std::time::Duration;

use regguard_audit::AuditEmitter;
use regguard_config::model::RegguardConfig;
use regguard_config::validation::validate_config;
use regguard_core::{AuditSink, DnsBackend, GeoLocator, RegguardError, RegistryFetcher};
use regguard_redaction::{PolicyRegistry, RedactionEngine};
use regguard_resolver::{HickoryBackend, SecureResolver};
use regguard_security::{BoundaryGuard, GeoFence, HomographDetector, TargetValidator};
use regguard_validate::{BusinessRule, SchemaThreatValidator};
use tracing::info;

use crate::admission::Admission;
use crate::compose::ComplianceComposer;
use crate::endpoint::RegistryDirectory;
use crate::fetch::HttpsFetcher;
use crate::pipeline::Pipeline;

/// Builder for [`Pipeline`].
///
/// The audit sink is required. DNS defaults to hickory and fetching to the
/// pinned HTTPS fetcher.
pub struct PipelineBuilder {
    config: RegguardConfig,
    dns: Option<Arc<dyn DnsBackend>>,
    fetcher: Option<Arc<dyn RegistryFetcher>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    geo_locator: Option<Arc<dyn GeoLocator>>,
    homograph: Option<Arc<dyn HomographDetector>>,
    policies: Option<Arc<PolicyRegistry>>,
    rules: Vec<Box<dyn BusinessRule>>,
}

impl PipelineBuilder {
    pub fn new(config: RegguardConfig) -> Self {
        Self {
            config,
            dns: None,
            fetcher: None,
            audit_sink: None,
            geo_locator: None,
            homograph: None,
            policies: None,
            rules: Vec::new(),
        }
    }

    pub fn dns_backend(mut self, backend: Arc<dyn DnsBackend>) -> Self {
        self.dns = Some(backend);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn RegistryFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Geo-locate addresses with an external database instead of the
    /// configured static ranges.
    pub fn geo_locator(mut self, locator: Arc<dyn GeoLocator>) -> Self {
        self.geo_locator = Some(locator);
        self
    }

    pub fn homograph_detector(mut self, detector: Arc<dyn HomographDetector>) -> Self {
        self.homograph = Some(detector);
        self
    }

    /// Share a policy registry (e.g. with a reload task) instead of seeding
    /// one from `redaction.policies`.
    pub fn policy_registry(mut self, registry: Arc<PolicyRegistry>) -> Self {
        self.policies = Some(registry);
        self
    }

    pub fn business_rule(mut self, rule: Box<dyn BusinessRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> Result<Pipeline, RegguardError> {
        let config = self.config;
        validate_config(&config).map_err(|errors| {
            RegguardError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let sink = self
            .audit_sink
            .ok_or_else(|| RegguardError::Config("an audit sink is required".to_string()))?;

        let dns = match self.dns {
            Some(dns) => dns,
            None => Arc::new(HickoryBackend::from_config(&config.resolver)?),
        };
        let fetcher = self.fetcher.unwrap_or_else(|| Arc::new(HttpsFetcher::new()));

        let mut validator = TargetValidator::new(&config.validator);
        if let Some(detector) = self.homograph {
            validator = validator.with_detector(detector);
        }

        let mut guard = BoundaryGuard::new(&config.boundary);
        if let Some(locator) = self.geo_locator {
            guard = guard.with_geo_fence(GeoFence::with_locator(&config.boundary.geo_fence, locator));
        }

        let mut schema = SchemaThreatValidator::new(&config.schema);
        for rule in self.rules {
            schema = schema.with_rule(rule);
        }

        let redaction = match self.policies {
            Some(registry) => RedactionEngine::with_registry(&config.redaction, registry)?,
            None => RedactionEngine::from_config(&config.redaction)?,
        };

        let pipeline = Pipeline {
            validator,
            resolver: SecureResolver::new(&config.resolver, dns),
            guard,
            directory: RegistryDirectory::from_config(&config.registries)?,
            fetcher,
            schema,
            redaction,
            composer: ComplianceComposer::new(&config.redaction),
            audit: AuditEmitter::new(sink, &config.audit),
            admission: Admission::new(config.pipeline.max_concurrency, config.pipeline.queue_capacity),
            fetch_timeout: Duration::from_millis(config.pipeline.fetch_timeout_ms),
            max_response_bytes: config.pipeline.max_response_bytes,
        };
        info!(
            registries = pipeline.directory.len(),
            max_concurrency = config.pipeline.max_concurrency,
            queue_capacity = config.pipeline.queue_capacity,
            policies = pipeline.redaction.policies().snapshot().len(),
            "pipeline ready"
        );
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regguard_audit::MemoryAuditSink;
    use regguard_config::model::RegistryConfig;

    #[test]
    fn audit_sink_is_required() {
        let err = PipelineBuilder::new(RegguardConfig::default())
            .fetcher(Arc::new(HttpsFetcher::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegguardError::Config(msg) if msg.contains("audit sink")));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = RegguardConfig::default();
        config.registries.push(RegistryConfig {
            name: "plain".into(),
            base_url: "http://rdap.example.test".into(),
            domain_suffixes: vec!["test".into()],
            ip_ranges: Vec::new(),
            asn_ranges: Vec::new(),
        });
        let err = PipelineBuilder::new(config)
            .audit_sink(Arc::new(MemoryAuditSink::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegguardError::Config(msg) if msg.contains("allowed_protocols")));
    }
}
