// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `process` entry point.
//!
//! One run per target, stages strictly in order:
//! validate, resolve (target, endpoint, registry host), authorize, fetch,
//! schema and threat check, redact, compose. Every run ends with exactly
//! one terminal audit event.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use regguard_audit::AuditEmitter;
use regguard_core::{
    AuditCategory, AuditDecision, ClassifiedFailure, DnssecStatus, FetchRequest, RawRecord,
    RegguardError, RegistryFetcher, ResolutionResult, SecurityContext, SecurityLevel,
};
use regguard_redaction::{PolicySnapshot, RedactionEngine};
use regguard_resolver::SecureResolver;
use regguard_security::{BoundaryGuard, TargetValidator};
use regguard_validate::SchemaThreatValidator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admission::Admission;
use crate::compose::{ComplianceComposer, FinalRecord};
use crate::endpoint::RegistryDirectory;
use crate::state::{PipelineState, StateMachine};

/// Caller-supplied request parameters.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub client_id: String,
    pub tenant: Option<String>,
    pub jurisdiction: Option<String>,
    pub legal_basis: Option<String>,
    pub security_level: SecurityLevel,
    /// Day bucket for salted hashing. Defaults to today (UTC).
    pub request_day: Option<NaiveDate>,
    pub cancel: CancellationToken,
}

impl ProcessOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant: None,
            jurisdiction: None,
            legal_basis: None,
            security_level: SecurityLevel::Standard,
            request_day: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn legal_basis(mut self, legal_basis: impl Into<String>) -> Self {
        self.legal_basis = Some(legal_basis.into());
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn request_day(mut self, day: NaiveDate) -> Self {
        self.request_day = Some(day);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn into_context(self, request_id: &str) -> SecurityContext {
        let mut builder = SecurityContext::builder(request_id, self.client_id)
            .security_level(self.security_level)
            .request_day(self.request_day.unwrap_or_else(|| Utc::now().date_naive()));
        if let Some(tenant) = self.tenant {
            builder = builder.tenant(tenant);
        }
        if let Some(jurisdiction) = self.jurisdiction {
            builder = builder.jurisdiction(jurisdiction);
        }
        if let Some(basis) = self.legal_basis {
            builder = builder.legal_basis(basis);
        }
        builder.build()
    }
}

/// The outcome of one run plus the states it passed through.
#[derive(Debug)]
pub struct PipelineReport {
    pub request_id: String,
    pub states: Vec<PipelineState>,
    pub outcome: Result<FinalRecord, ClassifiedFailure>,
}

impl PipelineReport {
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Validating)
    }
}

/// Why a run stopped early.
enum Stop {
    Failed(RegguardError),
    Cancelled,
}

impl From<RegguardError> for Stop {
    fn from(err: RegguardError) -> Self {
        Stop::Failed(err)
    }
}

/// The assembled pipeline. Build one with [`crate::PipelineBuilder`].
pub struct Pipeline {
    pub(crate) validator: TargetValidator,
    pub(crate) resolver: SecureResolver,
    pub(crate) guard: BoundaryGuard,
    pub(crate) directory: RegistryDirectory,
    pub(crate) fetcher: Arc<dyn RegistryFetcher>,
    pub(crate) schema: SchemaThreatValidator,
    pub(crate) redaction: RedactionEngine,
    pub(crate) composer: ComplianceComposer,
    pub(crate) audit: AuditEmitter,
    pub(crate) admission: Admission,
    pub(crate) fetch_timeout: Duration,
    pub(crate) max_response_bytes: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetcher", &self.fetcher.name())
            .field("registries", &self.directory.len())
            .field("fetch_timeout", &self.fetch_timeout)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Policy registry, for hot reload. Runs already in flight keep the
    /// snapshot they started with.
    pub fn redaction(&self) -> &RedactionEngine {
        &self.redaction
    }

    pub fn audit(&self) -> &AuditEmitter {
        &self.audit
    }

    pub fn guard(&self) -> &BoundaryGuard {
        &self.guard
    }

    pub fn resolver(&self) -> &SecureResolver {
        &self.resolver
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Look up `raw_target` and return the redacted, annotated record.
    pub async fn process(
        &self,
        raw_target: &str,
        options: ProcessOptions,
    ) -> Result<FinalRecord, ClassifiedFailure> {
        self.process_with_report(raw_target, options).await.outcome
    }

    /// Like [`Pipeline::process`], also returning the visited states.
    pub async fn process_with_report(&self, raw_target: &str, options: ProcessOptions) -> PipelineReport {
        let request_id = uuid::Uuid::new_v4().to_string();
        let cancel = options.cancel.clone();
        let mut ctx = options.into_context(&request_id);
        let mut machine = StateMachine::new(&request_id);
        debug!(request_id = %request_id, client = ctx.client_id(), "pipeline started");

        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return self.cancelled(machine, &ctx).await,
            admitted = self.admission.admit() => match admitted {
                Ok(permit) => permit,
                Err(err) => return self.failed(machine, &ctx, err).await,
            },
        };

        let snapshot = self.redaction.policies().snapshot();
        match self.run(&mut machine, &mut ctx, raw_target, &snapshot, &cancel).await {
            Ok(record) => self.completed(machine, &ctx, record).await,
            Err(Stop::Cancelled) => self.cancelled(machine, &ctx).await,
            Err(Stop::Failed(err)) => self.failed(machine, &ctx, err).await,
        }
    }

    async fn run(
        &self,
        machine: &mut StateMachine,
        ctx: &mut SecurityContext,
        raw_target: &str,
        snapshot: &PolicySnapshot,
        cancel: &CancellationToken,
    ) -> Result<FinalRecord, Stop> {
        let target = self.validator.validate(raw_target)?;

        machine.advance()?;
        let target_resolution = until_cancelled(cancel, self.resolver.resolve(&target, ctx)).await??;
        if !target_resolution.addresses().is_empty() {
            self.guard.check_addresses(&target_resolution)?;
        }
        let endpoint = self.directory.select(&target)?;
        ctx.set_registry(endpoint.identity.name.clone());
        let registry_resolution = match endpoint.host.parse::<IpAddr>() {
            Ok(ip) => ResolutionResult::new(
                vec![ip],
                endpoint.host.clone(),
                DnssecStatus::NotApplicable,
                Utc::now(),
                Duration::ZERO,
            ),
            Err(_) => until_cancelled(cancel, self.resolver.resolve_host(&endpoint.host, ctx)).await??,
        };

        machine.advance()?;
        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        let authorization = self.guard.authorize(&registry_resolution, endpoint.protocol, ctx)?;
        self.audit
            .emit(
                ctx.request_id(),
                AuditCategory::Boundary,
                AuditDecision::Allow,
                format!("connection to {} authorized for {}", endpoint.host, target.canonical()),
            )
            .await;

        machine.advance()?;
        let request = FetchRequest {
            url: endpoint.url.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
            addresses: authorization.addresses().to_vec(),
            protocol: authorization.protocol(),
            timeout: self.fetch_timeout,
            max_body_bytes: self.max_response_bytes,
        };
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.guard.release(authorization);
                return Err(Stop::Cancelled);
            }
            result = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&request)) => result,
        };
        let fetched = match fetched {
            Ok(result) => result?,
            Err(_) => {
                warn!(request_id = ctx.request_id(), host = %request.host, "registry fetch timed out");
                return Err(RegguardError::FetchTimeout {
                    duration: self.fetch_timeout,
                }
                .into());
            }
        };
        if !(200..300).contains(&fetched.status) {
            return Err(RegguardError::FetchFailed {
                message: format!("registry answered with status {}", fetched.status),
                retryable: fetched.status >= 500 || fetched.status == 429,
            }
            .into());
        }
        self.guard
            .verify_certificate(&authorization, fetched.peer_certificate.as_deref())?;
        drop(authorization);

        machine.advance()?;
        let raw = RawRecord {
            body: fetched.body,
            content_type: fetched.content_type,
        };
        let validated = self.schema.validate(&raw, &endpoint.identity)?;
        ctx.raise_threat_score(validated.threat_score());

        machine.advance()?;
        // The registry has already answered, so the rate-limit token stays spent.
        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        let outcome = self.redaction.apply_with_snapshot(snapshot, &validated, ctx);

        machine.advance()?;
        Ok(self
            .composer
            .compose(outcome, &validated, ctx, target_resolution.dnssec()))
    }

    async fn completed(
        &self,
        mut machine: StateMachine,
        ctx: &SecurityContext,
        record: FinalRecord,
    ) -> PipelineReport {
        if let Err(err) = machine.advance() {
            return self.failed(machine, ctx, err).await;
        }
        let meta = &record.compliance;
        let decision = if meta.redacted_fields > 0 {
            AuditDecision::Redact
        } else {
            AuditDecision::Allow
        };
        self.audit
            .emit(
                ctx.request_id(),
                AuditCategory::Pipeline,
                decision,
                format!(
                    "completed: {} fields redacted, policies [{}], level {}",
                    meta.redacted_fields,
                    meta.policies_applied.join(", "),
                    meta.redaction_level
                ),
            )
            .await;
        info!(
            request_id = ctx.request_id(),
            registry = %meta.registry,
            redacted = meta.redacted_fields,
            policy_version = meta.policy_version,
            "lookup completed"
        );
        PipelineReport {
            request_id: ctx.request_id().to_string(),
            states: machine.history().to_vec(),
            outcome: Ok(record),
        }
    }

    async fn failed(&self, mut machine: StateMachine, ctx: &SecurityContext, err: RegguardError) -> PipelineReport {
        let category = category_for(machine.current(), &err);
        if let Err(internal) = machine.fail(err.code()) {
            error!(request_id = ctx.request_id(), error = %internal, "invalid pipeline transition");
        }
        if err.is_security_critical() {
            error!(request_id = ctx.request_id(), code = %err.code(), %category, "request blocked");
        } else {
            warn!(request_id = ctx.request_id(), code = %err.code(), %category, "request failed");
        }
        self.audit
            .emit(ctx.request_id(), category, AuditDecision::Block, err.to_string())
            .await;
        PipelineReport {
            request_id: ctx.request_id().to_string(),
            states: machine.history().to_vec(),
            outcome: Err(ClassifiedFailure::from(&err)),
        }
    }

    async fn cancelled(&self, mut machine: StateMachine, ctx: &SecurityContext) -> PipelineReport {
        let stage = machine.current();
        if let Err(internal) = machine.cancel() {
            error!(request_id = ctx.request_id(), error = %internal, "invalid pipeline transition");
        }
        info!(request_id = ctx.request_id(), %stage, "request cancelled");
        self.audit
            .emit(
                ctx.request_id(),
                AuditCategory::Pipeline,
                AuditDecision::Cancel,
                format!("cancelled during {stage}"),
            )
            .await;
        PipelineReport {
            request_id: ctx.request_id().to_string(),
            states: machine.history().to_vec(),
            outcome: Err(ClassifiedFailure::from(&RegguardError::Cancelled)),
        }
    }
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Stop> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Stop::Cancelled),
        output = fut => Ok(output),
    }
}

/// Audit category for a failure: boundary decisions by kind, the rest by
/// the stage that was running.
fn category_for(state: PipelineState, err: &RegguardError) -> AuditCategory {
    match err {
        RegguardError::PrivateAddressBlocked { .. }
        | RegguardError::ProtocolNotAllowed { .. }
        | RegguardError::CertificateValidationFailed { .. }
        | RegguardError::RateLimited { .. }
        | RegguardError::GeoFenced { .. } => AuditCategory::Boundary,
        RegguardError::Overloaded
        | RegguardError::Cancelled
        | RegguardError::Config(_)
        | RegguardError::Internal(_) => AuditCategory::Pipeline,
        _ => match state {
            PipelineState::Validating => AuditCategory::TargetValidation,
            PipelineState::Resolving => AuditCategory::Resolution,
            PipelineState::Authorizing => AuditCategory::Boundary,
            PipelineState::Fetching => AuditCategory::Fetch,
            PipelineState::SchemaChecking => AuditCategory::SchemaValidation,
            PipelineState::Redacting => AuditCategory::Redaction,
            _ => AuditCategory::Pipeline,
        },
    }
}
