// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by every pipeline stage.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Collaborator is fully operational.
    Healthy,
    /// Collaborator is operational but experiencing issues.
    Degraded(String),
    /// Collaborator is not operational.
    Unhealthy(String),
}

/// Transport used to reach a registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Https,
    Http,
    Whois,
}

impl Protocol {
    /// Whether the transport is encrypted.
    pub fn is_encrypted(self) -> bool {
        matches!(self, Protocol::Https)
    }

    /// Default port for the transport.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Https => 443,
            Protocol::Http => 80,
            Protocol::Whois => 43,
        }
    }
}

/// Assurance level of a single run. Ordered from weakest to strongest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Minimal,
    Standard,
    Elevated,
    Strict,
}

impl SecurityLevel {
    /// One step weaker, saturating at `Minimal`.
    pub fn downgraded(self) -> Self {
        match self {
            SecurityLevel::Strict => SecurityLevel::Elevated,
            SecurityLevel::Elevated => SecurityLevel::Standard,
            SecurityLevel::Standard | SecurityLevel::Minimal => SecurityLevel::Minimal,
        }
    }
}

/// Outcome of DNSSEC validation for a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DnssecStatus {
    /// Chain of trust validated.
    Secure,
    /// Zone is unsigned or validation was not requested.
    Insecure,
    /// Signatures present but invalid.
    Bogus,
    /// No DNS lookup happened (literal addresses, ASNs).
    NotApplicable,
}

/// Answer returned by a DNS backend for one name.
#[derive(Debug, Clone)]
pub struct DnsAnswer {
    pub addresses: Vec<IpAddr>,
    /// Smallest TTL advertised across the answer records.
    pub ttl: Duration,
    pub dnssec: DnssecStatus,
    pub canonical_name: Option<String>,
}

/// Addresses pinned for the whole lifetime of one request.
///
/// Produced by the secure resolver and only read downstream; the boundary
/// guard and the fetcher never re-resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    addresses: Vec<IpAddr>,
    canonical_name: String,
    dnssec: DnssecStatus,
    resolved_at: DateTime<Utc>,
    ttl: Duration,
}

impl ResolutionResult {
    pub fn new(
        addresses: Vec<IpAddr>,
        canonical_name: impl Into<String>,
        dnssec: DnssecStatus,
        resolved_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            addresses,
            canonical_name: canonical_name.into(),
            dnssec,
            resolved_at,
            ttl,
        }
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn dnssec(&self) -> DnssecStatus {
        self.dnssec
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    /// Effective TTL after capping.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Per-request security context, created once at entry and threaded through
/// every stage.
///
/// Deliberately not `Clone`: a context belongs to exactly one run. The threat
/// score can only go up.
#[derive(Debug)]
pub struct SecurityContext {
    request_id: String,
    client_id: String,
    tenant_id: String,
    jurisdiction: Option<String>,
    legal_basis: Option<String>,
    security_level: SecurityLevel,
    threat_score: f64,
    request_day: NaiveDate,
    registry: Option<String>,
}

impl SecurityContext {
    /// Start building a context for one request.
    pub fn builder(request_id: impl Into<String>, client_id: impl Into<String>) -> SecurityContextBuilder {
        SecurityContextBuilder {
            request_id: request_id.into(),
            client_id: client_id.into(),
            tenant_id: None,
            jurisdiction: None,
            legal_basis: None,
            security_level: SecurityLevel::Standard,
            request_day: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn jurisdiction(&self) -> Option<&str> {
        self.jurisdiction.as_deref()
    }

    pub fn legal_basis(&self) -> Option<&str> {
        self.legal_basis.as_deref()
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn threat_score(&self) -> f64 {
        self.threat_score
    }

    /// Day bucket used for salted hashing. Supplied at entry, never read from
    /// the wall clock afterwards.
    pub fn request_day(&self) -> NaiveDate {
        self.request_day
    }

    /// Registry selected for this request, once endpoint selection ran.
    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn set_registry(&mut self, registry: impl Into<String>) {
        self.registry = Some(registry.into());
    }

    /// Raise the threat score. Lower or non-finite values are ignored.
    pub fn raise_threat_score(&mut self, score: f64) {
        if score.is_finite() && score > self.threat_score {
            self.threat_score = score.min(1.0);
        }
    }

    /// Lower the assurance level by one step (e.g. unvalidated DNSSEC).
    pub fn downgrade_security_level(&mut self) {
        self.security_level = self.security_level.downgraded();
    }
}

/// Builder for [`SecurityContext`].
#[derive(Debug)]
pub struct SecurityContextBuilder {
    request_id: String,
    client_id: String,
    tenant_id: Option<String>,
    jurisdiction: Option<String>,
    legal_basis: Option<String>,
    security_level: SecurityLevel,
    request_day: Option<NaiveDate>,
}

impl SecurityContextBuilder {
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Jurisdiction hint, normalized to upper case (`eu` -> `EU`).
    pub fn jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        let value: String = jurisdiction.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.jurisdiction = Some(trimmed.to_ascii_uppercase());
        }
        self
    }

    /// Legal basis, normalized to lower-case kebab form
    /// (`Legitimate Interest` -> `legitimate-interest`).
    pub fn legal_basis(mut self, legal_basis: impl Into<String>) -> Self {
        let value: String = legal_basis.into();
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        if !normalized.is_empty() {
            self.legal_basis = Some(normalized);
        }
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

    pub fn build(self) -> SecurityContext {
        SecurityContext {
            tenant_id: self.tenant_id.unwrap_or_else(|| "default".to_string()),
            request_id: self.request_id,
            client_id: self.client_id,
            jurisdiction: self.jurisdiction,
            legal_basis: self.legal_basis,
            security_level: self.security_level,
            threat_score: 0.0,
            request_day: self.request_day.unwrap_or_else(|| Utc::now().date_naive()),
            registry: None,
        }
    }
}

/// The registry a record was fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryIdentity {
    pub name: String,
    pub base_url: String,
}

/// Untrusted bytes exactly as the registry returned them.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// A single outbound request, bound to the pinned addresses.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub host: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
    pub protocol: Protocol,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

/// What the fetcher got back.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// DER-encoded leaf certificate of the peer, when TLS was used.
    pub peer_certificate: Option<Vec<u8>>,
}

/// Audit event category, one per stage family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    TargetValidation,
    Resolution,
    Boundary,
    Fetch,
    SchemaValidation,
    Redaction,
    Pipeline,
}

/// What the audited decision was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allow,
    Block,
    Redact,
    Cancel,
}

/// An immutable, signed audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub category: AuditCategory,
    pub decision: AuditDecision,
    pub reason: String,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn context() -> SecurityContext {
        SecurityContext::builder("req-1", "client-a")
            .jurisdiction("eu")
            .legal_basis("Legitimate Interest")
            .request_day(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .build()
    }

    #[test]
    fn builder_normalizes_hints() {
        let ctx = context();
        assert_eq!(ctx.jurisdiction(), Some("EU"));
        assert_eq!(ctx.legal_basis(), Some("legitimate-interest"));
        assert_eq!(ctx.tenant_id(), "default");
        assert_eq!(ctx.security_level(), SecurityLevel::Standard);
    }

    #[test]
    fn threat_score_never_decreases() {
        let mut ctx = context();
        ctx.raise_threat_score(0.4);
        ctx.raise_threat_score(0.1);
        assert_eq!(ctx.threat_score(), 0.4);
        ctx.raise_threat_score(f64::NAN);
        assert_eq!(ctx.threat_score(), 0.4);
        ctx.raise_threat_score(3.0);
        assert_eq!(ctx.threat_score(), 1.0);
    }

    #[test]
    fn security_level_downgrade_saturates() {
        let mut ctx = SecurityContext::builder("r", "c")
            .security_level(SecurityLevel::Elevated)
            .build();
        ctx.downgrade_security_level();
        assert_eq!(ctx.security_level(), SecurityLevel::Standard);
        ctx.downgrade_security_level();
        ctx.downgrade_security_level();
        assert_eq!(ctx.security_level(), SecurityLevel::Minimal);
    }

    #[test]
    fn protocol_parsing_and_encryption() {
        assert_eq!(Protocol::from_str("https").unwrap(), Protocol::Https);
        assert!(Protocol::Https.is_encrypted());
        assert!(!Protocol::Whois.is_encrypted());
        assert_eq!(Protocol::Whois.default_port(), 43);
    }

    #[test]
    fn audit_enums_serialize_snake_case() {
        let json = serde_json::to_string(&AuditCategory::SchemaValidation).unwrap();
        assert_eq!(json, "\"schema_validation\"");
        assert_eq!(AuditDecision::Block.to_string(), "block");
    }
}
