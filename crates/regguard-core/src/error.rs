// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Regguard resolution pipeline.
//!
//! [`RegguardError`] is the internal error type. Its `Display` output may name
//! offending addresses or registry content and is meant for logs and audit
//! records only. Anything that crosses the public boundary goes through
//! [`ClassifiedFailure`], whose message comes from a fixed, PII-free table.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across all Regguard stages.
#[derive(Debug, Error)]
pub enum RegguardError {
    /// The raw target is malformed (length, characters, unparsable literal).
    #[error("invalid target format: {reason}")]
    InvalidTargetFormat { reason: String },

    /// The target is well-formed but matches a disallowed pattern.
    #[error("disallowed target pattern: {reason}")]
    DisallowedPattern { reason: String },

    /// Resolution refused (denied suffix, NXDOMAIN, no usable addresses, no registry).
    #[error("resolution blocked: {reason}")]
    ResolutionBlocked { reason: String },

    /// The resolver did not answer within the stage timeout.
    #[error("resolution timed out after {duration:?}")]
    ResolutionTimeout { duration: Duration },

    /// DNSSEC validation failed under a policy that treats it as fatal.
    #[error("DNSSEC validation failed for {name}")]
    DnssecValidationFailed { name: String },

    /// At least one pinned address falls in a disallowed range.
    #[error("connection to disallowed address {address} blocked")]
    PrivateAddressBlocked { address: IpAddr },

    /// The requested transport is not on the allow-list.
    #[error("protocol `{protocol}` is not allowed")]
    ProtocolNotAllowed { protocol: String },

    /// The peer certificate did not match any configured pin.
    #[error("certificate validation failed for {host}: {reason}")]
    CertificateValidationFailed { host: String, reason: String },

    /// The client identity exhausted its token bucket.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// A resolved address geolocates outside the permitted region.
    #[error("address {address} geofenced ({country})")]
    GeoFenced { address: IpAddr, country: String },

    /// The registry payload failed structural or semantic validation.
    #[error("schema violation: {detail}")]
    SchemaViolation { detail: String },

    /// The registry payload carries injection or smuggling patterns.
    #[error("threat pattern detected (score {score:.2}): {detail}")]
    ThreatPatternDetected { score: f64, detail: String },

    /// Admission control rejected the request.
    #[error("pipeline overloaded")]
    Overloaded,

    /// The audit sink could not record an event.
    #[error("audit sink unavailable: {0}")]
    AuditSinkUnavailable(String),

    /// The registry could not be reached or answered with an error.
    #[error("registry fetch failed: {message}")]
    FetchFailed { message: String, retryable: bool },

    /// The fetch did not complete within the stage timeout.
    #[error("registry fetch timed out after {duration:?}")]
    FetchTimeout { duration: Duration },

    /// The request was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,

    /// Configuration errors (invalid values, unparsable policies).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable failure codes exposed to callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    InvalidTargetFormat,
    DisallowedPattern,
    ResolutionBlocked,
    ResolutionTimeout,
    DnssecValidationFailed,
    PrivateAddressBlocked,
    ProtocolNotAllowed,
    CertificateValidationFailed,
    RateLimited,
    GeoFenced,
    SchemaViolation,
    ThreatPatternDetected,
    Overloaded,
    AuditSinkUnavailable,
    FetchFailed,
    FetchTimeout,
    Cancelled,
    InternalError,
}

impl RegguardError {
    /// The stable failure code for this error.
    pub fn code(&self) -> FailureCode {
        match self {
            Self::InvalidTargetFormat { .. } => FailureCode::InvalidTargetFormat,
            Self::DisallowedPattern { .. } => FailureCode::DisallowedPattern,
            Self::ResolutionBlocked { .. } => FailureCode::ResolutionBlocked,
            Self::ResolutionTimeout { .. } => FailureCode::ResolutionTimeout,
            Self::DnssecValidationFailed { .. } => FailureCode::DnssecValidationFailed,
            Self::PrivateAddressBlocked { .. } => FailureCode::PrivateAddressBlocked,
            Self::ProtocolNotAllowed { .. } => FailureCode::ProtocolNotAllowed,
            Self::CertificateValidationFailed { .. } => FailureCode::CertificateValidationFailed,
            Self::RateLimited { .. } => FailureCode::RateLimited,
            Self::GeoFenced { .. } => FailureCode::GeoFenced,
            Self::SchemaViolation { .. } => FailureCode::SchemaViolation,
            Self::ThreatPatternDetected { .. } => FailureCode::ThreatPatternDetected,
            Self::Overloaded => FailureCode::Overloaded,
            Self::AuditSinkUnavailable(_) => FailureCode::AuditSinkUnavailable,
            Self::FetchFailed { .. } => FailureCode::FetchFailed,
            Self::FetchTimeout { .. } => FailureCode::FetchTimeout,
            Self::Cancelled => FailureCode::Cancelled,
            Self::Config(_) | Self::Internal(_) => FailureCode::InternalError,
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ResolutionTimeout { .. }
            | Self::RateLimited { .. }
            | Self::Overloaded
            | Self::FetchTimeout { .. }
            | Self::Cancelled => true,
            Self::FetchFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Retry hint, only present for rate limiting.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether this failure is a security decision that must be audited
    /// synchronously before returning.
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            Self::DisallowedPattern { .. }
                | Self::ResolutionBlocked { .. }
                | Self::DnssecValidationFailed { .. }
                | Self::PrivateAddressBlocked { .. }
                | Self::ProtocolNotAllowed { .. }
                | Self::CertificateValidationFailed { .. }
                | Self::GeoFenced { .. }
                | Self::ThreatPatternDetected { .. }
        )
    }
}

/// Public projection of a failure: stable code, fixed message, retry guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub code: FailureCode,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<f64>,
}

impl From<&RegguardError> for ClassifiedFailure {
    fn from(err: &RegguardError) -> Self {
        let code = err.code();
        Self {
            code,
            message: public_message(code).to_string(),
            retryable: err.is_retryable(),
            retry_after_secs: err.retry_after().map(|d| d.as_secs_f64()),
        }
    }
}

impl From<RegguardError> for ClassifiedFailure {
    fn from(err: RegguardError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Fixed caller-facing message per code. Never interpolates request data.
fn public_message(code: FailureCode) -> &'static str {
    match code {
        FailureCode::InvalidTargetFormat => "the query target is not a valid domain, IP address, IP range or ASN",
        FailureCode::DisallowedPattern => "the query target matches a disallowed pattern",
        FailureCode::ResolutionBlocked => "the query target could not be resolved to an allowed destination",
        FailureCode::ResolutionTimeout => "name resolution timed out",
        FailureCode::DnssecValidationFailed => "DNSSEC validation failed for the query target",
        FailureCode::PrivateAddressBlocked => "the query target resolves to a disallowed network address",
        FailureCode::ProtocolNotAllowed => "the requested transport protocol is not allowed",
        FailureCode::CertificateValidationFailed => "the registry certificate did not match the configured pins",
        FailureCode::RateLimited => "too many requests for this client",
        FailureCode::GeoFenced => "the destination is outside the permitted region",
        FailureCode::SchemaViolation => "the registry response failed validation",
        FailureCode::ThreatPatternDetected => "the registry response contained unsafe content",
        FailureCode::Overloaded => "the service is at capacity",
        FailureCode::AuditSinkUnavailable => "the audit service is unavailable",
        FailureCode::FetchFailed => "the registry could not be reached",
        FailureCode::FetchTimeout => "the registry did not respond in time",
        FailureCode::Cancelled => "the request was cancelled",
        FailureCode::InternalError => "an internal error occurred",
    }
}
