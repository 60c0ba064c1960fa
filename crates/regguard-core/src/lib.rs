// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Regguard, a hardened registration-data lookup client.
//!
//! This crate provides the error taxonomy, the data types every pipeline
//! stage shares, and the traits implemented by external collaborators (DNS,
//! registry fetch, audit sink, geolocation).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ClassifiedFailure, FailureCode, RegguardError};
pub use types::{
    AuditCategory, AuditDecision, AuditEvent, DnsAnswer, DnssecStatus, FetchRequest,
    FetchedResponse, HealthStatus, Protocol, RawRecord, RegistryIdentity, ResolutionResult,
    SecurityContext, SecurityContextBuilder, SecurityLevel,
};

pub use traits::{AuditSink, Collaborator, DnsBackend, GeoLocator, RegistryFetcher};
