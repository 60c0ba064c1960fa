// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits for the external collaborators the pipeline talks to.
//!
//! Network-facing collaborators extend the [`Collaborator`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod audit;
pub mod collaborator;
pub mod dns;
pub mod fetch;
pub mod geo;

pub use audit::AuditSink;
pub use collaborator::Collaborator;
pub use dns::DnsBackend;
pub use fetch::RegistryFetcher;
pub use geo::GeoLocator;
