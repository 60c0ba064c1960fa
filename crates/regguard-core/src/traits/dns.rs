// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DNS backend trait used by the secure resolver.

use async_trait::async_trait;

use crate::error::RegguardError;
use crate::traits::collaborator::Collaborator;
use crate::types::DnsAnswer;

/// Performs the actual name lookup.
///
/// Implementations report the advertised TTL and the DNSSEC outcome; capping
/// and pinning are the resolver's job, not the backend's.
#[async_trait]
pub trait DnsBackend: Collaborator {
    /// Look up A and AAAA records for an ASCII hostname.
    async fn lookup(&self, name: &str) -> Result<DnsAnswer, RegguardError>;
}
