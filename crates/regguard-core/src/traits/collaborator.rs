// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that every external collaborator implements.

use async_trait::async_trait;

use crate::error::RegguardError;
use crate::types::HealthStatus;

/// The base trait for all pipeline collaborators (DNS, fetch, audit).
///
/// Provides identity and a health check so the pipeline can report on the
/// state of its dependencies.
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// Returns the human-readable name of this collaborator instance.
    fn name(&self) -> &str;

    /// Performs a health check and returns the collaborator's current status.
    async fn health_check(&self) -> Result<HealthStatus, RegguardError>;
}
