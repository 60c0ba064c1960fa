// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit sink trait.

use async_trait::async_trait;

use crate::error::RegguardError;
use crate::traits::collaborator::Collaborator;
use crate::types::AuditEvent;

/// External append-only store for audit events.
///
/// A failing sink must never fail the pipeline; callers fall back to the
/// emergency log.
#[async_trait]
pub trait AuditSink: Collaborator {
    async fn record(&self, event: &AuditEvent) -> Result<(), RegguardError>;
}
