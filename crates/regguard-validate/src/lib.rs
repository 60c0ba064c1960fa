// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema and threat validation for untrusted registry responses.
//!
//! Four independent layers feed one threat score (the maximum across
//! layers): structural schema, semantic consistency, hostile-pattern scan and
//! business rules. A record that reaches [`ValidatedRecord`] is the only form
//! of registry data the rest of the pipeline accepts.

pub mod business;
pub mod schema;
pub mod semantic;
pub mod threat;
pub mod validator;

pub use business::{BusinessRule, LinkHygiene, ResourceLimits};
pub use validator::{SchemaThreatValidator, ValidatedRecord};

/// One observation from a validation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Layer that produced it (`semantic`, `threat`, `business`).
    pub layer: &'static str,
    /// Severity in `0.0..=1.0`.
    pub score: f64,
    /// Internal description. May quote registry content; never shown to
    /// callers.
    pub detail: String,
}

impl Finding {
    pub fn new(layer: &'static str, score: f64, detail: impl Into<String>) -> Self {
        Self {
            layer,
            score: score.clamp(0.0, 1.0),
            detail: detail.into(),
        }
    }
}
