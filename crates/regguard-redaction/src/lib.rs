// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redaction policy engine for Regguard.
//!
//! Policies are compiled from configuration into immutable values and held
//! in a copy-on-write [`PolicyRegistry`]. The [`RedactionEngine`] applies a
//! snapshot of them to a validated record and reports one
//! [`FieldDecision`] per redacted (or explicitly bypassed) field.
//!
//! Output is fully determined by the record, the security context and the
//! policy snapshot, and applying the engine to its own output changes
//! nothing.

pub mod actions;
pub mod cache;
pub mod condition;
pub mod engine;
pub mod hash;
pub mod locator;
pub mod pii;
pub mod policy;
pub mod registry;

pub use engine::{
    DecisionAction, FAIL_SAFE_POLICY_ID, FieldDecision, RedactionEngine, RedactionOutcome,
};
pub use hash::{FieldHasher, TokenVault, derive_salt, is_hash_token};
pub use locator::FieldLocator;
pub use pii::PiiDetector;
pub use policy::{Policy, PolicyError};
pub use registry::{PolicyRegistry, PolicySnapshot};

impl From<PolicyError> for regguard_core::RegguardError {
    fn from(err: PolicyError) -> Self {
        regguard_core::RegguardError::Config(err.to_string())
    }
}
