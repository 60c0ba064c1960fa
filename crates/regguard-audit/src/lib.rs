// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit trail for Regguard.
//!
//! Every event is signed into an HMAC-SHA256 chain before it reaches the
//! configured [`AuditSink`](regguard_core::AuditSink). When the sink fails the
//! event is written to a local emergency log instead; emitting never fails.

pub mod chain;
pub mod emergency;
pub mod emitter;
pub mod sink;

pub use chain::{ChainError, GENESIS, sign, verify_chain};
pub use emergency::EmergencyLog;
pub use emitter::AuditEmitter;
pub use sink::{JsonLinesAuditSink, MemoryAuditSink};
