// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 signature chain over audit events.
//!
//! Each signature covers the previous signature and the event's canonical
//! fields, so removing, reordering or editing any event breaks every
//! signature after it.

use hmac::{Hmac, Mac};
use regguard_core::AuditEvent;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Chain predecessor of the first event.
pub const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Why a chain failed to verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audit chain broken at event {index} ({id})")]
pub struct ChainError {
    pub index: usize,
    pub id: String,
}

/// Canonical bytes of the signed fields, length-prefixed.
fn canonical(event: &AuditEvent) -> Vec<u8> {
    let timestamp = event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
    let category = event.category.to_string();
    let decision = event.decision.to_string();
    let fields: [&str; 6] = [
        &event.id,
        &timestamp,
        &event.request_id,
        &category,
        &decision,
        &event.reason,
    ];
    let mut out = Vec::new();
    for field in fields {
        out.extend_from_slice(&(field.len() as u64).to_be_bytes());
        out.extend_from_slice(field.as_bytes());
    }
    out
}

/// Signature of `event` following `previous`.
pub fn sign(key: &[u8], previous: &str, event: &AuditEvent) -> String {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(previous.as_bytes());
    mac.update(&canonical(event));
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a contiguous run of events starting after `previous`.
pub fn verify_chain(key: &[u8], previous: &str, events: &[AuditEvent]) -> Result<(), ChainError> {
    let mut previous = previous.to_string();
    for (index, event) in events.iter().enumerate() {
        let expected = sign(key, &previous, event);
        let expected_bytes = expected.as_bytes();
        let actual_bytes = event.signature.as_bytes();
        // Compare without early exit.
        let matches = expected_bytes.len() == actual_bytes.len()
            && expected_bytes
                .iter()
                .zip(actual_bytes)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0;
        if !matches {
            return Err(ChainError {
                index,
                id: event.id.clone(),
            });
        }
        previous = event.signature.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use regguard_core::{AuditCategory, AuditDecision};

    fn chain(key: &[u8], n: usize) -> Vec<AuditEvent> {
        let mut previous = GENESIS.to_string();
        (0..n)
            .map(|i| {
                let mut event = AuditEvent {
                    id: format!("evt-{i}"),
                    timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, i as u32).unwrap(),
                    request_id: "req-1".into(),
                    category: AuditCategory::Boundary,
                    decision: AuditDecision::Block,
                    reason: format!("reason {i}"),
                    signature: String::new(),
                };
                event.signature = sign(key, &previous, &event);
                previous = event.signature.clone();
                event
            })
            .collect()
    }

    #[test]
    fn intact_chain_verifies() {
        let events = chain(b"key", 4);
        assert!(verify_chain(b"key", GENESIS, &events).is_ok());
        assert_eq!(events[0].signature.len(), 64);
    }

    #[test]
    fn edited_event_breaks_chain() {
        let mut events = chain(b"key", 3);
        events[1].reason = "rewritten".into();
        assert_eq!(verify_chain(b"key", GENESIS, &events).unwrap_err().index, 1);
    }

    #[test]
    fn dropped_event_breaks_chain() {
        let mut events = chain(b"key", 3);
        events.remove(1);
        assert_eq!(verify_chain(b"key", GENESIS, &events).unwrap_err().index, 1);
    }

    #[test]
    fn wrong_key_fails() {
        let events = chain(b"key", 2);
        assert!(verify_chain(b"other", GENESIS, &events).is_err());
    }
}
