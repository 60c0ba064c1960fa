// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks: event date ordering and contradictory status values.

use chrono::{DateTime, FixedOffset};
use regguard_core::RegguardError;
use serde_json::Value;

use crate::Finding;

/// Score for events whose dates contradict each other.
const DATE_ORDER_SCORE: f64 = 0.4;
/// Score for status sets that cannot hold at the same time.
const STATUS_CONFLICT_SCORE: f64 = 0.3;

/// Status pairs that cannot be set together.
const CONFLICTING_STATUS: &[(&str, &str)] = &[
    ("active", "inactive"),
    ("pending create", "pending delete"),
    ("active", "redemption period"),
    ("locked", "pending transfer"),
];

pub fn inspect(record: &Value) -> Result<Vec<Finding>, RegguardError> {
    let mut findings = Vec::new();
    inspect_object(record, "", &mut findings)?;
    Ok(findings)
}

fn inspect_object(value: &Value, path: &str, findings: &mut Vec<Finding>) -> Result<(), RegguardError> {
    let Some(object) = value.as_object() else {
        return Ok(());
    };

    if let Some(events) = object.get("events").and_then(Value::as_array) {
        let mut registration = None;
        let mut last_changed = None;
        let mut expiration = None;
        for event in events {
            let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(Value::as_str),
                event.get("eventDate").and_then(Value::as_str),
            ) else {
                continue;
            };
            let parsed = DateTime::parse_from_rfc3339(date).map_err(|_| RegguardError::SchemaViolation {
                detail: format!("{path}events: eventDate for `{action}` is not RFC 3339"),
            })?;
            match action {
                "registration" => registration = Some(parsed),
                "last changed" => last_changed = Some(parsed),
                "expiration" => expiration = Some(parsed),
                _ => {}
            }
        }
        if out_of_order(registration, last_changed) || out_of_order(registration, expiration) {
            findings.push(Finding::new(
                "semantic",
                DATE_ORDER_SCORE,
                format!("{path}events: dates out of order"),
            ));
        }
    }

    if let Some(status) = object.get("status").and_then(Value::as_array) {
        let values: Vec<String> = status
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_ascii_lowercase)
            .collect();
        let has = |s: &str| values.iter().any(|v| v == s);
        if let Some((a, b)) = CONFLICTING_STATUS.iter().find(|(a, b)| has(a) && has(b)) {
            findings.push(Finding::new(
                "semantic",
                STATUS_CONFLICT_SCORE,
                format!("{path}status: `{a}` conflicts with `{b}`"),
            ));
        }
    }

    if let Some(entities) = object.get("entities").and_then(Value::as_array) {
        for (i, entity) in entities.iter().enumerate() {
            inspect_object(entity, &format!("{path}entities.{i}."), findings)?;
        }
    }
    Ok(())
}

fn out_of_order(earlier: Option<DateTime<FixedOffset>>, later: Option<DateTime<FixedOffset>>) -> bool {
    matches!((earlier, later), (Some(a), Some(b)) if a > b)
}
