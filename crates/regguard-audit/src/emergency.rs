// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local emergency log used when the audit sink is down.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use regguard_core::AuditEvent;
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct EmergencyEntry<'a> {
    event: &'a AuditEvent,
    sink_error: &'a str,
}

/// Append-only JSON-lines file, or the error log when no path is set or the
/// file cannot be written.
#[derive(Debug)]
pub struct EmergencyLog {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl EmergencyLog {
    pub fn new(path: Option<impl Into<PathBuf>>) -> Self {
        Self {
            path: path.map(Into::into),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event the sink rejected. Never fails.
    pub fn write(&self, event: &AuditEvent, sink_error: &str) {
        if let Some(path) = &self.path {
            match self.append(path, event, sink_error) {
                Ok(()) => return,
                Err(err) => {
                    error!(path = %path.display(), error = %err, "emergency audit log write failed");
                }
            }
        }
        error!(
            event_id = %event.id,
            request_id = %event.request_id,
            category = %event.category,
            decision = %event.decision,
            reason = %event.reason,
            signature = %event.signature,
            sink_error,
            "audit sink unavailable"
        );
    }

    fn append(&self, path: &Path, event: &AuditEvent, sink_error: &str) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(&EmergencyEntry { event, sink_error })?;
        line.push(b'\n');

        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(OpenOptions::new().create(true).append(true).open(path)?);
        }
        let Some(file) = guard.as_mut() else {
            return Ok(());
        };
        let result = file.write_all(&line).and_then(|()| file.flush());
        if result.is_err() {
            // Reopen on the next write.
            *guard = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regguard_core::{AuditCategory, AuditDecision};
    use tracing_test::traced_test;

    fn event() -> AuditEvent {
        AuditEvent {
            id: "evt-1".into(),
            timestamp: Utc::now(),
            request_id: "req-1".into(),
            category: AuditCategory::Boundary,
            decision: AuditDecision::Block,
            reason: "private address".into(),
            signature: "ab".into(),
        }
    }

    #[test]
    fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.jsonl");
        let log = EmergencyLog::new(Some(&path));
        log.write(&event(), "sink down");
        log.write(&event(), "sink down");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry["event"]["id"], "evt-1");
        assert_eq!(entry["sink_error"], "sink down");
    }

    #[traced_test]
    #[test]
    fn falls_back_to_error_log_without_path() {
        let log = EmergencyLog::new(None::<PathBuf>);
        log.write(&event(), "sink down");
        assert!(logs_contain("audit sink unavailable"));
    }

    #[traced_test]
    #[test]
    fn unwritable_path_falls_back_to_error_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = EmergencyLog::new(Some(dir.path().join("missing").join("log.jsonl")));
        log.write(&event(), "sink down");
        assert!(logs_contain("emergency audit log write failed"));
        assert!(logs_contain("audit sink unavailable"));
    }
}
