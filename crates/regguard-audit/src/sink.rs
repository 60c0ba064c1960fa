// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in audit sinks: in-memory and append-only JSON-lines file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use regguard_core::{AuditEvent, AuditSink, Collaborator, HealthStatus, RegguardError};
use tokio::io::AsyncWriteExt;

/// Keeps events in memory. Can be switched into a failing state.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// While failing, every `record` returns `AuditSinkUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Collaborator for MemoryAuditSink {
    fn name(&self) -> &str {
        "memory-audit"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("sink disabled".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), RegguardError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegguardError::AuditSinkUnavailable("memory sink disabled".into()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl Collaborator for JsonLinesAuditSink {
    fn name(&self) -> &str {
        "jsonl-audit"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => Ok(HealthStatus::Unhealthy(
                format!("directory {} does not exist", dir.display()),
            )),
            _ => Ok(HealthStatus::Healthy),
        }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), RegguardError> {
        let unavailable = |e: std::io::Error| RegguardError::AuditSinkUnavailable(e.to_string());
        let mut line = serde_json::to_vec(event)
            .map_err(|e| RegguardError::Internal(format!("cannot serialize audit event: {e}")))?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        file.write_all(&line).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use regguard_core::{AuditCategory, AuditDecision};

    fn event(id: &str) -> AuditEvent {
        AuditEvent {
            id: id.into(),
            timestamp: Utc::now(),
            request_id: "req-1".into(),
            category: AuditCategory::Pipeline,
            decision: AuditDecision::Allow,
            reason: "completed".into(),
            signature: "00".into(),
        }
    }

    #[tokio::test]
    async fn memory_sink_records_and_fails_on_demand() {
        let sink = MemoryAuditSink::new();
        sink.record(&event("a")).await.unwrap();
        sink.set_failing(true);
        assert!(matches!(
            sink.record(&event("b")).await,
            Err(RegguardError::AuditSinkUnavailable(_))
        ));
        assert_eq!(sink.events().len(), 1);
        assert!(matches!(sink.health_check().await.unwrap(), HealthStatus::Unhealthy(_)));
    }

    #[tokio::test]
    async fn jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonLinesAuditSink::new(&path);
        sink.record(&event("a")).await.unwrap();
        sink.record(&event("b")).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = contents
            .lines()
            .map(|l| serde_json::from_str::<AuditEvent>(l).unwrap().id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn jsonl_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesAuditSink::new(dir.path().join("missing").join("audit.jsonl"));
        assert!(matches!(
            sink.record(&event("a")).await,
            Err(RegguardError::AuditSinkUnavailable(_))
        ));
        assert!(matches!(sink.health_check().await.unwrap(), HealthStatus::Unhealthy(_)));
    }
}
