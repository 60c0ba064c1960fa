// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The audit emitter: signs events into the chain and hands them to the sink,
//! falling back to the emergency log when the sink fails.

use std::sync::Arc;

use chrono::Utc;
use regguard_config::model::AuditConfig;
use regguard_core::{AuditCategory, AuditDecision, AuditEvent, AuditSink};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chain::{self, GENESIS};
use crate::emergency::EmergencyLog;

pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
    emergency: EmergencyLog,
    key: Vec<u8>,
    /// Signature of the last emitted event. Held across the sink call so
    /// chain order and sink order agree.
    head: Mutex<String>,
}

impl std::fmt::Debug for AuditEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditEmitter")
            .field("sink", &self.sink.name())
            .field("emergency", &self.emergency)
            .finish_non_exhaustive()
    }
}

impl AuditEmitter {
    pub fn new(sink: Arc<dyn AuditSink>, config: &AuditConfig) -> Self {
        if config.signing_key.is_none() {
            warn!("no audit signing key configured; chain signatures are unkeyed");
        }
        Self {
            sink,
            emergency: EmergencyLog::new(config.emergency_log_path.as_deref()),
            key: config.signing_key.clone().unwrap_or_default().into_bytes(),
            head: Mutex::new(GENESIS.to_string()),
        }
    }

    /// The sink events go to.
    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    pub fn emergency_log(&self) -> &EmergencyLog {
        &self.emergency
    }

    /// Signing key, for [`chain::verify_chain`].
    pub fn verification_key(&self) -> &[u8] {
        &self.key
    }

    /// Sign and record one event. Never fails: a sink error diverts the
    /// event to the emergency log.
    pub async fn emit(
        &self,
        request_id: &str,
        category: AuditCategory,
        decision: AuditDecision,
        reason: impl Into<String>,
    ) -> AuditEvent {
        let mut head = self.head.lock().await;
        let mut event = AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            category,
            decision,
            reason: reason.into(),
            signature: String::new(),
        };
        event.signature = chain::sign(&self.key, &head, &event);

        match self.sink.record(&event).await {
            Ok(()) => {
                debug!(event_id = %event.id, request_id, %category, %decision, "audit event recorded");
            }
            Err(err) => {
                warn!(event_id = %event.id, request_id, sink = self.sink.name(), error = %err, "audit sink failed, using emergency log");
                self.emergency.write(&event, &err.to_string());
            }
        }
        head.clone_from(&event.signature);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryAuditSink;

    fn config(path: Option<String>) -> AuditConfig {
        AuditConfig {
            emergency_log_path: path,
            signing_key: Some("audit-key".into()),
        }
    }

    #[tokio::test]
    async fn emitted_events_form_a_verifiable_chain() {
        let sink = Arc::new(MemoryAuditSink::new());
        let emitter = AuditEmitter::new(sink.clone(), &config(None));
        for i in 0..3 {
            emitter
                .emit("req-1", AuditCategory::Pipeline, AuditDecision::Allow, format!("step {i}"))
                .await;
        }
        let events = sink.events();
        assert_eq!(events.len(), 3);
        chain::verify_chain(emitter.verification_key(), GENESIS, &events).unwrap();
    }

    #[tokio::test]
    async fn sink_failure_goes_to_emergency_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.jsonl");
        let sink = Arc::new(MemoryAuditSink::new());
        sink.set_failing(true);
        let emitter = AuditEmitter::new(sink.clone(), &config(Some(path.display().to_string())));

        let event = emitter
            .emit("req-9", AuditCategory::Boundary, AuditDecision::Block, "private address 10.0.0.1")
            .await;

        assert!(sink.events().is_empty());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(&event.id));
        assert!(contents.contains("memory sink disabled"));
    }

    #[tokio::test]
    async fn chain_continues_across_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.jsonl");
        let sink = Arc::new(MemoryAuditSink::new());
        let emitter = AuditEmitter::new(sink.clone(), &config(Some(path.display().to_string())));

        let first = emitter.emit("r", AuditCategory::Pipeline, AuditDecision::Allow, "a").await;
        sink.set_failing(true);
        let second = emitter.emit("r", AuditCategory::Pipeline, AuditDecision::Allow, "b").await;
        sink.set_failing(false);
        let third = emitter.emit("r", AuditCategory::Pipeline, AuditDecision::Allow, "c").await;

        chain::verify_chain(emitter.verification_key(), GENESIS, &[first, second, third]).unwrap();
    }
}
