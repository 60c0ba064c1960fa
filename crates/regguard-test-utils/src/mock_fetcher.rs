// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock registry fetcher.
//!
//! Responses are keyed by full URL. Every request is recorded so tests can
//! assert on what the pipeline was allowed to contact.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use regguard_core::{
    Collaborator, FetchRequest, FetchedResponse, HealthStatus, RegguardError, RegistryFetcher,
};
use serde_json::Value;
use tokio::sync::Notify;

/// A `200 application/rdap+json` response carrying `body`.
pub fn json_response(body: &Value) -> FetchedResponse {
    FetchedResponse {
        status: 200,
        body: serde_json::to_vec(body).unwrap_or_default(),
        content_type: Some("application/rdap+json".to_string()),
        peer_certificate: None,
    }
}

pub struct MockFetcher {
    responses: Mutex<HashMap<String, FetchedResponse>>,
    requests: Mutex<Vec<FetchRequest>>,
    delay: Mutex<Option<Duration>>,
    started: Notify,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            started: Notify::new(),
        }
    }

    pub fn set_response(&self, url: impl Into<String>, response: FetchedResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), response);
    }

    /// Hold every fetch for `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Resolves once a fetch has started (or already had).
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for MockFetcher {
    fn name(&self) -> &str {
        "mock-fetcher"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RegistryFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedResponse, RegguardError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.started.notify_one();

        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.url)
            .cloned();
        response.ok_or_else(|| RegguardError::FetchFailed {
            message: "registry answered with status 404".to_string(),
            retryable: false,
        })
    }
}
