// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTPS registry fetcher.
//!
//! Connects only to the addresses the boundary guard authorized, never
//! follows redirects and stops reading once the body exceeds its cap. The
//! peer certificate is handed back for pin verification.

use async_trait::async_trait;
use regguard_core::{
    Collaborator, FetchRequest, FetchedResponse, HealthStatus, RegguardError, RegistryFetcher,
};
use regguard_security::{build_pinned_client, validate_url};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, warn};

const RDAP_ACCEPT: &str = "application/rdap+json, application/json;q=0.9";

/// Production [`RegistryFetcher`] backed by a per-request pinned `reqwest` client.
#[derive(Debug, Default)]
pub struct HttpsFetcher;

impl HttpsFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collaborator for HttpsFetcher {
    fn name(&self) -> &str {
        "https-fetcher"
    }

    async fn health_check(&self) -> Result<HealthStatus, RegguardError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RegistryFetcher for HttpsFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedResponse, RegguardError> {
        // The URL scheme must be the protocol the guard authorized.
        validate_url(&request.url, &[request.protocol])?;
        let client = build_pinned_client(&request.host, request.addresses.clone(), request.timeout)?;
        let classify = |e: reqwest::Error| classify_error(e, request);

        let mut response = client
            .get(&request.url)
            .header(ACCEPT, RDAP_ACCEPT)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            warn!(host = %request.host, %status, "registry returned an error status");
            return Err(RegguardError::FetchFailed {
                message: format!("registry answered with status {}", status.as_u16()),
                retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let peer_certificate = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);

        if let Some(length) = response.content_length()
            && length > request.max_body_bytes as u64
        {
            return Err(too_large(request));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if body.len() + chunk.len() > request.max_body_bytes {
                return Err(too_large(request));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(host = %request.host, status = status.as_u16(), bytes = body.len(), "registry response received");
        Ok(FetchedResponse {
            status: status.as_u16(),
            body,
            content_type,
            peer_certificate,
        })
    }
}

fn too_large(request: &FetchRequest) -> RegguardError {
    warn!(host = %request.host, limit = request.max_body_bytes, "registry response too large");
    RegguardError::FetchFailed {
        message: format!("response exceeds {} bytes", request.max_body_bytes),
        retryable: false,
    }
}

fn classify_error(err: reqwest::Error, request: &FetchRequest) -> RegguardError {
    if err.is_timeout() {
        warn!(host = %request.host, timeout_ms = request.timeout.as_millis() as u64, "registry fetch timed out");
        return RegguardError::FetchTimeout {
            duration: request.timeout,
        };
    }
    warn!(host = %request.host, error = %err, "registry fetch failed");
    RegguardError::FetchFailed {
        message: err.to_string(),
        retryable: err.is_connect(),
    }
}
