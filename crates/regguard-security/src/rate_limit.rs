// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client token-bucket rate limiting.
//!
//! Each client identity owns a bucket of `capacity` tokens that refills in
//! full once its window has elapsed, never partway through. A client that
//! spends its tokens anywhere inside a window waits for that window to end.
//! Bucket updates happen under the DashMap shard lock, so concurrent
//! acquisitions for the same client are serialized and never over-grant.

use std::time::Duration;

use dashmap::DashMap;
use regguard_config::model::RateLimitConfig;
use regguard_core::RegguardError;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Buckets beyond this count trigger a sweep of expired buckets.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
}

/// Proof that one token was taken. Hand it back to
/// [`RateLimiter::release`] to refund a request that never went out.
#[derive(Debug)]
#[must_use = "dropping a permit keeps the token spent"]
pub struct RateLimitPermit {
    client_id: String,
    window_start: Instant,
}

impl RateLimitPermit {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Token-bucket limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            window: Duration::from_secs(config.window_secs.max(1)),
            buckets: DashMap::new(),
        }
    }

    pub fn try_acquire(&self, client_id: &str) -> Result<RateLimitPermit, RegguardError> {
        self.try_acquire_at(client_id, Instant::now())
    }

    /// Take one token at an explicit instant.
    pub fn try_acquire_at(
        &self,
        client_id: &str,
        now: Instant,
    ) -> Result<RateLimitPermit, RegguardError> {
        if self.buckets.len() > SWEEP_THRESHOLD {
            self.sweep_expired(now);
        }

        let mut bucket = self.buckets.entry(client_id.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            window_start: now,
        });
        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            debug!(client_id, remaining = bucket.tokens, "rate limit token taken");
            return Ok(RateLimitPermit {
                client_id: client_id.to_string(),
                window_start: bucket.window_start,
            });
        }

        let retry_after = (bucket.window_start + self.window).saturating_duration_since(now);
        warn!(client_id, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
        Err(RegguardError::RateLimited { retry_after })
    }

    /// Refund a permit whose request was cancelled. A permit from a window
    /// that has since rolled over is dropped; the refill already covered it.
    pub fn release(&self, permit: RateLimitPermit) {
        if let Some(mut bucket) = self.buckets.get_mut(&permit.client_id)
            && bucket.window_start == permit.window_start
        {
            bucket.tokens = (bucket.tokens + 1).min(self.capacity);
            debug!(client_id = %permit.client_id, "rate limit token refunded");
        }
    }

    /// Tokens currently available to `client_id` at `now`.
    pub fn available_at(&self, client_id: &str, now: Instant) -> u32 {
        match self.buckets.get_mut(client_id) {
            Some(mut bucket) => {
                self.refill(&mut bucket, now);
                bucket.tokens
            }
            None => self.capacity,
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        if now.saturating_duration_since(bucket.window_start) >= self.window {
            bucket.tokens = self.capacity;
            bucket.window_start = now;
        }
    }

    /// Drop buckets whose window has ended; they would be full again anyway.
    fn sweep_expired(&self, now: Instant) {
        let window = self.window;
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.window_start) < window);
    }
}
