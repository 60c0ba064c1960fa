// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Regguard integration tests.
//!
//! Provides mock collaborators and a harness that runs the full lookup
//! pipeline without network access.
//!
//! # Components
//!
//! - [`MockDns`] - static-zone DNS backend
//! - [`MockFetcher`] - URL-keyed registry responses with request capture
//! - [`TestHarness`] - complete pipeline with in-memory audit and a temp emergency log

pub mod harness;
pub mod mock_dns;
pub mod mock_fetcher;

pub use harness::{
    domain_record, request_day, TestHarness, TestHarnessBuilder, CLIENT_ID, REGISTRY_ADDR,
    REGISTRY_HOST, REGISTRY_NAME, REGISTRY_URL,
};
pub use mock_dns::MockDns;
pub use mock_fetcher::{json_response, MockFetcher};
