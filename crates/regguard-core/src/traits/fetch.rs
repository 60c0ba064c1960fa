// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry fetcher trait (the raw response acquirer).

use async_trait::async_trait;

use crate::error::RegguardError;
use crate::traits::collaborator::Collaborator;
use crate::types::{FetchRequest, FetchedResponse};

/// Retrieves raw registry bytes.
///
/// Only ever invoked after the boundary guard authorized the request. The
/// fetcher must connect to `request.addresses` and nothing else.
#[async_trait]
pub trait RegistryFetcher: Collaborator {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedResponse, RegguardError>;
}
