// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secure resolution for Regguard.
//!
//! [`SecureResolver`] resolves each request once, caps cached TTLs and pins
//! the resulting address set. [`HickoryBackend`] is the production DNS
//! backend; tests inject their own [`regguard_core::DnsBackend`].

pub mod cache;
pub mod hickory;
pub mod resolver;

pub use cache::{CacheEntry, ResolutionCache};
pub use hickory::HickoryBackend;
pub use resolver::SecureResolver;
