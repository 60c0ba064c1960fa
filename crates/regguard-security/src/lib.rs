// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security enforcement for Regguard lookups.
//!
//! Provides query target validation with homograph checks, address range
//! (SSRF) policy, TLS and certificate pin enforcement, per-client rate
//! limiting, geo-fencing, and the boundary guard that combines them.

pub mod cidr;
pub mod geo;
pub mod guard;
pub mod homograph;
pub mod rate_limit;
pub mod ssrf;
pub mod target;
pub mod tls;

pub use cidr::{Cidr, CidrParseError};
pub use geo::{GeoFence, StaticGeoLocator};
pub use guard::{Authorization, BoundaryGuard};
pub use homograph::{HeuristicHomographDetector, HomographDetector};
pub use rate_limit::{RateLimitPermit, RateLimiter};
pub use ssrf::{is_private_ip, AddressPolicy, PinnedResolver};
pub use target::{QueryTarget, TargetValidator, TargetValue};
pub use tls::{build_pinned_client, fingerprint, validate_url, CertificatePins, Fingerprint};
