// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address geolocation used by the geo-fence.

use std::net::IpAddr;

/// Maps an address to an ISO 3166-1 alpha-2 country code.
pub trait GeoLocator: Send + Sync + 'static {
    /// `None` when the address is not covered by the locator's data.
    fn locate(&self, address: &IpAddr) -> Option<String>;
}
