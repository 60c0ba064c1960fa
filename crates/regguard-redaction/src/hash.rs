// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Salted field hashing and the reversible token vault.
//!
//! The salt is derived from `(secret, tenant, day bucket, salt version)`, all
//! passed in explicitly: the same inputs always give the same token, and
//! tokens from different tenants or days never collide on purpose.

use std::sync::LazyLock;

use chrono::NaiveDate;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on vault entries.
const MAX_VAULT_ENTRIES: usize = 100_000;

static HASH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^hash:v\d+:[0-9a-f]{32}$").unwrap());

/// Whether a value is already a hash token.
pub fn is_hash_token(value: &str) -> bool {
    HASH_TOKEN.is_match(value)
}

fn hmac(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    for part in parts {
        mac.update(&(part.len() as u64).to_be_bytes());
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Derive the salt for one tenant and day bucket.
pub fn derive_salt(secret: &[u8], tenant: &str, day: NaiveDate, version: u32) -> [u8; 32] {
    let day = day.format("%Y-%m-%d").to_string();
    hmac(
        secret,
        &[b"regguard-salt", &version.to_be_bytes(), tenant.as_bytes(), day.as_bytes()],
    )
}

/// Produces `hash:v<version>:<32 hex>` tokens.
#[derive(Clone)]
pub struct FieldHasher {
    secret: Vec<u8>,
    version: u32,
}

impl std::fmt::Debug for FieldHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldHasher")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl FieldHasher {
    pub fn new(secret: Option<&str>, version: u32) -> Self {
        if secret.is_none() {
            warn!("no redaction hash secret configured; hashes are salted but unkeyed");
        }
        Self {
            secret: secret.unwrap_or_default().as_bytes().to_vec(),
            version,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn salt(&self, tenant: &str, day: NaiveDate) -> [u8; 32] {
        derive_salt(&self.secret, tenant, day, self.version)
    }

    /// Hash a value under a salt. Existing tokens are returned unchanged.
    pub fn hash(&self, salt: &[u8; 32], value: &str) -> String {
        if is_hash_token(value) {
            return value.to_string();
        }
        let digest = hmac(salt, &[value.as_bytes()]);
        format!("hash:v{}:{}", self.version, hex::encode(&digest[..16]))
    }
}

/// Token to original value, for hash rules configured as reversible.
#[derive(Debug, Default)]
pub struct TokenVault {
    entries: DashMap<String, String>,
}

impl TokenVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `original` under `token`. Returns false when the vault is full.
    pub fn store(&self, token: &str, original: &str) -> bool {
        if self.entries.contains_key(token) {
            return true;
        }
        if self.entries.len() >= MAX_VAULT_ENTRIES {
            warn!(capacity = MAX_VAULT_ENTRIES, "token vault full; hash is not reversible");
            return false;
        }
        self.entries.insert(token.to_string(), original.to_string());
        true
    }

    /// Look up the original value behind a reversible token.
    pub fn reveal(&self, token: &str) -> Option<String> {
        self.entries.get(token).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
