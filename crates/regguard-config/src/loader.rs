// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./regguard.toml` > `~/.config/regguard/regguard.toml` > `/etc/regguard/regguard.toml`
//! with environment variable overrides via `REGGUARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RegguardConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/regguard/regguard.toml` (system-wide)
/// 3. `~/.config/regguard/regguard.toml` (user XDG config)
/// 4. `./regguard.toml` (local directory)
/// 5. `REGGUARD_*` environment variables
pub fn load_config() -> Result<RegguardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and embedded configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RegguardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RegguardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RegguardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RegguardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/regguard/regguard.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("regguard/regguard.toml"));
    }
    paths.push(PathBuf::from("regguard.toml"));
    paths
}

/// The layered Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(RegguardConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` because key names contain
/// underscores: `REGGUARD_RESOLVER_TTL_CEILING_SECS` must map to
/// `resolver.ttl_ceiling_secs`, not `resolver.ttl.ceiling.secs`.
fn env_provider() -> Env {
    Env::prefixed("REGGUARD_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
fn map_env_key(key: &str) -> String {
    const SECTIONS: &[&str] = &[
        "pipeline", "validator", "resolver", "boundary", "schema", "redaction", "audit",
    ];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(
            map_env_key("resolver_ttl_ceiling_secs"),
            "resolver.ttl_ceiling_secs"
        );
        assert_eq!(
            map_env_key("pipeline_max_concurrency"),
            "pipeline.max_concurrency"
        );
        assert_eq!(map_env_key("audit_signing_key"), "audit.signing_key");
        assert_eq!(map_env_key("unknown_key"), "unknown_key");
    }

    #[test]
    fn env_override_applies_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "regguard.toml",
                "[resolver]\ntimeout_ms = 1500\n",
            )?;
            jail.set_env("REGGUARD_RESOLVER_TIMEOUT_MS", "900");
            let config = load_config_from_path(Path::new("regguard.toml"))?;
            assert_eq!(config.resolver.timeout_ms, 900);
            Ok(())
        });
    }
}
