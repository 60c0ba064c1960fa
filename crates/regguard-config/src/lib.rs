// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Regguard lookup pipeline.
//!
//! `RegguardConfig` is layered from compiled defaults, `/etc/regguard`,
//! the user config dir, `./regguard.toml` and `REGGUARD_*` variables.
//! Every table rejects unknown keys. Deserialization failures and semantic
//! validation failures both come back as [`ConfigError`] diagnostics.
//!
//! ```no_run
//! match regguard_config::load_and_validate() {
//!     Ok(config) => println!("{} registries", config.registries.len()),
//!     Err(errors) => eprint!("{}", regguard_config::render_errors(&errors)),
//! }
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RegguardConfig;

/// Load the layered configuration and run [`validation::validate_config`].
pub fn load_and_validate() -> Result<RegguardConfig, Vec<ConfigError>> {
    let config = loader::load_config()
        .map_err(|err| diagnostic::figment_to_config_errors(err, &read_config_files()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Like [`load_and_validate`] for a single inline TOML document.
pub fn load_and_validate_str(toml_content: &str) -> Result<RegguardConfig, Vec<ConfigError>> {
    let config = loader::load_config_from_str(toml_content).map_err(|err| {
        let inline = [("<inline>".to_string(), toml_content.to_string())];
        diagnostic::figment_to_config_errors(err, &inline)
    })?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Contents of the config files that exist, keyed by the absolute path
/// Figment records in error metadata.
fn read_config_files() -> Vec<(String, String)> {
    let cwd = std::env::current_dir().unwrap_or_default();
    loader::config_paths()
        .into_iter()
        .map(|path| if path.is_relative() { cwd.join(path) } else { path })
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
