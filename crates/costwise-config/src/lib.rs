// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Costwise router.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`), XDG
//! file lookup, `COSTWISE_` environment overrides, and miette diagnostics
//! with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use costwise_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("active layers: {:?}", config.router.active_layers);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{CostwiseConfig, OverBudgetPolicy};

/// Load configuration from the standard hierarchy and validate it.
///
/// Figment errors are converted into diagnostics with source spans where
/// the offending file can be read back.
pub fn load_and_validate() -> Result<CostwiseConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            tracing::debug!(
                layers = ?config.router.active_layers,
                models = config.models.len(),
                "configuration loaded"
            );
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load configuration from an explicit file and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<CostwiseConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<CostwiseConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Read every config file in the lookup hierarchy that exists.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join(loader::LOCAL_CONFIG_PATH))
        .ok();
    let candidates = [
        local,
        loader::user_config_path(),
        Some(std::path::PathBuf::from(loader::SYSTEM_CONFIG_PATH)),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
