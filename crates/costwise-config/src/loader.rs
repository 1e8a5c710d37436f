// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./costwise.toml` > `~/.config/costwise/costwise.toml` >
//! `/etc/costwise/costwise.toml`, with `COSTWISE_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CostwiseConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/costwise/costwise.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "costwise.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("costwise/costwise.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/costwise/costwise.toml`
/// 3. `~/.config/costwise/costwise.toml`
/// 4. `./costwise.toml`
/// 5. `COSTWISE_*` environment variables
pub fn load_config() -> Result<CostwiseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
///
/// No files and no environment are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<CostwiseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CostwiseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CostwiseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CostwiseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CostwiseConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider mapping `COSTWISE_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `COSTWISE_STORAGE_DATABASE_PATH` is `storage.database_path`.
/// Provider credentials map as `COSTWISE_PROVIDERS_<NAME>_API_KEY` to
/// `providers.<name>.api_key`.
fn env_provider() -> Env {
    Env::prefixed("COSTWISE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("providers_") {
        if let Some(name) = rest.strip_suffix("_api_key") {
            return format!("providers.{name}.api_key");
        }
        if let Some(name) = rest.strip_suffix("_enabled") {
            return format!("providers.{name}.enabled");
        }
    }

    for section in ["logging", "storage", "router", "reporting"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }

    key.to_string()
}
