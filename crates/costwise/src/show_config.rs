// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costwise config`: the effective configuration after all layers merge.

use costwise_config::model::CostwiseConfig;
use costwise_core::CostwiseError;

const REDACTED: &str = "********";

pub fn run_config(config: &CostwiseConfig) -> Result<(), CostwiseError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &CostwiseConfig) -> Result<String, CostwiseError> {
    let mut shown = config.clone();
    for provider in shown.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.to_string());
        }
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| CostwiseError::Config(format!("failed to render configuration: {e}")))
}
