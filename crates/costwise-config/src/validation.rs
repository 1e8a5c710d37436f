// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the cross-references serde cannot express: allocation ratios that
//! name real models, budgets that convert into a capacity, and so on.

use std::collections::HashSet;

use costwise_core::QualityTier;

use crate::diagnostic::ConfigError;
use crate::model::{CostwiseConfig, IMAGE_CAP_KEY};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &CostwiseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.logging.log_level.as_str()) {
        fail(format!(
            "logging.log_level `{}` must be one of: {}",
            config.logging.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.router.active_layers.is_empty() {
        fail("router.active_layers must name at least one layer".to_string());
    }
    let mut seen = HashSet::new();
    for layer in &config.router.active_layers {
        if !seen.insert(layer) {
            fail(format!("router.active_layers lists `{layer}` more than once"));
        }
    }

    for (key, model) in &config.models {
        if model.provider.trim().is_empty() {
            fail(format!("models.{key}.provider must not be empty"));
        }
        if model.model_id.trim().is_empty() {
            fail(format!("models.{key}.model_id must not be empty"));
        }
        if model.tier == QualityTier::OverBudget {
            fail(format!(
                "models.{key}.tier must be premium, budget, or specialized"
            ));
        }
        let costs = [
            ("unit_cost.per_request", model.unit_cost.per_request),
            ("unit_cost.per_image", model.unit_cost.per_image),
            ("unit_cost.per_search", model.unit_cost.per_search),
            ("pricing.input_per_mtok", model.pricing.input_per_mtok),
            ("pricing.output_per_mtok", model.pricing.output_per_mtok),
        ];
        for (field, value) in costs {
            if value < 0.0 {
                fail(format!("models.{key}.{field} must be non-negative, got {value}"));
            }
        }
    }

    for key in config.quota.daily_caps.keys() {
        if key != IMAGE_CAP_KEY && !config.models.contains_key(key) {
            fail(format!(
                "quota.daily_caps.{key} does not name a model in [models] (or `{IMAGE_CAP_KEY}`)"
            ));
        }
    }

    for (pool, budget) in &config.budget.monthly_budgets {
        if *budget < 0.0 {
            fail(format!(
                "budget.monthly_budgets.{pool} must be non-negative, got {budget}"
            ));
        }
    }

    let mut funded = HashSet::new();
    for (pool, ratios) in &config.budget.allocation_ratios {
        if !config.budget.monthly_budgets.contains_key(pool) {
            fail(format!(
                "budget.allocation_ratios.{pool} has no matching budget.monthly_budgets entry"
            ));
        }

        let mut total = 0.0;
        for (model_key, ratio) in ratios {
            total += ratio;
            if !(0.0..=1.0).contains(ratio) {
                fail(format!(
                    "budget.allocation_ratios.{pool}.{model_key} must be between 0 and 1, got {ratio}"
                ));
            }
            if !funded.insert(model_key.as_str()) {
                fail(format!(
                    "model `{model_key}` is allocated by more than one budget pool"
                ));
            }
            match config.models.get(model_key) {
                None => fail(format!(
                    "budget.allocation_ratios.{pool}.{model_key} does not name a model in [models]"
                )),
                Some(model) if model.unit_cost.cost_for(model.billing_unit) <= 0.0 => {
                    fail(format!(
                        "models.{model_key} needs a positive {} cost to derive a budget capacity",
                        model.billing_unit
                    ))
                }
                Some(_) => {}
            }
        }
        if total > 1.0 + 1e-9 {
            fail(format!(
                "budget.allocation_ratios.{pool} sums to {total:.3}, must not exceed 1.0"
            ));
        }
    }

    let reporting = &config.reporting;
    if reporting.budget_warning_usd < 0.0 {
        fail("reporting.budget_warning_usd must be non-negative".to_string());
    }
    if reporting.total_warning_usd < 0.0 {
        fail("reporting.total_warning_usd must be non-negative".to_string());
    }
    if !(0.0..=1.0).contains(&reporting.low_quota_ratio) {
        fail(format!(
            "reporting.low_quota_ratio must be between 0 and 1, got {}",
            reporting.low_quota_ratio
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
