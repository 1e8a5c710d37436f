// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Costwise configuration system.

use costwise_config::diagnostic::ConfigError;
use costwise_config::model::CostwiseConfig;
use costwise_config::{load_and_validate_str, load_config_from_str, OverBudgetPolicy};
use costwise_core::{CostUnit, LayerKind, QualityTier};

fn validation_messages(errors: &[ConfigError]) -> Vec<String> {
    errors
        .iter()
        .filter_map(|e| match e {
            ConfigError::Validation { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn defaults_describe_the_reference_deployment() {
    let config = CostwiseConfig::default();

    assert_eq!(config.router.active_layers, vec![LayerKind::Paid]);
    assert_eq!(config.router.over_budget, OverBudgetPolicy::Execute);
    assert_eq!(config.quota.daily_caps["flash"], 250);
    assert_eq!(config.quota.daily_caps["flash_lite"], 1000);
    assert_eq!(config.quota.daily_caps["image"], 100);
    assert_eq!(config.quota.daily_caps["search"], 33);
    assert_eq!(config.budget.monthly_budgets["gemini"], 5.0);
    assert_eq!(config.budget.allocation_ratios["gemini"]["flash"], 0.70);
    assert_eq!(config.models["flash"].tier, QualityTier::Premium);
    assert_eq!(config.models["flash_lite"].tier, QualityTier::Budget);
    assert_eq!(config.models["search"].billing_unit, CostUnit::PerSearch);
    assert_eq!(config.storage.database_path, "costwise.db");
    assert!(config.storage.wal_mode);
    assert!((config.budget.total_budget() - 10.0).abs() < 1e-9);
}

#[test]
fn defaults_validate() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.models.len(), 3);
}

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[logging]
log_level = "debug"

[storage]
database_path = "/tmp/costwise-test.db"
wal_mode = false

[router]
active_layers = ["free", "paid"]
over_budget = "abort"

[quota.daily_caps]
flash = 10
flash_lite = 20

[budget.monthly_budgets]
gemini = 12.5

[budget.allocation_ratios.gemini]
flash = 0.5
flash_lite = 0.5

[providers.gemini]
api_key = "g-123"

[reporting]
budget_warning_usd = 0.5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.logging.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/costwise-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(
        config.router.active_layers,
        vec![LayerKind::Free, LayerKind::Paid]
    );
    assert_eq!(config.router.over_budget, OverBudgetPolicy::Abort);
    assert_eq!(config.quota.daily_caps["flash"], 10);
    // Defaults for keys not mentioned are kept.
    assert_eq!(config.quota.daily_caps["image"], 100);
    assert_eq!(config.budget.monthly_budgets["gemini"], 12.5);
    assert_eq!(config.budget.allocation_ratios["gemini"]["flash"], 0.5);
    assert!(config.providers["gemini"].is_configured());
    assert!(!config.providers["perplexity"].is_configured());
    assert_eq!(config.reporting.budget_warning_usd, 0.5);
}

#[test]
fn custom_model_entry_merges_into_catalog() {
    let toml = r#"
[models.pro]
provider = "gemini"
model_id = "gemini-2.5-pro"
tier = "premium"
capabilities = ["multimodal", "complex_reasoning"]
unit_cost = { per_request = 0.05 }
"#;

    let config = load_and_validate_str(toml).expect("custom model should validate");
    assert_eq!(config.models.len(), 4);
    let pro = &config.models["pro"];
    assert_eq!(pro.model_id, "gemini-2.5-pro");
    assert_eq!(pro.billing_unit, CostUnit::PerRequest);
    assert!((pro.unit_cost.per_request - 0.05).abs() < f64::EPSILON);
}

#[test]
fn unknown_key_in_section_is_rejected_with_suggestion() {
    let toml = r#"
[storage]
databse_path = "x.db"
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should fail");
    let unknown = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => Some((key.clone(), suggestion.clone())),
        _ => None,
    });
    let (key, suggestion) = unknown.expect("should report UnknownKey");
    assert_eq!(key, "databse_path");
    assert_eq!(suggestion.as_deref(), Some("database_path"));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[budgets]\nx = 1\n").expect_err("should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "budgets")));
}

#[test]
fn invalid_policy_value_is_reported() {
    let errors =
        load_and_validate_str("[router]\nover_budget = \"block\"\n").expect_err("should fail");
    assert!(!errors.is_empty());
}

#[test]
fn validation_catches_negative_budget() {
    let toml = r#"
[budget.monthly_budgets]
gemini = -5.0
"#;
    let errors = load_and_validate_str(toml).expect_err("negative budget should fail");
    let messages = validation_messages(&errors);
    assert!(
        messages.iter().any(|m| m.contains("monthly_budgets.gemini")),
        "got {messages:?}"
    );
}

#[test]
fn validation_catches_ratios_over_one() {
    let toml = r#"
[budget.allocation_ratios.gemini]
flash = 0.8
flash_lite = 0.4
"#;
    let errors = load_and_validate_str(toml).expect_err("ratios over 1 should fail");
    let messages = validation_messages(&errors);
    assert!(messages.iter().any(|m| m.contains("must not exceed 1.0")));
}

#[test]
fn validation_catches_allocation_to_unknown_model() {
    let toml = r#"
[budget.allocation_ratios.perplexity]
deep_research = 0.5
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown model should fail");
    let messages = validation_messages(&errors);
    assert!(messages.iter().any(|m| m.contains("deep_research")));
}

#[test]
fn validation_catches_free_model_in_paid_pool() {
    let toml = r#"
[models.local]
provider = "ollama"
model_id = "llama3"
tier = "budget"

[budget.monthly_budgets]
local = 1.0

[budget.allocation_ratios.local]
local = 1.0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero unit cost should fail");
    let messages = validation_messages(&errors);
    assert!(messages.iter().any(|m| m.contains("positive per_request cost")));
}

#[test]
fn validation_catches_empty_layers_and_bad_caps() {
    let toml = r#"
[router]
active_layers = []

[quota.daily_caps]
video = 5
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    let messages = validation_messages(&errors);
    assert!(messages.iter().any(|m| m.contains("active_layers")));
    assert!(messages.iter().any(|m| m.contains("daily_caps.video")));
}

#[test]
fn validation_collects_all_errors() {
    let toml = r#"
[logging]
log_level = "loud"

[storage]
database_path = " "

[reporting]
low_quota_ratio = 1.5
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert_eq!(validation_messages(&errors).len(), 3);
}

#[test]
fn over_budget_tier_is_not_a_model_tier() {
    let toml = r#"
[models.flash]
tier = "over_budget"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(validation_messages(&errors)
        .iter()
        .any(|m| m.contains("models.flash.tier")));
}

#[test]
fn env_style_override_sets_provider_key() {
    use figment::{providers::Serialized, Figment};

    let config: CostwiseConfig = Figment::new()
        .merge(Serialized::defaults(CostwiseConfig::default()))
        .merge(("providers.perplexity.api_key", "pplx-from-env"))
        .extract()
        .expect("dot-notation override should apply");

    assert!(config.providers["perplexity"].is_configured());
    assert_eq!(config.unconfigured_providers(), vec!["gemini".to_string()]);
}

#[test]
fn blank_api_key_leaves_provider_unconfigured() {
    let toml = r#"
[providers.gemini]
api_key = "   "

[providers.perplexity]
api_key = "pplx"
enabled = false
"#;
    let config = load_and_validate_str(toml).unwrap();
    assert_eq!(
        config.unconfigured_providers(),
        vec!["gemini".to_string(), "perplexity".to_string()]
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[router]\nactive_layer = [\"paid\"]\n").unwrap_err();
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    handler
        .render_report(&mut out, &errors[0] as &dyn Diagnostic)
        .expect("should render");
    assert!(out.contains("active_layer"));
}
