// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Costwise router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Maps (`daily_caps`, `models`, ...) are keyed by
//! user-chosen names and accept any key; validation checks they line up.

use std::collections::BTreeMap;

use costwise_core::{Capability, CostUnit, LayerKind, QualityTier, TokenPricing, UnitCost};
use serde::{Deserialize, Serialize};

/// Key in `quota.daily_caps` that caps image requests rather than a model.
pub const IMAGE_CAP_KEY: &str = "image";

/// Top-level Costwise configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostwiseConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Counter store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Layer selection and over-budget policy.
    #[serde(default)]
    pub router: RouterConfig,

    /// Free-tier daily request caps.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Paid-tier monthly budgets and allocation ratios.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Model catalog keyed by model key.
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelConfig>,

    /// Provider credentials keyed by provider name.
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Cost report thresholds.
    #[serde(default)]
    pub reporting: ReportingConfig,
}

impl Default for CostwiseConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            router: RouterConfig::default(),
            quota: QuotaConfig::default(),
            budget: BudgetConfig::default(),
            models: default_models(),
            providers: default_providers(),
            reporting: ReportingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "costwise.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// What the router does with a selection that is over its limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverBudgetPolicy {
    /// Run the degraded selection anyway.
    #[default]
    Execute,
    /// Fail with `BudgetExhausted` without calling the provider.
    Abort,
}

impl OverBudgetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverBudgetPolicy::Execute => "execute",
            OverBudgetPolicy::Abort => "abort",
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Ledger layers every selection must fit in.
    #[serde(default = "default_active_layers")]
    pub active_layers: Vec<LayerKind>,

    #[serde(default)]
    pub over_budget: OverBudgetPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            active_layers: default_active_layers(),
            over_budget: OverBudgetPolicy::default(),
        }
    }
}

fn default_active_layers() -> Vec<LayerKind> {
    vec![LayerKind::Paid]
}

/// Free-tier daily request caps.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Requests per day keyed by model key, plus `image` for image requests.
    #[serde(default = "default_daily_caps")]
    pub daily_caps: BTreeMap<String, u64>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_caps: default_daily_caps(),
        }
    }
}

fn default_daily_caps() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("flash".to_string(), 250),
        ("flash_lite".to_string(), 1000),
        (IMAGE_CAP_KEY.to_string(), 100),
        ("search".to_string(), 33),
    ])
}

/// Paid-tier monthly budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Monthly dollar budget keyed by pool name.
    #[serde(default = "default_monthly_budgets")]
    pub monthly_budgets: BTreeMap<String, f64>,

    /// Share of each pool's budget allotted to each model key.
    #[serde(default = "default_allocation_ratios")]
    pub allocation_ratios: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            monthly_budgets: default_monthly_budgets(),
            allocation_ratios: default_allocation_ratios(),
        }
    }
}

fn default_monthly_budgets() -> BTreeMap<String, f64> {
    BTreeMap::from([("gemini".to_string(), 5.0), ("perplexity".to_string(), 5.0)])
}

fn default_allocation_ratios() -> BTreeMap<String, BTreeMap<String, f64>> {
    BTreeMap::from([
        (
            "gemini".to_string(),
            BTreeMap::from([("flash".to_string(), 0.70), ("flash_lite".to_string(), 0.30)]),
        ),
        (
            "perplexity".to_string(),
            BTreeMap::from([("search".to_string(), 1.0)]),
        ),
    ])
}

impl BudgetConfig {
    /// Total of all monthly pool budgets.
    pub fn total_budget(&self) -> f64 {
        self.monthly_budgets.values().sum()
    }

    /// Pool that funds `model_key`, if any.
    pub fn pool_for(&self, model_key: &str) -> Option<(&str, f64)> {
        self.allocation_ratios.iter().find_map(|(pool, ratios)| {
            ratios
                .get(model_key)
                .map(|ratio| (pool.as_str(), *ratio))
        })
    }
}

/// One catalog model.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Provider adapter name.
    pub provider: String,

    /// Vendor model identifier.
    pub model_id: String,

    pub tier: QualityTier,

    #[serde(default)]
    pub capabilities: Vec<Capability>,

    #[serde(default)]
    pub unit_cost: UnitCost,

    /// Unit a paid budget is converted into capacity with.
    #[serde(default)]
    pub billing_unit: CostUnit,

    #[serde(default)]
    pub pricing: TokenPricing,
}

fn default_models() -> BTreeMap<String, ModelConfig> {
    BTreeMap::from([
        (
            "flash".to_string(),
            ModelConfig {
                provider: "gemini".to_string(),
                model_id: "gemini-2.5-flash-latest".to_string(),
                tier: QualityTier::Premium,
                capabilities: vec![
                    Capability::Multimodal,
                    Capability::ImageGeneration,
                    Capability::ComplexReasoning,
                    Capability::HighQualityText,
                ],
                unit_cost: UnitCost {
                    per_request: 0.015,
                    per_image: 0.0,
                    per_search: 0.0,
                },
                billing_unit: CostUnit::PerRequest,
                pricing: TokenPricing {
                    input_per_mtok: 0.30,
                    output_per_mtok: 2.50,
                },
            },
        ),
        (
            "flash_lite".to_string(),
            ModelConfig {
                provider: "gemini".to_string(),
                model_id: "gemini-2.5-flash-8b".to_string(),
                tier: QualityTier::Budget,
                capabilities: vec![Capability::BasicText, Capability::FastInference],
                unit_cost: UnitCost {
                    per_request: 0.004,
                    per_image: 0.0,
                    per_search: 0.0,
                },
                billing_unit: CostUnit::PerRequest,
                pricing: TokenPricing {
                    input_per_mtok: 0.10,
                    output_per_mtok: 0.40,
                },
            },
        ),
        (
            "search".to_string(),
            ModelConfig {
                provider: "perplexity".to_string(),
                model_id: "sonar".to_string(),
                tier: QualityTier::Specialized,
                capabilities: vec![
                    Capability::CurrentInfo,
                    Capability::WebSearch,
                    Capability::Research,
                ],
                unit_cost: UnitCost {
                    per_request: 0.0,
                    per_image: 0.0,
                    per_search: 0.005,
                },
                billing_unit: CostUnit::PerSearch,
                pricing: TokenPricing {
                    input_per_mtok: 1.0,
                    output_per_mtok: 1.0,
                },
            },
        ),
    ])
}

/// Provider credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` or blank leaves the provider unavailable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: default_enabled(),
        }
    }
}

impl ProviderConfig {
    /// Enabled and holding a non-blank credential.
    pub fn is_configured(&self) -> bool {
        self.enabled
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([
        ("gemini".to_string(), ProviderConfig::default()),
        ("perplexity".to_string(), ProviderConfig::default()),
    ])
}

/// Cost report warning thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportingConfig {
    /// Warn when a pool has less than this many dollars left.
    #[serde(default = "default_budget_warning_usd")]
    pub budget_warning_usd: f64,

    /// Warn when all pools together have less than this many dollars left.
    #[serde(default = "default_total_warning_usd")]
    pub total_warning_usd: f64,

    /// Warn when a daily scope has less than this fraction of its cap left.
    #[serde(default = "default_low_quota_ratio")]
    pub low_quota_ratio: f64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            budget_warning_usd: default_budget_warning_usd(),
            total_warning_usd: default_total_warning_usd(),
            low_quota_ratio: default_low_quota_ratio(),
        }
    }
}

fn default_budget_warning_usd() -> f64 {
    1.0
}

fn default_total_warning_usd() -> f64 {
    2.0
}

fn default_low_quota_ratio() -> f64 {
    0.10
}

impl CostwiseConfig {
    /// Provider names that must not be routed to: disabled or without a credential.
    pub fn unconfigured_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .values()
            .map(|m| m.provider.clone())
            .filter(|p| !self.providers.get(p).is_some_and(ProviderConfig::is_configured))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
