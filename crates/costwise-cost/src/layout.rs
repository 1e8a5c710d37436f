// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scope layout per ledger layer.
//!
//! Free layer: one `<model>_daily` request counter per entry in
//! `quota.daily_caps`, plus `image_daily` for image requests.
//! Paid layer: one `<model>_monthly_spend` counter per model named in
//! `budget.allocation_ratios`, with capacity
//! `floor(budget * ratio / unit_cost)`.

use costwise_config::model::{CostwiseConfig, IMAGE_CAP_KEY};
use costwise_core::{LayerKind, PeriodKind, QualityTier};
use serde::Serialize;

/// Scope counting image requests on the free layer.
pub const IMAGE_SCOPE: &str = "image_daily";

/// Absorbs binary rounding in `budget * ratio / cost` (5.0 / 0.005 must give
/// 1000, not 999) without changing the floor semantics.
const CAPACITY_EPSILON: f64 = 1e-9;

/// What a scope counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeTarget {
    /// Requests served by the catalog model with this key.
    Model(String),
    /// Requests carrying an image, whatever the model.
    Images,
}

/// Static definition of one quota scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeDef {
    pub name: String,
    pub target: ScopeTarget,
    /// Admitted units per period.
    pub cap: u64,
    pub period: PeriodKind,
    /// Dollar cost of one unit, for dollar-denominated scopes.
    pub unit_cost_usd: Option<f64>,
    /// Budget pool funding this scope.
    pub pool: Option<String>,
    /// Quality tier of the counted model.
    pub tier: Option<QualityTier>,
}

/// Name of the scope counting `model_key` on `layer`.
pub fn scope_name(layer: LayerKind, model_key: &str) -> String {
    match layer {
        LayerKind::Free => format!("{model_key}_daily"),
        LayerKind::Paid => format!("{model_key}_monthly_spend"),
    }
}

/// Whole units a dollar allocation buys.
///
/// Lossy by design: a fractional remainder of budget never buys a unit.
pub fn capacity_from_budget(budget_usd: f64, ratio: f64, unit_cost_usd: f64) -> u64 {
    if unit_cost_usd <= 0.0 || budget_usd <= 0.0 || ratio <= 0.0 {
        return 0;
    }
    let units = (budget_usd * ratio / unit_cost_usd + CAPACITY_EPSILON).floor();
    if units.is_finite() { units as u64 } else { 0 }
}

/// Scopes kept by `layer` under `config`.
pub fn scopes_for(layer: LayerKind, config: &CostwiseConfig) -> Vec<ScopeDef> {
    match layer {
        LayerKind::Free => free_tier_scopes(config),
        LayerKind::Paid => paid_tier_scopes(config),
    }
}

fn free_tier_scopes(config: &CostwiseConfig) -> Vec<ScopeDef> {
    config
        .quota
        .daily_caps
        .iter()
        .map(|(key, cap)| {
            if key == IMAGE_CAP_KEY {
                ScopeDef {
                    name: IMAGE_SCOPE.to_string(),
                    target: ScopeTarget::Images,
                    cap: *cap,
                    period: PeriodKind::Daily,
                    unit_cost_usd: None,
                    pool: None,
                    tier: None,
                }
            } else {
                ScopeDef {
                    name: scope_name(LayerKind::Free, key),
                    target: ScopeTarget::Model(key.clone()),
                    cap: *cap,
                    period: PeriodKind::Daily,
                    unit_cost_usd: None,
                    pool: None,
                    tier: config.models.get(key).map(|m| m.tier),
                }
            }
        })
        .collect()
}

fn paid_tier_scopes(config: &CostwiseConfig) -> Vec<ScopeDef> {
    let mut scopes = Vec::new();
    for (pool, ratios) in &config.budget.allocation_ratios {
        let budget = config
            .budget
            .monthly_budgets
            .get(pool)
            .copied()
            .unwrap_or(0.0);
        for (key, ratio) in ratios {
            let Some(model) = config.models.get(key) else {
                continue;
            };
            let unit_cost = model.unit_cost.cost_for(model.billing_unit);
            scopes.push(ScopeDef {
                name: scope_name(LayerKind::Paid, key),
                target: ScopeTarget::Model(key.clone()),
                cap: capacity_from_budget(budget, *ratio, unit_cost),
                period: PeriodKind::Monthly,
                unit_cost_usd: Some(unit_cost),
                pool: Some(pool.clone()),
                tier: Some(model.tier),
            });
        }
    }
    scopes
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwise_config::load_config_from_str;

    fn cap_of(scopes: &[ScopeDef], name: &str) -> u64 {
        scopes
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.cap)
            .unwrap_or_else(|| panic!("missing scope {name}"))
    }

    #[test]
    fn default_paid_capacities_follow_ratio_split() {
        let config = CostwiseConfig::default();
        let scopes = scopes_for(LayerKind::Paid, &config);
        // $5 * 0.7 / $0.015 = 233.3, $5 * 0.3 / $0.004 = 375, $5 / $0.005 = 1000
        assert_eq!(cap_of(&scopes, "flash_monthly_spend"), 233);
        assert_eq!(cap_of(&scopes, "flash_lite_monthly_spend"), 375);
        assert_eq!(cap_of(&scopes, "search_monthly_spend"), 1000);
    }

    #[test]
    fn full_allocation_capacities() {
        let config = load_config_from_str(
            r#"
[budget.allocation_ratios.gemini]
flash = 1.0
flash_lite = 0.0
"#,
        )
        .unwrap();
        let scopes = scopes_for(LayerKind::Paid, &config);
        assert_eq!(cap_of(&scopes, "flash_monthly_spend"), 333);
        assert_eq!(cap_of(&scopes, "search_monthly_spend"), 1000);
        assert_eq!(cap_of(&scopes, "flash_lite_monthly_spend"), 0);
    }

    #[test]
    fn free_layer_has_image_scope() {
        let scopes = scopes_for(LayerKind::Free, &CostwiseConfig::default());
        assert_eq!(cap_of(&scopes, "flash_daily"), 250);
        assert_eq!(cap_of(&scopes, "flash_lite_daily"), 1000);
        assert_eq!(cap_of(&scopes, "search_daily"), 33);
        let image = scopes.iter().find(|s| s.name == IMAGE_SCOPE).unwrap();
        assert_eq!(image.target, ScopeTarget::Images);
        assert_eq!(image.cap, 100);
        assert!(scopes.iter().all(|s| s.unit_cost_usd.is_none()));
    }

    #[test]
    fn capacity_floors_and_guards() {
        assert_eq!(capacity_from_budget(5.0, 0.3, 0.004), 375);
        assert_eq!(capacity_from_budget(1.0, 1.0, 0.3), 3);
        assert_eq!(capacity_from_budget(1.0, 1.0, 0.0), 0);
        assert_eq!(capacity_from_budget(-1.0, 1.0, 0.1), 0);
    }

    proptest::proptest! {
        #[test]
        fn capacity_never_overspends(
            budget in 0.0f64..1000.0,
            ratio in 0.0f64..=1.0,
            cost in 0.0001f64..10.0,
        ) {
            let cap = capacity_from_budget(budget, ratio, cost);
            // Allow the epsilon slack only.
            proptest::prop_assert!((cap as f64) * cost <= budget * ratio + cost * 1e-6);
        }
    }
}
