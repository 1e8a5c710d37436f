// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the catalog, ledger, selection engine, and router.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

/// How often a quota scope resets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Monthly,
}

impl PeriodKind {
    /// Period identifier for `date`: ISO date for daily scopes, month-of-year
    /// number for monthly scopes.
    pub fn period_id(&self, date: NaiveDate) -> String {
        match self {
            PeriodKind::Daily => date.format("%Y-%m-%d").to_string(),
            PeriodKind::Monthly => date.month().to_string(),
        }
    }
}

/// A ledger layer: free daily request quotas or paid monthly dollar budgets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Free,
    Paid,
}

impl LayerKind {
    /// Counter store namespace holding this layer's keys.
    pub fn namespace(&self) -> &'static str {
        match self {
            LayerKind::Free => "free_tier",
            LayerKind::Paid => "paid_tier",
        }
    }

    pub fn period(&self) -> PeriodKind {
        match self {
            LayerKind::Free => PeriodKind::Daily,
            LayerKind::Paid => PeriodKind::Monthly,
        }
    }
}

/// The caller's intent. Parsed from and displayed as kebab-case.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    /// Photo or screenshot understanding.
    VisionAnalysis,
    /// Multi-step plans that need strong reasoning.
    ComplexPlanning,
    /// Trend and progress analysis over user data.
    DataAnalysis,
    /// Long-form content paired with generated imagery.
    RichContent,
    /// Questions that need fresh information from the web.
    CurrentInfoResearch,
    /// Product and ingredient research with cited sources.
    ProductResearch,
    /// Short replies and rewrites.
    SimpleText,
    /// Motivational and coaching messages.
    Coaching,
    /// Parsing free text into lists or records.
    StructuredExtraction,
    /// Anything not covered above.
    General,
}

/// A capability a model offers and a task may require.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Multimodal,
    ImageGeneration,
    ComplexReasoning,
    HighQualityText,
    BasicText,
    FastInference,
    CurrentInfo,
    WebSearch,
    Research,
}

/// Quality tier of a model, and of a routing decision.
///
/// `OverBudget` only ever appears on a [`Selection`]; catalog models are
/// premium, budget, or specialized.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Premium,
    Budget,
    Specialized,
    OverBudget,
}

/// The unit a request is billed in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostUnit {
    #[default]
    PerRequest,
    PerImage,
    PerSearch,
}

/// Reference dollar cost of one unit of work on a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitCost {
    #[serde(default)]
    pub per_request: f64,
    #[serde(default)]
    pub per_image: f64,
    #[serde(default)]
    pub per_search: f64,
}

impl UnitCost {
    /// Cost of one `unit`. Units a model does not price (zero) fall back to
    /// the per-request cost.
    pub fn cost_for(&self, unit: CostUnit) -> f64 {
        let raw = match unit {
            CostUnit::PerRequest => self.per_request,
            CostUnit::PerImage => self.per_image,
            CostUnit::PerSearch => self.per_search,
        };
        if raw > 0.0 { raw } else { self.per_request.max(0.0) }
    }
}

/// Token prices in USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenPricing {
    #[serde(default)]
    pub input_per_mtok: f64,
    #[serde(default)]
    pub output_per_mtok: f64,
}

/// A concrete (provider, model) pair from the model catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderModel {
    /// Catalog key, also the stem of the model's quota scope names.
    pub key: String,
    /// Provider adapter name serving this model.
    pub provider: String,
    /// Vendor model identifier passed to the adapter.
    pub model_id: String,
    pub tier: QualityTier,
    pub capabilities: BTreeSet<Capability>,
    pub unit_cost: UnitCost,
    /// Unit used to convert a dollar budget into a request capacity.
    pub billing_unit: CostUnit,
    pub pricing: TokenPricing,
}

impl ProviderModel {
    pub fn has_all(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }

    /// Dollar cost of one capacity unit in a paid budget.
    pub fn billing_cost(&self) -> f64 {
        self.unit_cost.cost_for(self.billing_unit)
    }
}

/// One scope a committed selection will increment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeCharge {
    pub layer: LayerKind,
    pub scope: String,
}

/// The output of one routing decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub category: TaskCategory,
    /// Chosen model, or `None` when no candidate remains.
    pub model: Option<ProviderModel>,
    pub estimated_cost: f64,
    pub within_limits: bool,
    pub quality_tier: QualityTier,
    pub reason: String,
    /// Unit the estimate was computed in.
    pub cost_unit: CostUnit,
    /// Scopes incremented when this selection is committed.
    pub charges: Vec<ScopeCharge>,
}

impl Selection {
    /// A selection with no usable model.
    pub fn none(category: TaskCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            model: None,
            estimated_cost: 0.0,
            within_limits: false,
            quality_tier: QualityTier::OverBudget,
            reason: reason.into(),
            cost_unit: CostUnit::PerRequest,
            charges: Vec::new(),
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.provider.as_str())
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.model_id.as_str())
    }
}

/// Structured result of an image analysis call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub summary: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn task_category_uses_kebab_case() {
        assert_eq!(TaskCategory::VisionAnalysis.to_string(), "vision-analysis");
        assert_eq!(
            TaskCategory::from_str("current-info-research").unwrap(),
            TaskCategory::CurrentInfoResearch
        );
        let json = serde_json::to_string(&TaskCategory::SimpleText).unwrap();
        assert_eq!(json, "\"simple-text\"");
    }

    #[test]
    fn period_ids() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(PeriodKind::Daily.period_id(date), "2026-03-09");
        assert_eq!(PeriodKind::Monthly.period_id(date), "3");
    }

    #[test]
    fn unpriced_units_fall_back_to_per_request() {
        let cost = UnitCost {
            per_request: 0.004,
            per_image: 0.0,
            per_search: 0.0,
        };
        assert!((cost.cost_for(CostUnit::PerImage) - 0.004).abs() < f64::EPSILON);
        assert!((cost.cost_for(CostUnit::PerSearch) - 0.004).abs() < f64::EPSILON);

        let search = UnitCost {
            per_request: 0.0,
            per_image: 0.0,
            per_search: 0.005,
        };
        assert!((search.cost_for(CostUnit::PerSearch) - 0.005).abs() < f64::EPSILON);
        assert_eq!(search.cost_for(CostUnit::PerRequest), 0.0);
    }

    #[test]
    fn layer_namespaces_are_distinct() {
        assert_ne!(LayerKind::Free.namespace(), LayerKind::Paid.namespace());
        assert_eq!(LayerKind::Free.period(), PeriodKind::Daily);
        assert_eq!(LayerKind::Paid.period(), PeriodKind::Monthly);
        assert_eq!(LayerKind::from_str("paid").unwrap(), LayerKind::Paid);
    }

    #[test]
    fn empty_selection_is_over_budget() {
        let sel = Selection::none(TaskCategory::General, "nothing left");
        assert!(sel.model.is_none());
        assert!(!sel.within_limits);
        assert_eq!(sel.quality_tier, QualityTier::OverBudget);
        assert!(sel.provider().is_none());
    }

    proptest::proptest! {
        #[test]
        fn unit_costs_are_never_negative(
            req in -1.0f64..1.0,
            img in -1.0f64..1.0,
            search in -1.0f64..1.0,
        ) {
            let cost = UnitCost { per_request: req, per_image: img, per_search: search };
            for unit in [CostUnit::PerRequest, CostUnit::PerImage, CostUnit::PerSearch] {
                proptest::prop_assert!(cost.cost_for(unit) >= 0.0);
            }
        }
    }
}
