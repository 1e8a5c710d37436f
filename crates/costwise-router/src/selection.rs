// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The selection cascade.
//!
//! A pure function of (category, image flag, ledger snapshot, excluded
//! providers). First admissible branch wins:
//!
//! 1. Image present or vision category: premium multimodal model, else the
//!    budget model flagged as a degraded fallback.
//! 2. Current-info category: specialized search model, else the budget text
//!    model, else over budget.
//! 3. Complex category: premium, else budget, else over budget.
//! 4. Anything else: cheapest budget model, else premium, else over budget.
//!
//! A model is admissible only when every scope it would be charged to, in
//! every active layer, has capacity left after in-flight reservations.

use std::collections::BTreeSet;

use costwise_config::model::CostwiseConfig;
use costwise_core::{
    Capability, CostUnit, ProviderModel, QualityTier, ScopeCharge, Selection, TaskCategory,
};
use costwise_cost::{LayerSnapshot, LedgerSnapshot, ScopeUsage};
use tracing::{debug, info};

use crate::catalog::{TaskCatalog, TaskProfile};
use crate::models::ModelCatalog;

const VISION: &[Capability] = &[Capability::Multimodal];

/// Chooses a model for a task from the current ledger state.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    models: ModelCatalog,
}

impl SelectionEngine {
    pub fn new(models: ModelCatalog) -> Self {
        Self { models }
    }

    pub fn from_config(config: &CostwiseConfig) -> Self {
        Self::new(ModelCatalog::from_config(config))
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub fn select(
        &self,
        category: TaskCategory,
        has_image: bool,
        snapshot: &LedgerSnapshot,
    ) -> Selection {
        self.select_excluding(category, has_image, snapshot, &BTreeSet::new())
    }

    /// Like [`select`](Self::select), ignoring models served by `excluded`
    /// providers.
    pub fn select_excluding(
        &self,
        category: TaskCategory,
        has_image: bool,
        snapshot: &LedgerSnapshot,
        excluded: &BTreeSet<String>,
    ) -> Selection {
        let profile = TaskCatalog::profile(category);
        let pick = Pick {
            models: &self.models,
            category,
            has_image,
            snapshot,
            excluded,
        };

        let selection = if has_image || profile.needs_vision() {
            pick.vision()
        } else if profile.current_info {
            pick.research(&profile)
        } else if profile.complex {
            pick.complex(&profile)
        } else {
            pick.default_text(&profile)
        };

        debug!(
            category = %category,
            model = selection.model.as_ref().map(|m| m.key.as_str()).unwrap_or("none"),
            tier = %selection.quality_tier,
            within_limits = selection.within_limits,
            cost = selection.estimated_cost,
            "selection made"
        );
        selection
    }
}

/// Per-call selection context.
struct Pick<'a> {
    models: &'a ModelCatalog,
    category: TaskCategory,
    /// Image bytes are attached; only then is the image scope charged.
    has_image: bool,
    snapshot: &'a LedgerSnapshot,
    excluded: &'a BTreeSet<String>,
}

impl<'a> Pick<'a> {
    fn vision(&self) -> Selection {
        let with_image = self.has_image;
        let unit = if with_image {
            CostUnit::PerImage
        } else {
            CostUnit::PerRequest
        };
        if let Some(model) = self.first_open(QualityTier::Premium, VISION, with_image) {
            let reason = format!(
                "vision task on premium model {} ({})",
                model.key,
                usage_note(self.snapshot, model, with_image)
            );
            return self.admit(model, QualityTier::Premium, unit, with_image, reason);
        }

        let exhausted = self
            .cheapest(QualityTier::Premium, VISION)
            .map(|m| usage_note(self.snapshot, m, with_image))
            .unwrap_or_else(|| "no vision model available".to_string());
        let fallback = self
            .first_open(QualityTier::Budget, &[], false)
            .or_else(|| self.cheapest(QualityTier::Budget, &[]));
        if let Some(model) = fallback {
            info!(
                category = %self.category,
                model = %model.key,
                "vision task degraded to budget model"
            );
            let reason = format!(
                "premium vision capacity exhausted ({exhausted}); degraded to budget model {}",
                model.key
            );
            return self.build(model, QualityTier::Budget, unit, with_image, false, reason);
        }

        match self.cheapest(QualityTier::Premium, VISION) {
            Some(model) => self.over_budget(
                model,
                unit,
                with_image,
                format!("vision capacity exhausted ({exhausted}) and no budget model to fall back to"),
            ),
            None => self.nothing(),
        }
    }

    fn research(&self, profile: &TaskProfile) -> Selection {
        if let Some(model) = self.first_open(QualityTier::Specialized, profile.required, false) {
            let reason = format!(
                "current-info task on search model {} ({})",
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Specialized, CostUnit::PerSearch, false, reason);
        }

        let search = self.cheapest(QualityTier::Specialized, profile.required);
        let exhausted = search
            .map(|m| usage_note(self.snapshot, m, false))
            .unwrap_or_else(|| "no search model available".to_string());
        if let Some(model) = self.first_open(QualityTier::Budget, &[], false) {
            info!(
                category = %self.category,
                model = %model.key,
                "current-info task answered without live search"
            );
            let reason = format!(
                "search capacity exhausted ({exhausted}); budget model {} ({}) answers without live data",
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Budget, CostUnit::PerRequest, false, reason);
        }

        let reason = format!("search and budget capacity exhausted ({exhausted})");
        match self.cheapest(QualityTier::Budget, &[]) {
            Some(model) => self.over_budget(model, CostUnit::PerRequest, false, reason),
            None => match search {
                Some(model) => self.over_budget(model, CostUnit::PerSearch, false, reason),
                None => self.nothing(),
            },
        }
    }

    fn complex(&self, profile: &TaskProfile) -> Selection {
        if let Some(model) = self.first_open(QualityTier::Premium, profile.required, false) {
            let reason = format!(
                "complex task on premium model {} ({})",
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Premium, profile.unit, false, reason);
        }

        let exhausted = self
            .cheapest(QualityTier::Premium, profile.required)
            .map(|m| usage_note(self.snapshot, m, false))
            .unwrap_or_else(|| "no premium model available".to_string());
        if let Some(model) = self.first_open(QualityTier::Budget, &[], false) {
            info!(
                category = %self.category,
                model = %model.key,
                "complex task downgraded to budget model"
            );
            let reason = format!(
                "premium capacity exhausted ({exhausted}); downgraded to budget model {} ({})",
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Budget, profile.unit, false, reason);
        }

        let reason = format!("premium and budget capacity exhausted ({exhausted})");
        match self
            .cheapest(QualityTier::Budget, &[])
            .or_else(|| self.cheapest(QualityTier::Premium, profile.required))
        {
            Some(model) => self.over_budget(model, profile.unit, false, reason),
            None => self.nothing(),
        }
    }

    fn default_text(&self, profile: &TaskProfile) -> Selection {
        if let Some(model) = self.first_open(QualityTier::Budget, profile.required, false) {
            let reason = format!(
                "{} task on budget model {} ({})",
                self.category,
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Budget, profile.unit, false, reason);
        }

        let exhausted = self
            .cheapest(QualityTier::Budget, profile.required)
            .map(|m| usage_note(self.snapshot, m, false))
            .unwrap_or_else(|| "no budget model available".to_string());
        if let Some(model) = self.first_open(QualityTier::Premium, &[], false) {
            info!(
                category = %self.category,
                model = %model.key,
                "budget capacity exhausted, escalating to premium"
            );
            let reason = format!(
                "budget capacity exhausted ({exhausted}); escalated to premium model {} ({})",
                model.key,
                usage_note(self.snapshot, model, false)
            );
            return self.admit(model, QualityTier::Premium, profile.unit, false, reason);
        }

        let reason = format!("budget and premium capacity exhausted ({exhausted})");
        match self
            .cheapest(QualityTier::Budget, profile.required)
            .or_else(|| self.cheapest(QualityTier::Premium, &[]))
        {
            Some(model) => self.over_budget(model, profile.unit, false, reason),
            None => self.nothing(),
        }
    }

    /// Cheapest candidate whose charged scopes all have capacity.
    fn first_open(
        &self,
        tier: QualityTier,
        required: &'a [Capability],
        with_image: bool,
    ) -> Option<&'a ProviderModel> {
        self.models
            .candidates(tier, required, self.excluded)
            .find(|m| blocking_scope(self.snapshot, m, with_image).is_none())
    }

    fn cheapest(&self, tier: QualityTier, required: &'a [Capability]) -> Option<&'a ProviderModel> {
        self.models.candidates(tier, required, self.excluded).next()
    }

    fn admit(
        &self,
        model: &ProviderModel,
        tier: QualityTier,
        unit: CostUnit,
        with_image: bool,
        reason: String,
    ) -> Selection {
        self.build(model, tier, unit, with_image, true, reason)
    }

    fn over_budget(
        &self,
        model: &ProviderModel,
        unit: CostUnit,
        with_image: bool,
        reason: String,
    ) -> Selection {
        info!(
            category = %self.category,
            model = %model.key,
            "all capacity exhausted, selection is over budget"
        );
        self.build(model, QualityTier::OverBudget, unit, with_image, false, reason)
    }

    fn nothing(&self) -> Selection {
        Selection::none(
            self.category,
            format!("no model available for {}", self.category),
        )
    }

    fn build(
        &self,
        model: &ProviderModel,
        tier: QualityTier,
        unit: CostUnit,
        with_image: bool,
        within_limits: bool,
        reason: String,
    ) -> Selection {
        // Free-quota layers bill nothing while the request fits.
        let estimated_cost = if within_limits && !self.snapshot.has_dollar_scopes() {
            0.0
        } else {
            model.unit_cost.cost_for(unit)
        };
        let charges = self
            .snapshot
            .layers
            .iter()
            .flat_map(|layer| {
                charged_scopes(layer, &model.key, with_image)
                    .into_iter()
                    .map(|scope| ScopeCharge {
                        layer: layer.layer,
                        scope: scope.name.clone(),
                    })
            })
            .collect();

        Selection {
            category: self.category,
            model: Some(model.clone()),
            estimated_cost,
            within_limits,
            quality_tier: tier,
            reason,
            cost_unit: unit,
            charges,
        }
    }
}

/// Scopes on `layer` a request served by `model_key` is charged to.
fn charged_scopes<'s>(
    layer: &'s LayerSnapshot,
    model_key: &str,
    with_image: bool,
) -> Vec<&'s ScopeUsage> {
    let mut scopes: Vec<&ScopeUsage> = layer.model_scope(model_key).into_iter().collect();
    if with_image && let Some(image) = layer.image_scope() {
        scopes.push(image);
    }
    scopes
}

fn blocking_scope<'s>(
    snapshot: &'s LedgerSnapshot,
    model: &ProviderModel,
    with_image: bool,
) -> Option<&'s ScopeUsage> {
    snapshot
        .layers
        .iter()
        .flat_map(|layer| charged_scopes(layer, &model.key, with_image))
        .find(|scope| scope.available() == 0)
}

/// `scope used/cap` for every scope the model would be charged to.
fn usage_note(snapshot: &LedgerSnapshot, model: &ProviderModel, with_image: bool) -> String {
    let parts: Vec<String> = snapshot
        .layers
        .iter()
        .flat_map(|layer| charged_scopes(layer, &model.key, with_image))
        .map(|s| format!("{} {}/{}", s.name, s.used, s.cap))
        .collect();
    if parts.is_empty() {
        "unmetered".to_string()
    } else {
        parts.join(", ")
    }
}
