// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The configured model catalog, cheapest first.

use std::collections::BTreeSet;

use costwise_config::model::CostwiseConfig;
use costwise_core::{Capability, ProviderModel, QualityTier};

/// Immutable set of selectable models.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ProviderModel>,
}

impl ModelCatalog {
    /// Orders models by billing cost, then by key.
    pub fn new(mut models: Vec<ProviderModel>) -> Self {
        models.sort_by(|a, b| {
            a.billing_cost()
                .total_cmp(&b.billing_cost())
                .then_with(|| a.key.cmp(&b.key))
        });
        Self { models }
    }

    pub fn from_config(config: &CostwiseConfig) -> Self {
        Self::new(
            config
                .models
                .iter()
                .map(|(key, m)| ProviderModel {
                    key: key.clone(),
                    provider: m.provider.clone(),
                    model_id: m.model_id.clone(),
                    tier: m.tier,
                    capabilities: m.capabilities.iter().copied().collect(),
                    unit_cost: m.unit_cost,
                    billing_unit: m.billing_unit,
                    pricing: m.pricing,
                })
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&ProviderModel> {
        self.models.iter().find(|m| m.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderModel> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models of `tier` offering every `required` capability whose provider
    /// is not excluded, cheapest first.
    pub fn candidates<'a>(
        &'a self,
        tier: QualityTier,
        required: &'a [Capability],
        excluded: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a ProviderModel> + 'a {
        self.models.iter().filter(move |m| {
            m.tier == tier && m.has_all(required) && !excluded.contains(&m.provider)
        })
    }

    /// Distinct provider names.
    pub fn providers(&self) -> BTreeSet<&str> {
        self.models.iter().map(|m| m.provider.as_str()).collect()
    }
}
