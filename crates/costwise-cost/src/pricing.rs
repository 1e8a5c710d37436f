// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-based call cost estimates.

use costwise_core::{CostUnit, ProviderModel};
use serde::{Deserialize, Serialize};

/// Expected token volume of one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenEstimate {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Dollar cost of one call on `model` with the given token volume.
///
/// Token charges use the model's per-million prices. Calls billed per image
/// or per search add that unit price on top.
pub fn estimate_call_cost(model: &ProviderModel, tokens: &TokenEstimate, unit: CostUnit) -> f64 {
    let input = tokens.input_tokens as f64 / 1_000_000.0 * model.pricing.input_per_mtok;
    let output = tokens.output_tokens as f64 / 1_000_000.0 * model.pricing.output_per_mtok;
    let surcharge = match unit {
        CostUnit::PerRequest => 0.0,
        CostUnit::PerImage => model.unit_cost.per_image,
        CostUnit::PerSearch => model.unit_cost.per_search,
    };
    (input + output + surcharge).max(0.0)
}
