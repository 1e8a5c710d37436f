// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Costwise router.
//!
//! Provides the error type, the domain types shared by every crate in the
//! workspace, and the adapter traits for the three external collaborators:
//! provider execution, counter persistence, and the wall clock.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CostwiseError;
pub use types::{
    AdapterType, Capability, CostUnit, HealthStatus, ImageAnalysis, LayerKind, PeriodKind,
    ProviderModel, QualityTier, ScopeCharge, Selection, TaskCategory, TokenPricing, UnitCost,
};

pub use traits::{CounterStore, CounterValue, CounterWrite, PluginAdapter, ProviderAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costwise_error_variants_render() {
        let unavailable = CostwiseError::ProviderUnavailable {
            provider: "search".into(),
            reason: "missing api key".into(),
        };
        assert!(unavailable.to_string().contains("missing api key"));

        let exhausted = CostwiseError::ReselectionExhausted {
            category: "current-info-research".into(),
            excluded: vec!["perplexity".into(), "gemini".into()],
        };
        assert_eq!(
            exhausted.to_string(),
            "no available provider for `current-info-research` (excluded: perplexity, gemini)"
        );

        let _storage = CostwiseError::Storage {
            source: Box::new(std::io::Error::other("disk")),
        };
        let _provider = CostwiseError::Provider {
            message: "timeout".into(),
            source: None,
        };
    }

    #[test]
    fn adapter_traits_are_object_safe() {
        fn _provider(_: &dyn ProviderAdapter) {}
        fn _store(_: &dyn CounterStore) {}
        fn _clock(_: &dyn Clock) {}
    }
}
