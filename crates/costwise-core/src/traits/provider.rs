// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider execution adapter.

use async_trait::async_trait;

use crate::error::CostwiseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ImageAnalysis;

/// Issues the actual network call to a model vendor.
///
/// Retries, backoff, and timeouts belong to the implementation; the router
/// treats any `Err` as a failed call and never retries it.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Whether the provider can serve requests right now (credential present,
    /// not disabled).
    async fn is_available(&self) -> bool;

    /// Generate text for `prompt` with the given vendor model.
    async fn generate_text(&self, model_id: &str, prompt: &str) -> Result<String, CostwiseError>;

    /// Analyze `image` guided by `prompt` with the given vendor model.
    async fn analyze_image(
        &self,
        model_id: &str,
        prompt: &str,
        image: &[u8],
    ) -> Result<ImageAnalysis, CostwiseError>;
}
