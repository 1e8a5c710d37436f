// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with pre-configured responses,
//! so routing tests run without external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use costwise_core::{
    AdapterType, CostwiseError, HealthStatus, ImageAnalysis, PluginAdapter, ProviderAdapter,
};

/// A mock provider that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
pub struct MockProvider {
    name: String,
    responses: Mutex<VecDeque<String>>,
    available: AtomicBool,
    failures: AtomicUsize,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create an available mock registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_responses(name, Vec::new())
    }

    /// Create a mock pre-loaded with the given responses.
    pub fn with_responses(name: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::from(responses)),
            available: AtomicBool::new(true),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Add a response to the end of the queue.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().await.push_back(text.into());
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `count` calls fail with a provider error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model ids of every call received, in order.
    pub async fn models_called(&self) -> Vec<String> {
        self.models.lock().await.clone()
    }

    async fn begin_call(&self, model_id: &str) -> Result<(), CostwiseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().await.push(model_id.to_string());
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(CostwiseError::Provider {
                message: format!("{}: injected failure", self.name),
                source: None,
            });
        }
        Ok(())
    }

    /// Pop the next response, or return the default.
    async fn next_response(&self) -> String {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock response".to_string())
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CostwiseError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("marked unavailable".to_string()))
        }
    }

    async fn shutdown(&self) -> Result<(), CostwiseError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn generate_text(&self, model_id: &str, _prompt: &str) -> Result<String, CostwiseError> {
        self.begin_call(model_id).await?;
        Ok(self.next_response().await)
    }

    async fn analyze_image(
        &self,
        model_id: &str,
        _prompt: &str,
        image: &[u8],
    ) -> Result<ImageAnalysis, CostwiseError> {
        self.begin_call(model_id).await?;
        Ok(ImageAnalysis {
            summary: self.next_response().await,
            labels: vec![format!("{} bytes", image.len())],
            confidence: Some(0.9),
        })
    }
}
