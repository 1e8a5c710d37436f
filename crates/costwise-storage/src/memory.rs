// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory counter store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use costwise_core::{
    AdapterType, CostwiseError, CounterStore, CounterValue, CounterWrite, HealthStatus,
    PluginAdapter,
};

/// A `CounterStore` held in a map. Batches apply under one lock, so they are
/// atomic with respect to other callers.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, CounterValue>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl PluginAdapter for MemoryCounterStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CostwiseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CostwiseError> {
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, CostwiseError> {
        Ok(match self.entries.lock().await.get(key) {
            Some(CounterValue::Int(v)) => Some(*v),
            _ => None,
        })
    }

    async fn get_str(&self, key: &str) -> Result<Option<String>, CostwiseError> {
        Ok(match self.entries.lock().await.get(key) {
            Some(CounterValue::Text(s)) => Some(s.clone()),
            _ => None,
        })
    }

    async fn write_batch(&self, writes: Vec<CounterWrite>) -> Result<(), CostwiseError> {
        let mut entries = self.entries.lock().await;
        for write in writes {
            entries.insert(write.key, write.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_values_by_kind() {
        let store = MemoryCounterStore::new();
        assert!(store.is_empty().await);

        store
            .write_batch(vec![
                CounterWrite::int("search_daily_usage", 2),
                CounterWrite::text("search_daily_period_anchor", "2026-05-01"),
            ])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get_int("search_daily_usage").await.unwrap(), Some(2));
        assert_eq!(store.get_str("search_daily_usage").await.unwrap(), None);
        assert_eq!(
            store.get_str("search_daily_period_anchor").await.unwrap().as_deref(),
            Some("2026-05-01")
        );
    }
}
