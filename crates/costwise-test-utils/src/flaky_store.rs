// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter store whose writes can be switched to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use costwise_core::{
    AdapterType, CostwiseError, CounterStore, CounterWrite, HealthStatus, PluginAdapter,
};
use costwise_storage::MemoryCounterStore;

/// An in-memory store that rejects every `write_batch` while
/// [`set_fail_writes`](Self::set_fail_writes) is on. Reads always succeed.
#[derive(Debug, Default)]
pub struct FlakyCounterStore {
    inner: MemoryCounterStore,
    fail_writes: AtomicBool,
    rejected: AtomicUsize,
}

impl FlakyCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Batches rejected so far.
    pub fn rejected_writes(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for FlakyCounterStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CostwiseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("writes failing".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), CostwiseError> {
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FlakyCounterStore {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, CostwiseError> {
        self.inner.get_int(key).await
    }

    async fn get_str(&self, key: &str) -> Result<Option<String>, CostwiseError> {
        self.inner.get_str(key).await
    }

    async fn write_batch(&self, writes: Vec<CounterWrite>) -> Result<(), CostwiseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(CostwiseError::Storage {
                source: "injected write failure".into(),
            });
        }
        self.inner.write_batch(writes).await
    }
}
