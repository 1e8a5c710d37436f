// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted counter store consumed by the quota ledger.

use async_trait::async_trait;

use crate::error::CostwiseError;
use crate::traits::adapter::PluginAdapter;

/// A value held under a counter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterValue {
    Int(i64),
    Text(String),
}

/// One key assignment inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterWrite {
    pub key: String,
    pub value: CounterValue,
}

impl CounterWrite {
    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: CounterValue::Int(value),
        }
    }

    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: CounterValue::Text(value.into()),
        }
    }
}

/// Key/value store for ledger counters, scoped to a single namespace.
///
/// Missing keys read as `None`. `write_batch` applies all writes or none.
#[async_trait]
pub trait CounterStore: PluginAdapter {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, CostwiseError>;

    async fn get_str(&self, key: &str) -> Result<Option<String>, CostwiseError>;

    async fn set_int(&self, key: &str, value: i64) -> Result<(), CostwiseError> {
        self.write_batch(vec![CounterWrite::int(key, value)]).await
    }

    async fn set_str(&self, key: &str, value: &str) -> Result<(), CostwiseError> {
        self.write_batch(vec![CounterWrite::text(key, value)]).await
    }

    /// Apply every write atomically.
    async fn write_batch(&self, writes: Vec<CounterWrite>) -> Result<(), CostwiseError>;
}
