// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait.

use async_trait::async_trait;

use crate::error::CostwiseError;
use crate::types::{AdapterType, HealthStatus};

/// Identity and lifecycle shared by every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Name of this adapter instance. Provider adapters are looked up by it.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, CostwiseError>;

    /// Release any held resources.
    async fn shutdown(&self) -> Result<(), CostwiseError>;
}
