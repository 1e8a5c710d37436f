// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Costwise router.

use thiserror::Error;

/// The primary error type used across all Costwise adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CostwiseError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Counter store errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A provider cannot serve requests (missing credential, disabled, unregistered).
    #[error("provider `{provider}` unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// The provider call itself failed (network, parsing, upstream error).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every candidate provider for the task was unavailable.
    #[error("no available provider for `{category}` (excluded: {})", .excluded.join(", "))]
    ReselectionExhausted {
        category: String,
        excluded: Vec<String>,
    },

    /// The selection was over budget and the router is configured to abort.
    #[error("budget exhausted: {message}")]
    BudgetExhausted { message: String },

    /// A ledger operation named a scope the layer does not define.
    #[error("unknown quota scope `{scope}` in {layer} layer")]
    ScopeNotFound { layer: String, scope: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
