// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota-aware, cost-aware request routing.
//!
//! This crate provides:
//! - [`TaskCatalog`]: static task category to capability profile lookup
//! - [`ModelCatalog`]: configured provider models in cost order
//! - [`SelectionEngine`]: the pure fallback cascade over a ledger snapshot
//! - [`UsageRecorder`]: commits a successful selection into the ledgers
//! - [`Router`]: admission, availability check with one re-selection,
//!   execution, and commit

pub mod catalog;
pub mod models;
pub mod recorder;
pub mod router;
pub mod selection;

pub use catalog::{TaskCatalog, TaskProfile};
pub use models::ModelCatalog;
pub use recorder::UsageRecorder;
pub use router::{RouteOutput, RoutePayload, RouteResponse, Router, TaskCost};
pub use selection::SelectionEngine;
