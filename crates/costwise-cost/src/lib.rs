// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota accounting for the Costwise router.
//!
//! This crate provides:
//! - **Scope layout**: which counters each ledger layer keeps and their caps,
//!   including floor-based conversion of dollar budgets into request capacity
//! - **Quota ledger**: persisted per-scope counters with lazy period resets,
//!   serialized read-modify-write, and in-flight reservations
//! - **Pricing**: token-based call cost estimates
//! - **Cost reporter**: spend, remaining capacity, projection, and advisories

pub mod layout;
pub mod ledger;
pub mod pricing;
pub mod report;

pub use layout::{capacity_from_budget, ScopeDef, ScopeTarget};
pub use ledger::{
    LayerSnapshot, LedgerSet, LedgerSnapshot, QuotaLedger, Reservation, ScopeUsage,
};
pub use pricing::{estimate_call_cost, TokenEstimate};
pub use report::{CostReport, CostReporter, PoolLine, ScopeLine};
