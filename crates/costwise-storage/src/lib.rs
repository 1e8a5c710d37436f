// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter persistence for the Costwise quota ledger.
//!
//! [`SqliteCounterStore`] keeps counters in a WAL-mode SQLite database with
//! embedded migrations; every statement runs on tokio-rusqlite's single
//! background thread. [`MemoryCounterStore`] backs tests and dry runs.

pub mod counters;
pub mod database;
pub mod memory;
pub mod migrations;

pub use counters::SqliteCounterStore;
pub use database::Database;
pub use memory::MemoryCounterStore;
