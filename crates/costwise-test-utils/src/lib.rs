// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Costwise integration tests.
//!
//! Provides mock adapters and a harness for fast, deterministic tests
//! without provider credentials or network access.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock provider with queued responses, failure
//!   injection, and an availability switch
//! - [`FlakyCounterStore`] - In-memory counter store whose writes can be
//!   switched to fail
//! - [`TestHarness`] - Ledgers, router, and reporter wired to mocks on a
//!   fixed clock

pub mod flaky_store;
pub mod harness;
pub mod mock_provider;

pub use costwise_core::FixedClock;
pub use flaky_store::FlakyCounterStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::MockProvider;
