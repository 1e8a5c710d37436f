// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles ledgers, router, and reporter with one
//! [`MockProvider`] per configured provider, on a [`FixedClock`] the test
//! can move. Counters live in memory by default, or in a temp SQLite
//! database that can be reopened to check persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use costwise_config::model::{CostwiseConfig, ProviderConfig};
use costwise_config::OverBudgetPolicy;
use costwise_core::{
    Clock, CostwiseError, CounterStore, FixedClock, LayerKind, TaskCategory,
};
use costwise_cost::{CostReport, CostReporter, LedgerSet};
use costwise_router::{RoutePayload, RouteResponse, Router};
use costwise_storage::{Database, MemoryCounterStore, SqliteCounterStore};

use crate::mock_provider::MockProvider;

const TEST_API_KEY: &str = "test-key";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: CostwiseConfig,
    date: NaiveDate,
    sqlite: bool,
    responses: Vec<String>,
    without_credentials: Vec<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: CostwiseConfig::default(),
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap_or_default(),
            sqlite: false,
            responses: Vec::new(),
            without_credentials: Vec::new(),
        }
    }

    /// Start from a custom configuration instead of the defaults.
    pub fn with_config(mut self, config: CostwiseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_layers(mut self, layers: Vec<LayerKind>) -> Self {
        self.config.router.active_layers = layers;
        self
    }

    pub fn with_policy(mut self, policy: OverBudgetPolicy) -> Self {
        self.config.router.over_budget = policy;
        self
    }

    /// Date the fixed clock starts on.
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Keep counters in a temp SQLite database instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Responses queued on every mock provider.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Leave `provider` without an API key.
    pub fn without_credential(mut self, provider: impl Into<String>) -> Self {
        self.without_credentials.push(provider.into());
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CostwiseError> {
        let mut config = self.config;
        let provider_names: Vec<String> = config
            .models
            .values()
            .map(|m| m.provider.clone())
            .collect();
        for name in &provider_names {
            let entry = config.providers.entry(name.clone()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = Some(TEST_API_KEY.to_string());
            }
        }
        for name in &self.without_credentials {
            config.providers.insert(name.clone(), ProviderConfig::default());
        }

        let clock = Arc::new(FixedClock::new(self.date));

        let (temp_dir, database) = if self.sqlite {
            let dir = tempfile::TempDir::new().map_err(|e| CostwiseError::Storage {
                source: e.into(),
            })?;
            let path = dir.path().join("costwise-test.db");
            let db = Database::open(&path.to_string_lossy()).await?;
            (Some(dir), Some(db))
        } else {
            (None, None)
        };
        let ledgers = build_ledgers(&config, database.as_ref(), clock.clone());

        let mut providers = BTreeMap::new();
        for name in provider_names {
            providers.entry(name.clone()).or_insert_with(|| {
                Arc::new(MockProvider::with_responses(name, self.responses.clone()))
            });
        }

        let mut router = Router::from_config(&config, ledgers.clone());
        for provider in providers.values() {
            router = router.with_provider(provider.clone());
        }
        let reporter = CostReporter::from_config(ledgers.clone(), clock.clone(), &config);

        Ok(TestHarness {
            config,
            clock,
            ledgers,
            router: Arc::new(router),
            reporter: Arc::new(reporter),
            providers,
            database,
            temp_dir,
        })
    }
}

fn build_ledgers(config: &CostwiseConfig, database: Option<&Database>, clock: Arc<FixedClock>) -> LedgerSet {
    LedgerSet::from_config(
        config,
        |layer| match database {
            Some(db) => {
                Arc::new(SqliteCounterStore::new(db.clone(), layer.namespace())) as Arc<dyn CounterStore>
            }
            None => Arc::new(MemoryCounterStore::new()) as Arc<dyn CounterStore>,
        },
        clock as Arc<dyn Clock>,
    )
}

/// A complete routing environment with mock providers.
pub struct TestHarness {
    /// Effective configuration, credentials filled in.
    pub config: CostwiseConfig,
    pub clock: Arc<FixedClock>,
    pub ledgers: LedgerSet,
    pub router: Arc<Router>,
    pub reporter: Arc<CostReporter>,
    /// Mock adapters keyed by provider name.
    pub providers: BTreeMap<String, Arc<MockProvider>>,
    database: Option<Database>,
    /// Kept alive for cleanup on drop.
    temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn provider(&self, name: &str) -> Option<Arc<MockProvider>> {
        self.providers.get(name).cloned()
    }

    /// Route a text prompt.
    pub async fn route_text(
        &self,
        category: TaskCategory,
        prompt: &str,
    ) -> Result<RouteResponse, CostwiseError> {
        self.router.route(category, RoutePayload::text(prompt)).await
    }

    /// Route a prompt with an image attached.
    pub async fn route_image(
        &self,
        category: TaskCategory,
        prompt: &str,
    ) -> Result<RouteResponse, CostwiseError> {
        self.router
            .route(category, RoutePayload::with_image(prompt, vec![0xFF, 0xD8, 0xFF]))
            .await
    }

    /// Committed count of `scope` on `layer`.
    pub async fn usage(&self, layer: LayerKind, scope: &str) -> Result<u64, CostwiseError> {
        let ledger = self.ledgers.get(layer).ok_or_else(|| CostwiseError::ScopeNotFound {
            layer: layer.to_string(),
            scope: scope.to_string(),
        })?;
        ledger.current_usage(scope).await
    }

    /// Record `count` units on `scope` directly, bypassing the router.
    pub async fn fill(&self, layer: LayerKind, scope: &str, count: u64) -> Result<(), CostwiseError> {
        let ledger = self.ledgers.get(layer).ok_or_else(|| CostwiseError::ScopeNotFound {
            layer: layer.to_string(),
            scope: scope.to_string(),
        })?;
        for _ in 0..count {
            ledger.record_usage(scope).await?;
        }
        Ok(())
    }

    pub async fn report(&self) -> Result<CostReport, CostwiseError> {
        self.reporter.report().await
    }

    /// Fresh ledgers over a new connection to the same database, as after a
    /// restart. Fails for in-memory harnesses.
    pub async fn reopened_ledgers(&self) -> Result<LedgerSet, CostwiseError> {
        let (Some(dir), Some(_)) = (&self.temp_dir, &self.database) else {
            return Err(CostwiseError::Internal(
                "harness was built without sqlite".to_string(),
            ));
        };
        let path = dir.path().join("costwise-test.db");
        let db = Database::open(&path.to_string_lossy()).await?;
        Ok(build_ledgers(&self.config, Some(&db), self.clock.clone()))
    }
}
