// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by the commands that read the ledgers.

use std::sync::Arc;

use chrono::NaiveDate;
use costwise_config::model::CostwiseConfig;
use costwise_core::{Clock, CostwiseError, CounterStore, FixedClock, SystemClock};
use costwise_cost::{CostReporter, LedgerSet};
use costwise_router::Router;
use costwise_storage::{Database, SqliteCounterStore};
use tracing::debug;

/// Router and reporter over the configured counter database.
///
/// No provider adapters are registered: commands only preview and
/// estimate, which never dispatch.
pub struct Context {
    pub router: Router,
    pub reporter: CostReporter,
}

pub async fn open(
    config: &CostwiseConfig,
    as_of: Option<NaiveDate>,
) -> Result<Context, CostwiseError> {
    let clock: Arc<dyn Clock> = match as_of {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    };
    let db = Database::from_config(&config.storage).await?;
    let ledgers = LedgerSet::from_config(
        config,
        |layer| Arc::new(SqliteCounterStore::new(db.clone(), layer.namespace())) as Arc<dyn CounterStore>,
        Arc::clone(&clock),
    );
    debug!(
        database = %config.storage.database_path,
        layers = ?ledgers.layers(),
        today = %clock.today(),
        "ledgers opened"
    );

    Ok(Context {
        router: Router::from_config(config, ledgers.clone()),
        reporter: CostReporter::from_config(ledgers, clock, config),
    })
}
