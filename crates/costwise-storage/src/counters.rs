// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `CounterStore` trait.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use costwise_core::{
    AdapterType, CostwiseError, CounterStore, CounterValue, CounterWrite, HealthStatus,
    PluginAdapter,
};

use crate::database::{map_tr_err, Database};

const UPSERT: &str = "INSERT INTO counters (namespace, key, int_value, text_value, updated_at)
     VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
     ON CONFLICT(namespace, key) DO UPDATE SET
         int_value = excluded.int_value,
         text_value = excluded.text_value,
         updated_at = excluded.updated_at";

/// Counters for one namespace (one ledger layer) in the shared database.
#[derive(Clone)]
pub struct SqliteCounterStore {
    db: Database,
    namespace: String,
}

impl SqliteCounterStore {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl PluginAdapter for SqliteCounterStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CostwiseError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CostwiseError> {
        // The connection is shared between namespaces; the owner closes it.
        Ok(())
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn get_int(&self, key: &str) -> Result<Option<i64>, CostwiseError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
                let value: Option<Option<i64>> = conn
                    .query_row(
                        "SELECT int_value FROM counters WHERE namespace = ?1 AND key = ?2",
                        params![namespace, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value.flatten())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn get_str(&self, key: &str) -> Result<Option<String>, CostwiseError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                let value: Option<Option<String>> = conn
                    .query_row(
                        "SELECT text_value FROM counters WHERE namespace = ?1 AND key = ?2",
                        params![namespace, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value.flatten())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn write_batch(&self, writes: Vec<CounterWrite>) -> Result<(), CostwiseError> {
        if writes.is_empty() {
            return Ok(());
        }
        let namespace = self.namespace.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(UPSERT)?;
                    for write in &writes {
                        match &write.value {
                            CounterValue::Int(v) => {
                                stmt.execute(params![namespace, write.key, v, None::<String>])?
                            }
                            CounterValue::Text(s) => {
                                stmt.execute(params![namespace, write.key, None::<i64>, s])?
                            }
                        };
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(namespace: &str) -> SqliteCounterStore {
        let db = Database::open_in_memory().await.unwrap();
        SqliteCounterStore::new(db, namespace)
    }

    #[tokio::test]
    async fn missing_keys_read_as_none() {
        let store = store("free_tier").await;
        assert_eq!(store.get_int("flash_daily_usage").await.unwrap(), None);
        assert_eq!(store.get_str("flash_daily_period_anchor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_writes_ints_and_strings() {
        let store = store("free_tier").await;
        store
            .write_batch(vec![
                CounterWrite::int("flash_daily_usage", 7),
                CounterWrite::text("flash_daily_period_anchor", "2026-03-09"),
            ])
            .await
            .unwrap();
        assert_eq!(store.get_int("flash_daily_usage").await.unwrap(), Some(7));
        assert_eq!(
            store.get_str("flash_daily_period_anchor").await.unwrap().as_deref(),
            Some("2026-03-09")
        );

        store.set_int("flash_daily_usage", 8).await.unwrap();
        assert_eq!(store.get_int("flash_daily_usage").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let db = Database::open_in_memory().await.unwrap();
        let free = SqliteCounterStore::new(db.clone(), "free_tier");
        let paid = SqliteCounterStore::new(db, "paid_tier");

        free.set_int("flash_usage", 3).await.unwrap();
        paid.set_int("flash_usage", 40).await.unwrap();

        assert_eq!(free.get_int("flash_usage").await.unwrap(), Some(3));
        assert_eq!(paid.get_int("flash_usage").await.unwrap(), Some(40));
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let store = store("paid_tier").await;
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }
}
