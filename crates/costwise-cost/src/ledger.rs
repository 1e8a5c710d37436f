// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted per-scope usage counters with lazy period resets.
//!
//! Each scope keeps two keys in the layer's counter store namespace:
//! `<scope>_usage` (integer count) and `<scope>_period_anchor` (the period
//! identifier of the last write). A read or write in a new period resets the
//! count to zero exactly once, however many periods have elapsed.
//!
//! Every read-modify-write on a scope runs under that scope's lock, so
//! concurrent commits never lose an update. In-flight work is tracked with
//! [`Reservation`] guards, which count against availability without touching
//! the persisted count.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use costwise_config::model::CostwiseConfig;
use costwise_core::{Clock, CostwiseError, CounterStore, CounterWrite, LayerKind, PeriodKind, QualityTier};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::layout::{self, ScopeDef, ScopeTarget, IMAGE_SCOPE};

/// Fraction of a cap at which a single warning is logged.
const WARN_RATIO: f64 = 0.8;

struct ScopeSlot {
    def: ScopeDef,
    lock: Mutex<()>,
    reserved: Arc<AtomicU64>,
}

/// Counted state of one scope at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeUsage {
    pub name: String,
    pub target: ScopeTarget,
    pub cap: u64,
    /// Committed units this period.
    pub used: u64,
    /// Units admitted but not yet committed or released.
    pub reserved: u64,
    pub period: PeriodKind,
    pub unit_cost_usd: Option<f64>,
    pub pool: Option<String>,
    pub tier: Option<QualityTier>,
}

impl ScopeUsage {
    /// Committed headroom: `cap - used`, never negative.
    pub fn remaining(&self) -> u64 {
        self.cap.saturating_sub(self.used)
    }

    /// Headroom left for new admissions, net of in-flight reservations.
    pub fn available(&self) -> u64 {
        self.cap
            .saturating_sub(self.used.saturating_add(self.reserved))
    }

    /// Implied dollar spend this period. Zero for request-count scopes.
    pub fn spend(&self) -> f64 {
        self.used as f64 * self.unit_cost_usd.unwrap_or(0.0)
    }

    pub fn exceeds(&self) -> bool {
        self.used >= self.cap
    }
}

/// Snapshot of every scope on one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSnapshot {
    pub layer: LayerKind,
    pub scopes: Vec<ScopeUsage>,
}

impl LayerSnapshot {
    pub fn get(&self, scope: &str) -> Option<&ScopeUsage> {
        self.scopes.iter().find(|s| s.name == scope)
    }

    /// The scope counting requests served by `model_key`, if this layer has one.
    pub fn model_scope(&self, model_key: &str) -> Option<&ScopeUsage> {
        self.scopes
            .iter()
            .find(|s| matches!(&s.target, ScopeTarget::Model(k) if k == model_key))
    }

    pub fn image_scope(&self) -> Option<&ScopeUsage> {
        self.scopes
            .iter()
            .find(|s| s.target == ScopeTarget::Images)
    }
}

/// Snapshot of every active layer, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub layers: Vec<LayerSnapshot>,
}

impl LedgerSnapshot {
    pub fn layer(&self, kind: LayerKind) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|l| l.layer == kind)
    }

    /// True when any active layer denominates scopes in dollars.
    pub fn has_dollar_scopes(&self) -> bool {
        self.layers
            .iter()
            .flat_map(|l| &l.scopes)
            .any(|s| s.unit_cost_usd.is_some())
    }
}

/// Admission held against one scope until dropped.
///
/// Counts toward [`ScopeUsage::available`] but never toward the persisted
/// count. Dropping it releases the slot whether or not the work committed.
#[derive(Debug)]
pub struct Reservation {
    layer: LayerKind,
    scope: String,
    counter: Arc<AtomicU64>,
}

impl Reservation {
    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Usage counters for one ledger layer.
pub struct QuotaLedger {
    layer: LayerKind,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    scopes: BTreeMap<String, ScopeSlot>,
}

impl QuotaLedger {
    pub fn new(
        layer: LayerKind,
        scopes: Vec<ScopeDef>,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scopes = scopes
            .into_iter()
            .map(|def| {
                (
                    def.name.clone(),
                    ScopeSlot {
                        def,
                        lock: Mutex::new(()),
                        reserved: Arc::new(AtomicU64::new(0)),
                    },
                )
            })
            .collect();
        Self {
            layer,
            store,
            clock,
            scopes,
        }
    }

    /// Ledger for `layer` with the scopes `config` defines for it.
    pub fn from_config(
        layer: LayerKind,
        config: &CostwiseConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(layer, layout::scopes_for(layer, config), store, clock)
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn scope(&self, name: &str) -> Result<&ScopeDef, CostwiseError> {
        self.slot(name).map(|s| &s.def)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &ScopeDef> {
        self.scopes.values().map(|s| &s.def)
    }

    /// Scope counting `model_key`, if this layer constrains it.
    pub fn model_scope(&self, model_key: &str) -> Option<&ScopeDef> {
        self.scopes()
            .find(|d| matches!(&d.target, ScopeTarget::Model(k) if k == model_key))
    }

    /// Scope counting image requests, if this layer constrains them.
    pub fn image_scope(&self) -> Option<&ScopeDef> {
        self.scopes.get(IMAGE_SCOPE).map(|s| &s.def)
    }

    fn slot(&self, name: &str) -> Result<&ScopeSlot, CostwiseError> {
        self.scopes
            .get(name)
            .ok_or_else(|| CostwiseError::ScopeNotFound {
                layer: self.layer.to_string(),
                scope: name.to_string(),
            })
    }

    /// Committed count for the current period, resetting a stale anchor.
    pub async fn current_usage(&self, scope: &str) -> Result<u64, CostwiseError> {
        let slot = self.slot(scope)?;
        let _guard = slot.lock.lock().await;
        let (used, period, stale) = self.load(&slot.def).await?;
        if stale {
            self.reset(scope, period).await?;
        }
        Ok(used)
    }

    /// Add one unit to `scope` and return the new count.
    ///
    /// Never fails for going over the cap. A stale period is reset and the
    /// increment applied in the same batch.
    pub async fn record_usage(&self, scope: &str) -> Result<u64, CostwiseError> {
        let slot = self.slot(scope)?;
        let _guard = slot.lock.lock().await;
        let (used, period, _) = self.load(&slot.def).await?;
        self.increment(&slot.def, used, period).await
    }

    /// Add one unit unless `scope` has already reached its cap.
    ///
    /// Returns the new count, or `None` when the scope was full and left
    /// untouched. The check and the write happen under one lock.
    pub async fn record_usage_capped(&self, scope: &str) -> Result<Option<u64>, CostwiseError> {
        let slot = self.slot(scope)?;
        let _guard = slot.lock.lock().await;
        let (used, period, stale) = self.load(&slot.def).await?;
        if used >= slot.def.cap {
            if stale {
                self.reset(scope, period).await?;
            }
            debug!(layer = %self.layer, scope, used, cap = slot.def.cap, "scope full, usage not recorded");
            return Ok(None);
        }
        self.increment(&slot.def, used, period).await.map(Some)
    }

    async fn reset(&self, scope: &str, period: String) -> Result<(), CostwiseError> {
        self.store
            .write_batch(vec![
                CounterWrite::int(usage_key(scope), 0),
                CounterWrite::text(anchor_key(scope), period),
            ])
            .await
    }

    async fn increment(
        &self,
        def: &ScopeDef,
        used: u64,
        period: String,
    ) -> Result<u64, CostwiseError> {
        let scope = def.name.as_str();
        let next = used.saturating_add(1);
        self.store
            .write_batch(vec![
                CounterWrite::int(usage_key(scope), i64::try_from(next).unwrap_or(i64::MAX)),
                CounterWrite::text(anchor_key(scope), period),
            ])
            .await?;

        let cap = def.cap;
        info!(
            layer = %self.layer,
            scope,
            used = next,
            cap,
            "usage recorded"
        );
        let threshold = (cap as f64 * WARN_RATIO).ceil() as u64;
        if cap > 0 && next >= threshold && used < threshold {
            warn!(
                layer = %self.layer,
                scope,
                used = next,
                cap,
                "quota scope at {:.0}% of cap",
                WARN_RATIO * 100.0
            );
        }
        if next > cap {
            debug!(layer = %self.layer, scope, used = next, cap, "usage recorded past cap");
        }
        Ok(next)
    }

    /// `cap - used`, saturating at zero.
    pub async fn remaining(&self, scope: &str) -> Result<u64, CostwiseError> {
        let cap = self.slot(scope)?.def.cap;
        Ok(cap.saturating_sub(self.current_usage(scope).await?))
    }

    /// Implied dollar spend. Zero for request-count scopes.
    pub async fn spend(&self, scope: &str) -> Result<f64, CostwiseError> {
        let unit = self.slot(scope)?.def.unit_cost_usd.unwrap_or(0.0);
        Ok(self.current_usage(scope).await? as f64 * unit)
    }

    /// True once the committed count has reached the cap.
    pub async fn exceeds(&self, scope: &str) -> Result<bool, CostwiseError> {
        let cap = self.slot(scope)?.def.cap;
        Ok(self.current_usage(scope).await? >= cap)
    }

    /// Hold one unit of `scope` for in-flight work.
    pub fn reserve(&self, scope: &str) -> Result<Reservation, CostwiseError> {
        let slot = self.slot(scope)?;
        slot.reserved.fetch_add(1, Ordering::AcqRel);
        Ok(Reservation {
            layer: self.layer,
            scope: scope.to_string(),
            counter: Arc::clone(&slot.reserved),
        })
    }

    /// Units currently reserved on `scope`.
    pub fn reserved(&self, scope: &str) -> Result<u64, CostwiseError> {
        Ok(self.slot(scope)?.reserved.load(Ordering::Acquire))
    }

    /// Counted state of every scope on this layer.
    pub async fn snapshot(&self) -> Result<LayerSnapshot, CostwiseError> {
        let mut scopes = Vec::with_capacity(self.scopes.len());
        for (name, slot) in &self.scopes {
            let used = self.current_usage(name).await?;
            let def = &slot.def;
            scopes.push(ScopeUsage {
                name: name.clone(),
                target: def.target.clone(),
                cap: def.cap,
                used,
                reserved: slot.reserved.load(Ordering::Acquire),
                period: def.period,
                unit_cost_usd: def.unit_cost_usd,
                pool: def.pool.clone(),
                tier: def.tier,
            });
        }
        Ok(LayerSnapshot {
            layer: self.layer,
            scopes,
        })
    }

    /// Count in the current period, the current period id, and whether the
    /// stored anchor is stale. Caller holds the scope lock.
    async fn load(&self, def: &ScopeDef) -> Result<(u64, String, bool), CostwiseError> {
        let period = def.period.period_id(self.clock.today());
        let anchor = self.store.get_str(&anchor_key(&def.name)).await?;
        if anchor.as_deref() == Some(period.as_str()) {
            let raw = self.store.get_int(&usage_key(&def.name)).await?.unwrap_or(0);
            return Ok((u64::try_from(raw).unwrap_or(0), period, false));
        }
        if let Some(previous) = anchor {
            info!(
                layer = %self.layer,
                scope = %def.name,
                from = %previous,
                to = %period,
                "quota period rolled over, counter reset"
            );
        }
        Ok((0, period, true))
    }
}

fn usage_key(scope: &str) -> String {
    format!("{scope}_usage")
}

fn anchor_key(scope: &str) -> String {
    format!("{scope}_period_anchor")
}

/// The active ledgers, in configuration order.
#[derive(Clone)]
pub struct LedgerSet {
    ledgers: Vec<Arc<QuotaLedger>>,
}

impl LedgerSet {
    pub fn new(ledgers: Vec<Arc<QuotaLedger>>) -> Self {
        Self { ledgers }
    }

    /// One ledger per `router.active_layers` entry, each on the store
    /// `store_for` hands out for its layer.
    pub fn from_config(
        config: &CostwiseConfig,
        mut store_for: impl FnMut(LayerKind) -> Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledgers = config
            .router
            .active_layers
            .iter()
            .map(|layer| {
                Arc::new(QuotaLedger::from_config(
                    *layer,
                    config,
                    store_for(*layer),
                    Arc::clone(&clock),
                ))
            })
            .collect();
        Self { ledgers }
    }

    pub fn get(&self, layer: LayerKind) -> Option<&Arc<QuotaLedger>> {
        self.ledgers.iter().find(|l| l.layer() == layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<QuotaLedger>> {
        self.ledgers.iter()
    }

    pub fn layers(&self) -> Vec<LayerKind> {
        self.ledgers.iter().map(|l| l.layer()).collect()
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, CostwiseError> {
        let mut layers = Vec::with_capacity(self.ledgers.len());
        for ledger in &self.ledgers {
            layers.push(ledger.snapshot().await?);
        }
        Ok(LedgerSnapshot { layers })
    }
}
