// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend and capacity report.
//!
//! Building a report records no usage. Reading a scope for the first time
//! in a new period does persist its reset (zeroed count and new period
//! anchor), so the first report of a period may write to the store. Two
//! reports with no usage recorded in between are equal.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use costwise_config::model::{BudgetConfig, CostwiseConfig, ReportingConfig};
use costwise_core::{Clock, CostwiseError, LayerKind, PeriodKind, QualityTier};
use serde::Serialize;
use tracing::debug;

use crate::layout::ScopeTarget;
use crate::ledger::{LedgerSet, LedgerSnapshot};

/// Remaining premium requests above which a recommendation is made.
const PREMIUM_HEADROOM: u64 = 50;
/// Remaining searches or budget requests above which a recommendation is made.
const BULK_HEADROOM: u64 = 100;

/// One scope line in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeLine {
    pub layer: LayerKind,
    pub scope: String,
    pub period: PeriodKind,
    pub used: u64,
    pub cap: u64,
    pub remaining: u64,
    /// Implied dollar spend, for dollar-denominated scopes.
    pub spend_usd: Option<f64>,
    pub pool: Option<String>,
}

/// Spend against one provider budget pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolLine {
    pub pool: String,
    pub budget_usd: f64,
    pub spent_usd: f64,
    pub remaining_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub generated_on: NaiveDate,
    pub scopes: Vec<ScopeLine>,
    pub pools: Vec<PoolLine>,
    /// Sum of every dollar-denominated scope's implied spend.
    pub total_spend_usd: f64,
    pub total_remaining_usd: f64,
    /// Month-to-date spend extrapolated linearly to month end.
    pub projected_monthly_spend_usd: f64,
    /// Committed requests per quality tier this period.
    pub quality_distribution: BTreeMap<QualityTier, u64>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Builds [`CostReport`]s from the live ledgers.
pub struct CostReporter {
    ledgers: LedgerSet,
    clock: Arc<dyn Clock>,
    budgets: BudgetConfig,
    thresholds: ReportingConfig,
}

impl CostReporter {
    pub fn new(
        ledgers: LedgerSet,
        clock: Arc<dyn Clock>,
        budgets: BudgetConfig,
        thresholds: ReportingConfig,
    ) -> Self {
        Self {
            ledgers,
            clock,
            budgets,
            thresholds,
        }
    }

    pub fn from_config(ledgers: LedgerSet, clock: Arc<dyn Clock>, config: &CostwiseConfig) -> Self {
        Self::new(
            ledgers,
            clock,
            config.budget.clone(),
            config.reporting.clone(),
        )
    }

    pub async fn report(&self) -> Result<CostReport, CostwiseError> {
        let snapshot = self.ledgers.snapshot().await?;
        let report = build_report(
            &snapshot,
            self.clock.today(),
            &self.budgets,
            &self.thresholds,
        );
        debug!(
            total_spend = report.total_spend_usd,
            warnings = report.warnings.len(),
            "cost report built"
        );
        Ok(report)
    }
}

/// Pure report construction over a ledger snapshot.
pub fn build_report(
    snapshot: &LedgerSnapshot,
    today: NaiveDate,
    budgets: &BudgetConfig,
    thresholds: &ReportingConfig,
) -> CostReport {
    let scopes: Vec<ScopeLine> = snapshot
        .layers
        .iter()
        .flat_map(|layer| {
            layer.scopes.iter().map(move |s| ScopeLine {
                layer: layer.layer,
                scope: s.name.clone(),
                period: s.period,
                used: s.used,
                cap: s.cap,
                remaining: s.remaining(),
                spend_usd: s.unit_cost_usd.map(|_| s.spend()),
                pool: s.pool.clone(),
            })
        })
        .collect();

    let total_spend_usd: f64 = scopes.iter().filter_map(|s| s.spend_usd).sum();

    let pools: Vec<PoolLine> = match snapshot.layer(LayerKind::Paid) {
        Some(paid) => budgets
            .monthly_budgets
            .iter()
            .map(|(pool, budget)| {
                let spent: f64 = paid
                    .scopes
                    .iter()
                    .filter(|s| s.pool.as_deref() == Some(pool.as_str()))
                    .map(|s| s.spend())
                    .sum();
                PoolLine {
                    pool: pool.clone(),
                    budget_usd: *budget,
                    spent_usd: spent,
                    remaining_usd: (budget - spent).max(0.0),
                }
            })
            .collect(),
        None => Vec::new(),
    };
    let total_remaining_usd: f64 = pools.iter().map(|p| p.remaining_usd).sum();

    let day = f64::from(today.day());
    let projected_monthly_spend_usd = total_spend_usd * f64::from(days_in_month(today)) / day;

    // Both layers count the same requests; read the distribution from one.
    let primary = snapshot
        .layer(LayerKind::Paid)
        .or_else(|| snapshot.layer(LayerKind::Free));
    let mut quality_distribution = BTreeMap::new();
    if let Some(layer) = primary {
        for scope in &layer.scopes {
            if let (ScopeTarget::Model(_), Some(tier)) = (&scope.target, scope.tier) {
                *quality_distribution.entry(tier).or_insert(0) += scope.used;
            }
        }
    }

    let mut warnings = Vec::new();
    for pool in &pools {
        if pool.remaining_usd < thresholds.budget_warning_usd {
            warnings.push(format!(
                "{} budget low: ${:.2} of ${:.2} remaining",
                pool.pool, pool.remaining_usd, pool.budget_usd
            ));
        }
    }
    if !pools.is_empty() && total_remaining_usd < thresholds.total_warning_usd {
        warnings.push(format!(
            "total budget low: ${total_remaining_usd:.2} remaining this month"
        ));
    }
    let total_budget: f64 = pools.iter().map(|p| p.budget_usd).sum();
    if total_budget > 0.0 && projected_monthly_spend_usd > total_budget {
        warnings.push(format!(
            "projected monthly spend ${projected_monthly_spend_usd:.2} exceeds budget ${total_budget:.2}"
        ));
    }
    for line in scopes.iter().filter(|s| s.period == PeriodKind::Daily) {
        if line.cap > 0 && (line.remaining as f64) < line.cap as f64 * thresholds.low_quota_ratio {
            warnings.push(format!(
                "{} nearly exhausted: {}/{} requests left today",
                line.scope, line.remaining, line.cap
            ));
        }
    }

    let mut recommendations = Vec::new();
    if let Some(layer) = primary {
        for scope in &layer.scopes {
            let remaining = scope.remaining();
            match scope.tier {
                Some(QualityTier::Premium) if remaining > PREMIUM_HEADROOM => {
                    recommendations.push(format!(
                        "{remaining} premium requests left on {}: use them for vision and complex planning",
                        scope.name
                    ));
                }
                Some(QualityTier::Specialized) if remaining > BULK_HEADROOM => {
                    recommendations.push(format!(
                        "{remaining} searches left on {}: route current-information questions there",
                        scope.name
                    ));
                }
                Some(QualityTier::Budget) if remaining > BULK_HEADROOM => {
                    recommendations.push(format!(
                        "{remaining} budget requests left on {}: keep simple text there",
                        scope.name
                    ));
                }
                _ => {}
            }
        }
    }
    if recommendations.is_empty() {
        recommendations.push(
            "allocations are nearly used up; over-budget requests fall back to the cheapest model"
                .to_string(),
        );
    }

    CostReport {
        generated_on: today,
        scopes,
        pools,
        total_spend_usd,
        total_remaining_usd,
        projected_monthly_spend_usd,
        quality_distribution,
        warnings,
        recommendations,
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_lengths() {
        let d = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();
        assert_eq!(days_in_month(d(2026, 2)), 28);
        assert_eq!(days_in_month(d(2028, 2)), 29);
        assert_eq!(days_in_month(d(2026, 4)), 30);
        assert_eq!(days_in_month(d(2026, 12)), 31);
    }
}
