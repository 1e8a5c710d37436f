// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commits completed requests into the ledgers.

use costwise_core::{CostwiseError, Selection};
use costwise_cost::LedgerSet;
use tracing::{debug, warn};

/// Increments the scopes a selection charges, once per successful call.
#[derive(Clone)]
pub struct UsageRecorder {
    ledgers: LedgerSet,
}

impl UsageRecorder {
    pub fn new(ledgers: LedgerSet) -> Self {
        Self { ledgers }
    }

    /// Add one unit to every scope `selection` charges.
    ///
    /// A scope that has already reached its cap is left as is, so an
    /// over-budget request never pushes implied spend past the allocation.
    /// Every charge is attempted even when an earlier one fails; the first
    /// failure is returned after the rest have been applied. Returns the
    /// number of scopes incremented.
    pub async fn commit(&self, selection: &Selection) -> Result<usize, CostwiseError> {
        if selection.model.is_none() {
            warn!(category = %selection.category, "commit of a selection without a model ignored");
            return Ok(0);
        }

        let mut recorded = 0;
        let mut first_err = None;
        for charge in &selection.charges {
            let Some(ledger) = self.ledgers.get(charge.layer) else {
                warn!(layer = %charge.layer, scope = %charge.scope, "charge on inactive layer skipped");
                first_err.get_or_insert(CostwiseError::Internal(format!(
                    "selection charges inactive layer {} ({})",
                    charge.layer, charge.scope
                )));
                continue;
            };
            match ledger.record_usage_capped(&charge.scope).await {
                Ok(Some(_)) => recorded += 1,
                Ok(None) => debug!(
                    layer = %charge.layer,
                    scope = %charge.scope,
                    "scope at cap, over-budget usage not billed"
                ),
                Err(e) => {
                    warn!(layer = %charge.layer, scope = %charge.scope, error = %e, "usage write failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(recorded),
        }
    }
}
