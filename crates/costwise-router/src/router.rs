// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request routing with admission, availability fallback, and commit.
//!
//! Orchestrates one request: classify > select > reserve > availability
//! check (one re-selection) > execute > commit. The ledgers are only
//! written after the provider call succeeds.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use costwise_config::model::CostwiseConfig;
use costwise_config::OverBudgetPolicy;
use costwise_core::{
    CostUnit, CostwiseError, ImageAnalysis, ProviderAdapter, QualityTier, Selection, TaskCategory,
};
use costwise_cost::{estimate_call_cost, LedgerSet, Reservation, TokenEstimate};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::recorder::UsageRecorder;
use crate::selection::SelectionEngine;

/// Re-selections allowed after an unavailable provider.
const MAX_RESELECTIONS: usize = 1;

/// Lifecycle of one routed request, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum RouteState {
    Classified,
    Selected,
    Unavailable,
    Executed,
    Committed,
    Failed,
}

/// What the caller sends.
#[derive(Debug, Clone, Default)]
pub struct RoutePayload {
    pub prompt: String,
    /// Image bytes; their presence routes the request to the vision branch.
    pub image: Option<Vec<u8>>,
}

impl RoutePayload {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutput {
    Text(String),
    Image(ImageAnalysis),
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub request_id: Uuid,
    pub selection: Selection,
    pub output: RouteOutput,
}

/// Side-effect-free cost estimate for a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCost {
    pub category: TaskCategory,
    pub model_key: Option<String>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub quality_tier: QualityTier,
    pub cost_unit: CostUnit,
    pub within_limits: bool,
    /// Reference cost of one unit on the selected model.
    pub unit_cost_usd: f64,
    /// Token-based cost, when token volumes were given.
    pub token_cost_usd: Option<f64>,
    /// What the call is expected to cost under the active layers.
    pub total_usd: f64,
    pub reason: String,
}

/// Routes requests to provider adapters within quota and budget.
pub struct Router {
    engine: SelectionEngine,
    ledgers: LedgerSet,
    recorder: UsageRecorder,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    missing_credentials: HashSet<String>,
    policy: OverBudgetPolicy,
    /// Serializes snapshot > select > reserve across all callers.
    admission: Mutex<()>,
}

impl Router {
    pub fn new(engine: SelectionEngine, ledgers: LedgerSet) -> Self {
        Self {
            engine,
            recorder: UsageRecorder::new(ledgers.clone()),
            ledgers,
            providers: HashMap::new(),
            missing_credentials: HashSet::new(),
            policy: OverBudgetPolicy::default(),
            admission: Mutex::new(()),
        }
    }

    /// Router over `ledgers` with the configured catalog and policy.
    /// Providers without a usable credential are treated as unavailable.
    pub fn from_config(config: &CostwiseConfig, ledgers: LedgerSet) -> Self {
        Self::new(SelectionEngine::from_config(config), ledgers)
            .with_policy(config.router.over_budget)
            .with_missing_credentials(config.unconfigured_providers())
    }

    /// Register an adapter under its [`name`](costwise_core::PluginAdapter::name).
    pub fn with_provider(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.insert(adapter.name().to_string(), adapter);
        self
    }

    pub fn with_missing_credentials(mut self, providers: impl IntoIterator<Item = String>) -> Self {
        self.missing_credentials.extend(providers);
        self
    }

    pub fn with_policy(mut self, policy: OverBudgetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    pub fn ledgers(&self) -> &LedgerSet {
        &self.ledgers
    }

    pub fn policy(&self) -> OverBudgetPolicy {
        self.policy
    }

    /// The selection `route` would start from, without reserving anything.
    pub async fn preview(
        &self,
        category: TaskCategory,
        has_image: bool,
    ) -> Result<Selection, CostwiseError> {
        let snapshot = self.ledgers.snapshot().await?;
        Ok(self.engine.select(category, has_image, &snapshot))
    }

    /// Dry-run cost of a task: no reservation, no commit.
    pub async fn estimate_task_cost(
        &self,
        category: TaskCategory,
        has_image: bool,
        tokens: Option<TokenEstimate>,
    ) -> Result<TaskCost, CostwiseError> {
        let snapshot = self.ledgers.snapshot().await?;
        let selection = self.engine.select(category, has_image, &snapshot);
        let free = selection.within_limits && !snapshot.has_dollar_scopes();

        let (unit_cost_usd, token_cost_usd) = match &selection.model {
            Some(model) => (
                model.unit_cost.cost_for(selection.cost_unit),
                tokens.map(|t| estimate_call_cost(model, &t, selection.cost_unit)),
            ),
            None => (0.0, None),
        };
        let total_usd = if free {
            0.0
        } else {
            token_cost_usd.unwrap_or(selection.estimated_cost)
        };

        Ok(TaskCost {
            category,
            model_key: selection.model.as_ref().map(|m| m.key.clone()),
            provider: selection.provider().map(str::to_string),
            model_id: selection.model_id().map(str::to_string),
            quality_tier: selection.quality_tier,
            cost_unit: selection.cost_unit,
            within_limits: selection.within_limits,
            unit_cost_usd,
            token_cost_usd,
            total_usd,
            reason: selection.reason,
        })
    }

    /// Route one request.
    ///
    /// Fails with [`CostwiseError::ReselectionExhausted`] when neither the
    /// first choice nor its one replacement has a usable provider, with
    /// [`CostwiseError::BudgetExhausted`] when the selection is over limits
    /// and the policy is `abort`, and with the provider's own error when
    /// the call fails. None of these touch the ledgers.
    pub async fn route(
        &self,
        category: TaskCategory,
        payload: RoutePayload,
    ) -> Result<RouteResponse, CostwiseError> {
        let request_id = Uuid::new_v4();
        let has_image = payload.image.is_some();
        debug!(%request_id, %category, has_image, state = %RouteState::Classified);

        let mut excluded = BTreeSet::new();
        for attempt in 0..=MAX_RESELECTIONS {
            let (selection, reservations) = self.admit(category, has_image, &excluded).await?;
            let Some(provider) = selection.provider().map(str::to_string) else {
                break;
            };
            debug!(
                %request_id,
                state = %RouteState::Selected,
                provider = %provider,
                model = selection.model_id().unwrap_or_default(),
                attempt
            );

            match self.ready_adapter(&provider).await {
                Ok(adapter) => {
                    return self
                        .execute(request_id, selection, reservations, adapter, payload)
                        .await;
                }
                Err(e) => {
                    warn!(
                        %request_id,
                        state = %RouteState::Unavailable,
                        error = %e,
                        "excluding provider for this request"
                    );
                    excluded.insert(provider);
                }
            }
        }

        Err(CostwiseError::ReselectionExhausted {
            category: category.to_string(),
            excluded: excluded.into_iter().collect(),
        })
    }

    /// Snapshot, select, and reserve as one step.
    async fn admit(
        &self,
        category: TaskCategory,
        has_image: bool,
        excluded: &BTreeSet<String>,
    ) -> Result<(Selection, Vec<Reservation>), CostwiseError> {
        let _admission = self.admission.lock().await;
        let snapshot = self.ledgers.snapshot().await?;
        let selection = self
            .engine
            .select_excluding(category, has_image, &snapshot, excluded);
        let mut reservations = Vec::with_capacity(selection.charges.len());
        for charge in &selection.charges {
            if let Some(ledger) = self.ledgers.get(charge.layer) {
                reservations.push(ledger.reserve(&charge.scope)?);
            }
        }
        Ok((selection, reservations))
    }

    async fn ready_adapter(
        &self,
        provider: &str,
    ) -> Result<Arc<dyn ProviderAdapter>, CostwiseError> {
        let unavailable = |reason: &str| CostwiseError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        };
        if self.missing_credentials.contains(provider) {
            return Err(unavailable("missing credential"));
        }
        let adapter = self
            .providers
            .get(provider)
            .ok_or_else(|| unavailable("no adapter registered"))?;
        if !adapter.is_available().await {
            return Err(unavailable("adapter reports unavailable"));
        }
        Ok(Arc::clone(adapter))
    }

    async fn execute(
        &self,
        request_id: Uuid,
        selection: Selection,
        reservations: Vec<Reservation>,
        adapter: Arc<dyn ProviderAdapter>,
        payload: RoutePayload,
    ) -> Result<RouteResponse, CostwiseError> {
        if !selection.within_limits && self.policy == OverBudgetPolicy::Abort {
            warn!(%request_id, reason = %selection.reason, "over-budget request aborted by policy");
            return Err(CostwiseError::BudgetExhausted {
                message: selection.reason,
            });
        }

        let model_id = selection.model_id().unwrap_or_default().to_string();
        let result = match payload.image {
            Some(image) => adapter
                .analyze_image(&model_id, &payload.prompt, &image)
                .await
                .map(RouteOutput::Image),
            None => adapter
                .generate_text(&model_id, &payload.prompt)
                .await
                .map(RouteOutput::Text),
        };
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    %request_id,
                    state = %RouteState::Failed,
                    provider = adapter.name(),
                    error = %e,
                    "provider call failed, nothing recorded"
                );
                return Err(e);
            }
        };
        debug!(%request_id, state = %RouteState::Executed);

        // The provider already served the call; a failed commit loses usage
        // accounting for this request but not the response.
        if let Err(e) = self.recorder.commit(&selection).await {
            error!(
                %request_id,
                provider = adapter.name(),
                model = %model_id,
                error = %e,
                "usage commit failed, request was served"
            );
        }
        drop(reservations);

        info!(
            %request_id,
            state = %RouteState::Committed,
            category = %selection.category,
            provider = adapter.name(),
            model = %model_id,
            tier = %selection.quality_tier,
            within_limits = selection.within_limits,
            cost = selection.estimated_cost,
            "request routed"
        );
        Ok(RouteResponse {
            request_id,
            selection,
            output,
        })
    }
}
