// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end routing: selection, availability fallback, execution, commit.

use std::sync::Arc;

use chrono::NaiveDate;
use costwise_config::{load_config_from_str, CostwiseConfig, OverBudgetPolicy};
use costwise_core::{
    Clock, CostUnit, CostwiseError, CounterStore, FixedClock, LayerKind, QualityTier, TaskCategory,
};
use costwise_cost::{LedgerSet, TokenEstimate};
use costwise_router::{RouteOutput, RoutePayload, Router, SelectionEngine, UsageRecorder};
use costwise_storage::MemoryCounterStore;
use costwise_test_utils::{FlakyCounterStore, MockProvider, TestHarness};
use tracing_test::traced_test;

fn model_key(response: &costwise_router::RouteResponse) -> &str {
    response
        .selection
        .model
        .as_ref()
        .map(|m| m.key.as_str())
        .unwrap_or("none")
}

async fn free_harness() -> TestHarness {
    TestHarness::builder()
        .with_layers(vec![LayerKind::Free])
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn simple_text_routes_to_budget_and_commits() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["short answer".into()])
        .build()
        .await
        .unwrap();

    let response = harness
        .route_text(TaskCategory::SimpleText, "rephrase this")
        .await
        .unwrap();

    assert_eq!(model_key(&response), "flash_lite");
    assert_eq!(response.selection.quality_tier, QualityTier::Budget);
    assert_eq!(response.output, RouteOutput::Text("short answer".into()));
    assert_eq!(
        harness
            .usage(LayerKind::Paid, "flash_lite_monthly_spend")
            .await
            .unwrap(),
        1
    );
    let gemini = harness.provider("gemini").unwrap();
    assert_eq!(gemini.models_called().await, vec!["gemini-2.5-flash-8b"]);
}

#[tokio::test]
async fn vision_degrades_after_premium_daily_quota() {
    let harness = free_harness().await;
    for _ in 0..250 {
        let r = harness
            .route_text(TaskCategory::ComplexPlanning, "plan my week")
            .await
            .unwrap();
        assert_eq!(model_key(&r), "flash");
    }
    assert_eq!(harness.usage(LayerKind::Free, "flash_daily").await.unwrap(), 250);

    let response = harness
        .route_image(TaskCategory::VisionAnalysis, "what is on this plate?")
        .await
        .unwrap();
    assert_eq!(model_key(&response), "flash_lite");
    assert!(!response.selection.within_limits);
    assert_eq!(response.selection.quality_tier, QualityTier::Budget);
    assert!(matches!(response.output, RouteOutput::Image(_)));

    assert_eq!(harness.usage(LayerKind::Free, "flash_daily").await.unwrap(), 250);
    assert_eq!(harness.usage(LayerKind::Free, "image_daily").await.unwrap(), 1);
    assert_eq!(
        harness.usage(LayerKind::Free, "flash_lite_daily").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn text_only_vision_request_leaves_image_quota_alone() {
    let harness = free_harness().await;
    let response = harness
        .route_text(TaskCategory::VisionAnalysis, "describe the meal I ate")
        .await
        .unwrap();

    assert_eq!(model_key(&response), "flash");
    assert_eq!(response.selection.cost_unit, CostUnit::PerRequest);
    assert!(matches!(response.output, RouteOutput::Text(_)));
    assert_eq!(harness.usage(LayerKind::Free, "image_daily").await.unwrap(), 0);
    assert_eq!(harness.usage(LayerKind::Free, "flash_daily").await.unwrap(), 1);
}

#[tokio::test]
async fn simple_text_escalates_after_budget_daily_quota() {
    let harness = free_harness().await;
    for _ in 0..1000 {
        harness
            .route_text(TaskCategory::SimpleText, "hi")
            .await
            .unwrap();
    }

    let response = harness
        .route_text(TaskCategory::SimpleText, "hi again")
        .await
        .unwrap();
    assert_eq!(model_key(&response), "flash");
    assert_eq!(response.selection.quality_tier, QualityTier::Premium);
    assert!(response.selection.within_limits);
    assert_eq!(response.selection.estimated_cost, 0.0);
}

#[tokio::test]
async fn daily_reset_returns_to_budget_model() {
    let harness = free_harness().await;
    harness
        .fill(LayerKind::Free, "flash_lite_daily", 1000)
        .await
        .unwrap();
    let r = harness.route_text(TaskCategory::Coaching, "x").await.unwrap();
    assert_eq!(model_key(&r), "flash");

    harness.clock.advance_days(1);
    let r = harness.route_text(TaskCategory::Coaching, "x").await.unwrap();
    assert_eq!(model_key(&r), "flash_lite");
    assert_eq!(
        harness.usage(LayerKind::Free, "flash_lite_daily").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn provider_failure_leaves_ledger_untouched() {
    let harness = TestHarness::builder().build().await.unwrap();
    let gemini = harness.provider("gemini").unwrap();
    gemini.fail_next(1);

    let err = harness
        .route_text(TaskCategory::SimpleText, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CostwiseError::Provider { .. }));
    assert_eq!(gemini.call_count(), 1);

    let paid = harness.ledgers.get(LayerKind::Paid).unwrap();
    assert_eq!(paid.current_usage("flash_lite_monthly_spend").await.unwrap(), 0);
    assert_eq!(paid.reserved("flash_lite_monthly_spend").unwrap(), 0);
}

#[tokio::test]
async fn unavailable_provider_triggers_one_reselection() {
    let harness = TestHarness::builder().build().await.unwrap();
    let perplexity = harness.provider("perplexity").unwrap();
    perplexity.set_available(false);

    let response = harness
        .route_text(TaskCategory::CurrentInfoResearch, "price of oats today")
        .await
        .unwrap();
    assert_eq!(model_key(&response), "flash_lite");
    assert_eq!(response.selection.quality_tier, QualityTier::Budget);
    assert_eq!(perplexity.call_count(), 0);
    assert_eq!(
        harness
            .usage(LayerKind::Paid, "search_monthly_spend")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn missing_credential_counts_as_unavailable() {
    let harness = TestHarness::builder()
        .without_credential("perplexity")
        .build()
        .await
        .unwrap();

    let response = harness
        .route_text(TaskCategory::ProductResearch, "best protein bar")
        .await
        .unwrap();
    assert_eq!(model_key(&response), "flash_lite");

    // Previews ignore credentials.
    let preview = harness
        .router
        .preview(TaskCategory::ProductResearch, false)
        .await
        .unwrap();
    assert_eq!(preview.provider(), Some("perplexity"));
}

#[tokio::test]
async fn no_remaining_provider_is_reselection_exhausted() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.provider("gemini").unwrap().set_available(false);

    let err = harness
        .route_text(TaskCategory::SimpleText, "hi")
        .await
        .unwrap_err();
    match err {
        CostwiseError::ReselectionExhausted { category, excluded } => {
            assert_eq!(category, "simple-text");
            assert_eq!(excluded, vec!["gemini".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn reselection_happens_at_most_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.provider("gemini").unwrap().set_available(false);
    harness.provider("perplexity").unwrap().set_available(false);

    let err = harness
        .route_text(TaskCategory::CurrentInfoResearch, "news")
        .await
        .unwrap_err();
    match err {
        CostwiseError::ReselectionExhausted { excluded, .. } => {
            assert_eq!(excluded, vec!["gemini".to_string(), "perplexity".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn abort_policy_blocks_over_budget_requests() {
    let harness = TestHarness::builder()
        .with_policy(OverBudgetPolicy::Abort)
        .build()
        .await
        .unwrap();
    harness
        .fill(LayerKind::Paid, "flash_lite_monthly_spend", 375)
        .await
        .unwrap();
    harness
        .fill(LayerKind::Paid, "flash_monthly_spend", 233)
        .await
        .unwrap();

    let err = harness
        .route_text(TaskCategory::General, "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, CostwiseError::BudgetExhausted { .. }));
    assert_eq!(harness.provider("gemini").unwrap().call_count(), 0);
}

#[tokio::test]
async fn execute_policy_serves_over_budget_without_growing_spend() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .fill(LayerKind::Paid, "flash_lite_monthly_spend", 375)
        .await
        .unwrap();
    harness
        .fill(LayerKind::Paid, "flash_monthly_spend", 233)
        .await
        .unwrap();
    let before = harness.report().await.unwrap().total_spend_usd;

    let response = harness
        .route_text(TaskCategory::General, "anything")
        .await
        .unwrap();
    assert_eq!(response.selection.quality_tier, QualityTier::OverBudget);
    assert!(!response.selection.within_limits);
    assert!((response.selection.estimated_cost - 0.004).abs() < 1e-12);

    let after = harness.report().await.unwrap().total_spend_usd;
    assert_eq!(before, after);
}

#[tokio::test]
async fn concurrent_routes_never_exceed_caps() {
    let config = load_config_from_str(
        r#"
[router]
active_layers = ["free"]

[quota.daily_caps]
flash_lite = 5
flash = 3
"#,
    )
    .unwrap();
    let harness = TestHarness::builder()
        .with_config(config)
        .build()
        .await
        .unwrap();

    let tasks = (0..20).map(|i| {
        let router = Arc::clone(&harness.router);
        tokio::spawn(async move {
            router
                .route(TaskCategory::SimpleText, RoutePayload::text(format!("msg {i}")))
                .await
        })
    });
    let responses: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let within = responses.iter().filter(|r| r.selection.within_limits).count();
    assert_eq!(within, 8);
    assert_eq!(
        harness.usage(LayerKind::Free, "flash_lite_daily").await.unwrap(),
        5
    );
    assert_eq!(harness.usage(LayerKind::Free, "flash_daily").await.unwrap(), 3);
    let free = harness.ledgers.get(LayerKind::Free).unwrap();
    assert_eq!(free.reserved("flash_lite_daily").unwrap(), 0);
}

#[tokio::test]
async fn estimate_has_no_side_effects() {
    let harness = TestHarness::builder().build().await.unwrap();

    let cost = harness
        .router
        .estimate_task_cost(TaskCategory::CurrentInfoResearch, false, None)
        .await
        .unwrap();
    assert_eq!(cost.model_key.as_deref(), Some("search"));
    assert_eq!(cost.cost_unit, CostUnit::PerSearch);
    assert!((cost.total_usd - 0.005).abs() < 1e-12);

    let cost = harness
        .router
        .estimate_task_cost(
            TaskCategory::CurrentInfoResearch,
            false,
            Some(TokenEstimate::new(1_000, 1_000)),
        )
        .await
        .unwrap();
    // $1/Mtok each way plus the $0.005 search fee.
    assert!((cost.total_usd - 0.007).abs() < 1e-12);

    let paid = harness.ledgers.get(LayerKind::Paid).unwrap();
    assert_eq!(paid.current_usage("search_monthly_spend").await.unwrap(), 0);
    assert_eq!(paid.reserved("search_monthly_spend").unwrap(), 0);
}

#[tokio::test]
async fn free_layer_estimate_is_zero() {
    let harness = free_harness().await;
    let cost = harness
        .router
        .estimate_task_cost(
            TaskCategory::VisionAnalysis,
            true,
            Some(TokenEstimate::new(2_000, 500)),
        )
        .await
        .unwrap();
    assert_eq!(cost.model_key.as_deref(), Some("flash"));
    assert_eq!(cost.total_usd, 0.0);
    assert!(cost.token_cost_usd.unwrap() > 0.0);
}

#[tokio::test]
async fn counts_survive_restart() {
    let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
    for _ in 0..3 {
        harness
            .route_text(TaskCategory::StructuredExtraction, "eggs, milk")
            .await
            .unwrap();
    }

    let reopened = harness.reopened_ledgers().await.unwrap();
    let paid = reopened.get(LayerKind::Paid).unwrap();
    assert_eq!(paid.current_usage("flash_lite_monthly_spend").await.unwrap(), 3);
}

#[tokio::test]
async fn report_reflects_routed_requests() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .route_text(TaskCategory::DataAnalysis, "trend")
        .await
        .unwrap();
    harness
        .route_text(TaskCategory::CurrentInfoResearch, "news")
        .await
        .unwrap();

    let report = harness.report().await.unwrap();
    assert!((report.total_spend_usd - 0.020).abs() < 1e-9);
    assert_eq!(report.quality_distribution[&QualityTier::Premium], 1);
    assert_eq!(report.quality_distribution[&QualityTier::Specialized], 1);
    assert_eq!(report, harness.report().await.unwrap());
}

#[tokio::test]
#[traced_test]
async fn routed_request_is_logged() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .route_text(TaskCategory::General, "hello")
        .await
        .unwrap();
    assert!(logs_contain("request routed"));
    assert!(logs_contain("usage recorded"));
}

#[tokio::test]
#[traced_test]
async fn excluded_provider_is_logged_with_reason() {
    let harness = TestHarness::builder()
        .without_credential("perplexity")
        .build()
        .await
        .unwrap();
    harness
        .route_text(TaskCategory::CurrentInfoResearch, "weather")
        .await
        .unwrap();
    assert!(logs_contain("provider `perplexity` unavailable: missing credential"));
}

/// Free layer on a store whose writes can be failed, paid layer in memory.
fn flaky_free_ledgers() -> (CostwiseConfig, LedgerSet, Arc<FlakyCounterStore>) {
    let config = load_config_from_str("[router]\nactive_layers = [\"free\", \"paid\"]\n").unwrap();
    let flaky = Arc::new(FlakyCounterStore::new());
    let free_store = Arc::clone(&flaky);
    let clock: Arc<dyn Clock> =
        Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()));
    let ledgers = LedgerSet::from_config(
        &config,
        |layer| match layer {
            LayerKind::Free => Arc::clone(&free_store) as Arc<dyn CounterStore>,
            _ => Arc::new(MemoryCounterStore::new()) as Arc<dyn CounterStore>,
        },
        clock,
    );
    (config, ledgers, flaky)
}

#[tokio::test]
async fn failed_charge_does_not_stop_later_charges() {
    let (config, ledgers, flaky) = flaky_free_ledgers();
    let snapshot = ledgers.snapshot().await.unwrap();
    let selection =
        SelectionEngine::from_config(&config).select(TaskCategory::SimpleText, false, &snapshot);
    assert!(selection.charges.iter().any(|c| c.layer == LayerKind::Free));

    flaky.set_fail_writes(true);
    let result = UsageRecorder::new(ledgers.clone()).commit(&selection).await;

    assert!(matches!(result, Err(CostwiseError::Storage { .. })));
    let paid = ledgers.get(LayerKind::Paid).unwrap();
    assert_eq!(paid.current_usage("flash_lite_monthly_spend").await.unwrap(), 1);
}

#[tokio::test]
#[traced_test]
async fn served_response_survives_failed_usage_commit() {
    let (config, ledgers, flaky) = flaky_free_ledgers();
    let router = Router::new(SelectionEngine::from_config(&config), ledgers.clone())
        .with_provider(Arc::new(MockProvider::with_responses(
            "gemini",
            vec!["served".into()],
        )));
    // Period anchors are written on first read; seed them before writes fail.
    ledgers.snapshot().await.unwrap();
    flaky.set_fail_writes(true);

    let response = router
        .route(TaskCategory::SimpleText, RoutePayload::text("rephrase this"))
        .await
        .unwrap();

    assert_eq!(response.output, RouteOutput::Text("served".into()));
    assert!(flaky.rejected_writes() >= 1);
    let paid = ledgers.get(LayerKind::Paid).unwrap();
    assert_eq!(paid.current_usage("flash_lite_monthly_spend").await.unwrap(), 1);
    assert_eq!(paid.reserved("flash_lite_monthly_spend").unwrap(), 0);
    assert!(logs_contain("usage commit failed"));
}
