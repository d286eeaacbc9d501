//! End-to-end executor scenarios against an in-memory store and a
//! scripted worker.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use orb_protocol::{codes, ExecuteActionResult};
use orb_storage::models::{
    month_period_start, AccountRunStatus, AccountStatus, ActionRowStatus, RunStatus,
};
use orb_storage::store::NewSubscription;

use crate::runtime::executor::execute_account_run;
use crate::runtime::test_support::{test_state, FakeCluster, ScriptedBatch};
use crate::state::AppState;

struct Scenario {
    state: AppState,
    cluster: Arc<FakeCluster>,
    workspace_id: Uuid,
    account_id: Uuid,
    strategy_id: Uuid,
    _artifacts_dir: tempfile::TempDir,
}

impl Scenario {
    /// Healthy account with a sealed storage-state credential and one
    /// strategy with the given config.
    async fn new(config: serde_json::Value) -> Self {
        let cluster = Arc::new(FakeCluster::new());
        let (state, _rx, dir) = test_state(cluster.clone()).await;

        let ws = state.store.create_workspace("acme").await.unwrap();
        let strategy = state
            .store
            .create_strategy(ws.id, "strategy", "x", config)
            .await
            .unwrap();
        let account = state
            .store
            .create_social_account(ws.id, "x", Some("@acme"), serde_json::json!({}))
            .await
            .unwrap();
        state
            .store
            .set_account_status(account.id, AccountStatus::Healthy, Some(Utc::now()))
            .await
            .unwrap();

        let vault = state.vault.as_ref().unwrap();
        let blob = vault
            .encrypt_json(&serde_json::json!({"cookies": [], "origins": []}))
            .unwrap();
        state
            .store
            .upsert_storage_state_credential(ws.id, account.id, &blob, 1)
            .await
            .unwrap();

        Self {
            state,
            cluster,
            workspace_id: ws.id,
            account_id: account.id,
            strategy_id: strategy.id,
            _artifacts_dir: dir,
        }
    }

    async fn start_run(&self) -> (Uuid, Uuid) {
        let (run, account_runs) = self
            .state
            .store
            .create_run(self.workspace_id, None, self.strategy_id, None, &[self.account_id])
            .await
            .unwrap();
        (run.id, account_runs[0].id)
    }

    async fn execute(&self, account_run_id: Uuid) {
        execute_account_run(&self.state, account_run_id).await.unwrap();
    }

    async fn actions(&self, account_run_id: Uuid) -> Vec<orb_storage::models::ActionRow> {
        self.state
            .store
            .actions_for_account_run(account_run_id)
            .await
            .unwrap()
    }
}

fn like_config(urls: &[&str]) -> serde_json::Value {
    serde_json::json!({"type": "x_like", "targets": urls})
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seed scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn manual_run_single_like_succeeds() {
    let scenario = Scenario::new(like_config(&["https://x.com/user/status/111"])).await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded(),
    ]));

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].action_type, "health_check");
    assert_eq!(
        actions[0].idempotency_key,
        format!(
            "{}:{}:health_check:{run_id}",
            scenario.workspace_id, scenario.account_id
        )
    );
    assert_eq!(actions[1].action_type, "x_like");
    assert_eq!(
        actions[1].idempotency_key,
        format!(
            "{}:{}:x_like:111:v1",
            scenario.workspace_id, scenario.account_id
        )
    );
    assert!(actions.iter().all(|a| a.status == ActionRowStatus::Succeeded));

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account_run.status, AccountRunStatus::Succeeded);
    assert!(account_run.started_at.unwrap() <= account_run.finished_at.unwrap());

    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);

    // Exactly one batch, two positions, in planner order.
    let requests = scenario.cluster.batch_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].actions.len(), 2);
    assert_eq!(requests[0].actions[0].action_type, "health_check");
}

#[tokio::test]
async fn replan_reuses_completed_action_and_skips_dispatch() {
    let scenario = Scenario::new(like_config(&["https://x.com/user/status/111"])).await;

    // First run completes both actions.
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded(),
    ]));
    let (_, first_account_run) = scenario.start_run().await;
    scenario.execute(first_account_run).await;
    let first_actions = scenario.actions(first_account_run).await;
    let like_id = first_actions[1].id;

    // Second run, same strategy version: the like is already succeeded,
    // so only the (fresh) health check is dispatched.
    scenario
        .cluster
        .script_batch(ScriptedBatch::Results(vec![ExecuteActionResult::succeeded()]));
    let (second_run, second_account_run) = scenario.start_run().await;
    scenario.execute(second_account_run).await;

    let requests = scenario.cluster.batch_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].actions.len(), 1, "only health_check dispatched");
    assert_eq!(requests[1].actions[0].action_type, "health_check");

    // The like row was reused, not duplicated.
    let reused = scenario
        .state
        .store
        .get_action_by_key(
            scenario.workspace_id,
            &format!(
                "{}:{}:x_like:111:v1",
                scenario.workspace_id, scenario.account_id
            ),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reused.id, like_id);
    assert_eq!(reused.account_run_id, first_account_run);

    let run = scenario.state.store.get_run(second_run).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn auth_failure_flips_account_to_needs_login() {
    let scenario = Scenario::new(like_config(&["https://x.com/user/status/111"])).await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::failed(codes::AUTH_REQUIRED, "Not logged in"),
    ]));

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let account = scenario
        .state
        .store
        .get_social_account(scenario.workspace_id, scenario.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.status, AccountStatus::NeedsLogin);

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account_run.status, AccountRunStatus::Failed);
    assert_eq!(account_run.error_code.as_deref(), Some(codes::AUTH_REQUIRED));

    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn batch_abort_chain_carries_first_actionable_code() {
    let scenario = Scenario::new(like_config(&[
        "https://x.com/a/status/1",
        "https://x.com/b/status/2",
    ]))
    .await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::failed(codes::UI_INTERCEPTED, "like button not clickable"),
        ExecuteActionResult::failed(codes::ABORTED, "previous action failed"),
    ]));

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 3);
    assert_eq!(actions[0].status, ActionRowStatus::Succeeded);
    assert_eq!(actions[1].status, ActionRowStatus::Failed);
    assert_eq!(actions[1].error_code.as_deref(), Some(codes::UI_INTERCEPTED));
    assert_eq!(actions[2].status, ActionRowStatus::Failed);
    assert_eq!(actions[2].error_code.as_deref(), Some(codes::ABORTED));

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account_run.error_code.as_deref(),
        Some(codes::UI_INTERCEPTED),
        "first non-ABORTED code wins"
    );
}

#[tokio::test]
async fn search_then_act_runs_two_phases() {
    let scenario = Scenario::new(serde_json::json!({
        "type": "x_search_like",
        "keywords": ["golang"],
        "verified_only": true,
        "max_actions": 2
    }))
    .await;

    let candidates: Vec<serde_json::Value> = (1..=5)
        .map(|i| {
            serde_json::json!({
                "tweet_id": i.to_string(),
                "url": format!("https://x.com/u/status/{i}"),
                "is_verified": true
            })
        })
        .collect();
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded()
            .with_metadata("candidates", serde_json::Value::Array(candidates))
            .with_metadata("collected", 5.into()),
    ]));
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded(),
    ]));

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let requests = scenario.cluster.batch_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].actions[1].action_type, "x_search_collect");
    let search_url = requests[0].actions[1].target_url.as_deref().unwrap();
    assert!(search_url.contains("q=golang"));
    assert!(search_url.contains("filter%3Averified"));
    assert_eq!(requests[1].actions.len(), 2, "max_actions caps phase two");
    assert!(requests[1].actions.iter().all(|a| a.action_type == "x_like"));

    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);

    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 4, "health + collect + 2 likes");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gates & failure modes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn transport_failure_fails_every_submitted_action() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    scenario.cluster.script_batch(ScriptedBatch::TransportError);

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 2);
    for action in &actions {
        assert_eq!(action.status, ActionRowStatus::Failed);
        assert_eq!(action.error_code.as_deref(), Some(codes::BROWSER_NODE_ERROR));
    }

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account_run.error_code.as_deref(),
        Some(codes::BROWSER_NODE_ERROR)
    );
    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn misaligned_result_count_is_total_failure() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    // Two submitted, one returned.
    scenario
        .cluster
        .script_batch(ScriptedBatch::Results(vec![ExecuteActionResult::succeeded()]));

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    assert!(actions
        .iter()
        .all(|a| a.error_code.as_deref() == Some(codes::BROWSER_NODE_ERROR)));
}

#[tokio::test]
async fn unhealthy_account_fails_auth_gate_without_dispatch() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    scenario
        .state
        .store
        .set_account_status(scenario.account_id, AccountStatus::NeedsLogin, None)
        .await
        .unwrap();

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    assert!(scenario.cluster.batch_requests().is_empty(), "worker never called");
    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 1, "only the health check row exists");
    assert_eq!(actions[0].status, ActionRowStatus::Failed);
    assert_eq!(actions[0].error_code.as_deref(), Some(codes::AUTH_REQUIRED));
}

#[tokio::test]
async fn undecryptable_credential_fails_closed() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    // Overwrite the credential with garbage bytes.
    scenario
        .state
        .store
        .upsert_storage_state_credential(
            scenario.workspace_id,
            scenario.account_id,
            b"not-a-sealed-blob",
            1,
        )
        .await
        .unwrap();

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account_run.error_code.as_deref(),
        Some(codes::CREDENTIAL_DECRYPT_FAILED)
    );
    assert!(scenario.cluster.batch_requests().is_empty());
}

#[tokio::test]
async fn inactive_subscription_blocks_execution() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    let mut sub = NewSubscription::active(scenario.workspace_id);
    sub.status = "past_due".into();
    scenario.state.store.set_subscription(&sub).await.unwrap();

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account_run.error_code.as_deref(),
        Some(codes::SUBSCRIPTION_INACTIVE)
    );
}

#[tokio::test]
async fn exhausted_runtime_quota_blocks_execution() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    let mut sub = NewSubscription::active(scenario.workspace_id);
    sub.automation_runtime_hours = Some(1);
    scenario.state.store.set_subscription(&sub).await.unwrap();
    scenario
        .state
        .store
        .add_runtime_seconds(scenario.workspace_id, month_period_start(Utc::now()), 3600)
        .await
        .unwrap();

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        account_run.error_code.as_deref(),
        Some(codes::RUNTIME_QUOTA_EXCEEDED)
    );
}

#[tokio::test]
async fn screenshot_results_become_artifacts_with_stripped_metadata() {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    let png = b"\x89PNG\r\n\x1a\nfake";
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::failed(codes::POST_VALIDATION_FAILED, "unlike not visible")
            .with_url("https://x.com/u/status/1")
            .with_screenshot(Some(BASE64.encode(png))),
    ]));

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    let failed = &actions[1];
    assert_eq!(failed.error_code.as_deref(), Some(codes::POST_VALIDATION_FAILED));
    assert_eq!(
        failed.metadata.0.get("current_url").and_then(|v| v.as_str()),
        Some("https://x.com/u/status/1")
    );
    assert!(
        failed.metadata.0.get("screenshot_base64").is_none(),
        "screenshot payload is stripped from persisted metadata"
    );

    // The artifact row and the workspace-sharded file both exist.
    let storage_key = format!("{}/{}-screenshot.png", scenario.workspace_id, failed.id);
    let path = scenario.state.config.artifacts.dir.join(&storage_key);
    assert_eq!(std::fs::read(&path).unwrap(), png);

    let artifacts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT storage_key, size FROM artifacts WHERE workspace_id = ?",
    )
    .bind(scenario.workspace_id)
    .fetch_all(scenario.state.store.pool())
    .await
    .unwrap();
    assert_eq!(artifacts, vec![(storage_key, png.len() as i64)]);
}

#[tokio::test]
async fn terminal_account_run_accrues_monthly_usage() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded(),
    ]));

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let account_run = scenario
        .state
        .store
        .get_account_run(account_run_id)
        .await
        .unwrap()
        .unwrap();
    let expected = (account_run.finished_at.unwrap() - account_run.started_at.unwrap())
        .num_seconds()
        .max(0);
    let recorded = scenario
        .state
        .store
        .get_usage(
            scenario.workspace_id,
            month_period_start(account_run.finished_at.unwrap()),
        )
        .await
        .unwrap()
        .map(|u| u.automation_runtime_seconds)
        .unwrap_or(0);
    assert_eq!(recorded, expected, "bucket holds exactly the run's wall-clock seconds");
}

#[tokio::test]
async fn second_receipt_of_the_same_task_is_silent() {
    let scenario = Scenario::new(like_config(&["https://x.com/u/status/1"])).await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::succeeded(),
    ]));

    let (_, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;
    // No scripted batch remains; a re-execution must not reach the worker.
    scenario.execute(account_run_id).await;
    assert_eq!(scenario.cluster.batch_requests().len(), 1);
}

#[tokio::test]
async fn unknown_strategy_type_runs_health_check_only() {
    let scenario = Scenario::new(serde_json::json!({"type": "interpretive_dance"})).await;
    scenario
        .cluster
        .script_batch(ScriptedBatch::Results(vec![ExecuteActionResult::succeeded()]));

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    let actions = scenario.actions(account_run_id).await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, "health_check");
    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn skipped_collect_ends_run_without_follow_up() {
    let scenario = Scenario::new(serde_json::json!({
        "type": "x_search_like",
        "query": "rust"
    }))
    .await;
    scenario.cluster.script_batch(ScriptedBatch::Results(vec![
        ExecuteActionResult::succeeded(),
        ExecuteActionResult::skipped("No search results")
            .with_metadata("candidates", serde_json::json!([]))
            .with_metadata("collected", 0.into()),
    ]));

    let (run_id, account_run_id) = scenario.start_run().await;
    scenario.execute(account_run_id).await;

    assert_eq!(scenario.cluster.batch_requests().len(), 1, "no second phase");
    let run = scenario.state.store.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
}
