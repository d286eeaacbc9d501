//! Per-AccountRun executor.
//!
//! One invocation executes one account's plan end to end: entry guard,
//! sanity gates, idempotent action materialization, worker batch dispatch,
//! result persistence (screenshots included), account-health flips, usage
//! accounting, and the parent-run rollup. Suspends only at database and
//! worker boundaries.

use chrono::Utc;
use orb_protocol::{codes, ActionRequest, ActionStatus, ExecuteActionResult, ExecuteBatchRequest};
use orb_storage::models::{
    month_period_start, AccountRunStatus, AccountStatus, ActionRow, ActionRowStatus,
    SocialAccountRow,
};
use orb_storage::store::NewAction;
use uuid::Uuid;

use orb_protocol::BandwidthMode;

use crate::runtime::plan::{self, PlannedAction, StrategyPlan};
use crate::state::AppState;

pub async fn execute_account_run(state: &AppState, account_run_id: Uuid) -> sqlx::Result<()> {
    let store = &state.store;
    let now = Utc::now();

    let Some(account_run) = store.get_account_run(account_run_id).await? else {
        return Ok(());
    };
    if !account_run.status.is_executable() {
        // Idempotent task receipt: duplicates and stale enqueues are silent.
        return Ok(());
    }
    if !store.try_start_account_run(account_run_id, now).await? {
        return Ok(());
    }
    store.mark_run_running(account_run.run_id, now).await?;

    let Some(run) = store.get_run(account_run.run_id).await? else {
        return Ok(());
    };
    let workspace_id = account_run.workspace_id;
    tracing::info!(
        account_run_id = %account_run_id,
        run_id = %run.id,
        "account run started"
    );

    let ctx = Ctx {
        state,
        workspace_id,
        account_run_id,
        run_id: run.id,
    };

    // ── Sanity gates ────────────────────────────────────────────────
    let Some(strategy) = store.get_strategy(run.strategy_id).await? else {
        return ctx.fail(codes::STRATEGY_NOT_FOUND).await;
    };
    let Some(account) = store
        .get_social_account(workspace_id, account_run.social_account_id)
        .await?
    else {
        return ctx.fail(codes::ACCOUNT_NOT_FOUND).await;
    };

    // ── Subscription gates (read-only) ──────────────────────────────
    if let Some(subscription) = store.get_subscription(workspace_id).await? {
        if !subscription.is_active(now) {
            return ctx.fail(codes::SUBSCRIPTION_INACTIVE).await;
        }
        if let Some(hours) = subscription.automation_runtime_hours.filter(|h| *h > 0) {
            let used = store
                .get_usage(workspace_id, month_period_start(now))
                .await?
                .map(|u| u.automation_runtime_seconds)
                .unwrap_or(0);
            if used >= hours * 3600 {
                return ctx.fail(codes::RUNTIME_QUOTA_EXCEEDED).await;
            }
        }
    }

    // ── Health gate, surfaced through the health-check action row ───
    let health = plan::health_check_action(workspace_id, account.id, run.id);
    let health_row = ctx.materialize(&strategy_meta(&strategy), &health).await?;

    let credential = store
        .get_storage_state_credential(workspace_id, account.id)
        .await?;
    let credential = match credential {
        Some(credential) if account.status == AccountStatus::Healthy => credential,
        _ => {
            if !health_row.status.is_done() {
                store
                    .finish_action(
                        health_row.id,
                        ActionRowStatus::Failed,
                        Some(codes::AUTH_REQUIRED),
                        health_row.metadata.0.clone(),
                        Utc::now(),
                    )
                    .await?;
            }
            return ctx.fail(codes::AUTH_REQUIRED).await;
        }
    };

    // ── Credential decryption ───────────────────────────────────────
    let Some(vault) = state.vault.as_ref() else {
        return ctx.fail(codes::CREDENTIAL_DECRYPT_FAILED).await;
    };
    let storage_state = match vault.decrypt_json(&credential.encrypted_blob) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                account_run_id = %account_run_id,
                error = %error,
                "credential decryption failed"
            );
            return ctx.fail(codes::CREDENTIAL_DECRYPT_FAILED).await;
        }
    };

    // ── Plan construction ───────────────────────────────────────────
    let strategy_plan = plan::plan_strategy(
        workspace_id,
        account.id,
        strategy.version,
        &strategy.platform_key,
        &strategy.config.0,
        &mut rand::thread_rng(),
    );

    let meta = strategy_meta(&strategy);
    let mut phase_one = vec![(health, health_row)];
    let follow_up_spec = match &strategy_plan {
        StrategyPlan::Direct(actions) => {
            for action in actions {
                let row = ctx.materialize(&meta, action).await?;
                phase_one.push((action.clone(), row));
            }
            None
        }
        StrategyPlan::Search { collect, follow_up } => {
            let row = ctx.materialize(&meta, collect).await?;
            phase_one.push((collect.clone(), row));
            Some(follow_up.clone())
        }
        StrategyPlan::HealthCheckOnly => None,
    };

    let bandwidth_mode = bandwidth_mode_from(&strategy.config.0);
    let fingerprint = fingerprint_from(&account);

    // ── Phase one ───────────────────────────────────────────────────
    let outcome = ctx
        .dispatch_phase(
            &account,
            &storage_state,
            bandwidth_mode,
            fingerprint.clone(),
            &phase_one,
        )
        .await?;
    let executed = match outcome {
        PhaseOutcome::Transport => return ctx.fail(codes::BROWSER_NODE_ERROR).await,
        PhaseOutcome::Executed(executed) => executed,
    };

    ctx.flip_account_on_auth_failure(&account, &executed).await?;
    if let Some(code) = first_failure_code(&executed) {
        return ctx.fail(&code).await;
    }

    // ── Phase two (search strategies) ───────────────────────────────
    if let Some(follow_up) = follow_up_spec {
        let collect_id = phase_one
            .last()
            .map(|(_, row)| row.id)
            .unwrap_or_default();
        let candidates = match executed.iter().find(|(row, _)| row.id == collect_id) {
            Some((_, result)) => plan::candidates_from_metadata(&result.metadata),
            // Re-entry: the collect action completed in a previous attempt;
            // read its persisted result metadata instead.
            None => store
                .get_action(workspace_id, collect_id)
                .await?
                .and_then(|row| {
                    row.metadata
                        .0
                        .get("result")
                        .and_then(|v| v.as_object())
                        .map(plan::candidates_from_metadata)
                })
                .unwrap_or_default(),
        };

        let follow_ups = plan::follow_up_actions(
            workspace_id,
            account.id,
            strategy.version,
            &follow_up,
            candidates,
            &mut rand::thread_rng(),
        );
        if !follow_ups.is_empty() {
            let mut phase_two = Vec::with_capacity(follow_ups.len());
            for action in &follow_ups {
                let row = ctx.materialize(&meta, action).await?;
                phase_two.push((action.clone(), row));
            }
            let outcome = ctx
                .dispatch_phase(
                    &account,
                    &storage_state,
                    bandwidth_mode,
                    fingerprint,
                    &phase_two,
                )
                .await?;
            let executed = match outcome {
                PhaseOutcome::Transport => return ctx.fail(codes::BROWSER_NODE_ERROR).await,
                PhaseOutcome::Executed(executed) => executed,
            };
            ctx.flip_account_on_auth_failure(&account, &executed).await?;
            if let Some(code) = first_failure_code(&executed) {
                return ctx.fail(&code).await;
            }
        }
    }

    ctx.succeed().await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Ctx<'a> {
    state: &'a AppState,
    workspace_id: Uuid,
    account_run_id: Uuid,
    run_id: Uuid,
}

enum PhaseOutcome {
    /// Transport failure or shape mismatch; every submitted action was
    /// already marked failed `BROWSER_NODE_ERROR`.
    Transport,
    /// Per-action results for the submitted (not-yet-done) subset.
    Executed(Vec<(ActionRow, ExecuteActionResult)>),
}

impl Ctx<'_> {
    async fn materialize(
        &self,
        metadata: &serde_json::Value,
        action: &PlannedAction,
    ) -> sqlx::Result<ActionRow> {
        self.state
            .store
            .find_or_create_action(
                self.workspace_id,
                &NewAction {
                    account_run_id: self.account_run_id,
                    action_type: action.action_type.clone(),
                    platform_key: "x".into(),
                    target_external_id: action.target_external_id.clone(),
                    target_url: action.target_url.clone(),
                    idempotency_key: action.idempotency_key.clone(),
                    metadata: metadata.clone(),
                },
            )
            .await
    }

    /// Mark the not-yet-done subset running, dispatch it as one batch, and
    /// persist every result.
    async fn dispatch_phase(
        &self,
        account: &SocialAccountRow,
        storage_state: &serde_json::Value,
        bandwidth_mode: Option<BandwidthMode>,
        fingerprint_profile: Option<serde_json::Value>,
        slots: &[(PlannedAction, ActionRow)],
    ) -> sqlx::Result<PhaseOutcome> {
        let submitted: Vec<&(PlannedAction, ActionRow)> = slots
            .iter()
            .filter(|(_, row)| !row.status.is_done())
            .collect();
        if submitted.is_empty() {
            return Ok(PhaseOutcome::Executed(Vec::new()));
        }

        let started_at = Utc::now();
        let ids: Vec<Uuid> = submitted.iter().map(|(_, row)| row.id).collect();
        self.state.store.mark_actions_running(&ids, started_at).await?;

        let request = ExecuteBatchRequest {
            platform_key: account.platform_key.clone(),
            storage_state: storage_state.clone(),
            bandwidth_mode,
            fingerprint_profile,
            actions: submitted
                .iter()
                .map(|(action, _)| ActionRequest {
                    action_type: action.action_type.clone(),
                    target_url: action.target_url.clone(),
                    target_external_id: action.target_external_id.clone(),
                    action_params: action.action_params.clone(),
                })
                .collect(),
        };

        let results = match self.state.cluster.execute_batch(request).await {
            Ok(results) if results.len() == submitted.len() => results,
            Ok(results) => {
                tracing::error!(
                    account_run_id = %self.account_run_id,
                    submitted = submitted.len(),
                    returned = results.len(),
                    "worker returned misaligned batch"
                );
                self.fail_submitted(&submitted, "worker returned misaligned batch")
                    .await?;
                return Ok(PhaseOutcome::Transport);
            }
            Err(error) => {
                tracing::error!(
                    account_run_id = %self.account_run_id,
                    error = %error,
                    "worker batch call failed"
                );
                self.fail_submitted(&submitted, &error.to_string()).await?;
                return Ok(PhaseOutcome::Transport);
            }
        };

        let mut executed = Vec::with_capacity(results.len());
        for ((_, row), result) in submitted.into_iter().zip(results) {
            let updated = self.persist_result(row.clone(), &result).await?;
            executed.push((updated, result));
        }
        Ok(PhaseOutcome::Executed(executed))
    }

    async fn fail_submitted(
        &self,
        submitted: &[&(PlannedAction, ActionRow)],
        message: &str,
    ) -> sqlx::Result<()> {
        let now = Utc::now();
        for (_, row) in submitted {
            let mut metadata = object(&row.metadata.0);
            metadata.insert("message".into(), message.into());
            self.state
                .store
                .finish_action(
                    row.id,
                    ActionRowStatus::Failed,
                    Some(codes::BROWSER_NODE_ERROR),
                    serde_json::Value::Object(metadata),
                    now,
                )
                .await?;
        }
        Ok(())
    }

    /// Persist one worker result onto its action row; screenshots become
    /// artifacts, the base64 payload never reaches row metadata.
    async fn persist_result(
        &self,
        row: ActionRow,
        result: &ExecuteActionResult,
    ) -> sqlx::Result<ActionRow> {
        let status = match result.status {
            ActionStatus::Succeeded => ActionRowStatus::Succeeded,
            ActionStatus::Skipped => ActionRowStatus::Skipped,
            ActionStatus::Failed => ActionRowStatus::Failed,
        };

        let mut metadata = object(&row.metadata.0);
        if let Some(message) = &result.message {
            metadata.insert("message".into(), message.clone().into());
        }
        if let Some(url) = &result.current_url {
            metadata.insert("current_url".into(), url.clone().into());
        }
        if !result.metadata.is_empty() {
            metadata.insert(
                "result".into(),
                serde_json::Value::Object(result.metadata.clone()),
            );
        }

        self.state
            .store
            .finish_action(
                row.id,
                status,
                result.error_code.as_deref(),
                serde_json::Value::Object(metadata),
                Utc::now(),
            )
            .await?;

        if let Some(encoded) = &result.screenshot_base64 {
            self.store_screenshot(row.id, encoded).await?;
        }

        self.state
            .store
            .get_action(self.workspace_id, row.id)
            .await
            .map(|updated| updated.unwrap_or(row))
    }

    /// Decode and write the screenshot, then record the artifact row.
    /// Decode/write failures are silent — no artifact row, action intact.
    async fn store_screenshot(&self, action_id: Uuid, encoded: &str) -> sqlx::Result<()> {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;

        let bytes = match BASE64.decode(encoded) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(action_id = %action_id, error = %error, "screenshot decode failed");
                return Ok(());
            }
        };

        let storage_key = format!("{}/{action_id}-screenshot.png", self.workspace_id);
        let path = self.state.config.artifacts.dir.join(&storage_key);
        if let Some(parent) = path.parent() {
            if let Err(error) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(action_id = %action_id, error = %error, "artifact dir create failed");
                return Ok(());
            }
        }
        if let Err(error) = tokio::fs::write(&path, &bytes).await {
            tracing::warn!(action_id = %action_id, error = %error, "screenshot write failed");
            return Ok(());
        }

        self.state
            .store
            .insert_screenshot_artifact(
                self.workspace_id,
                action_id,
                &storage_key,
                bytes.len() as i64,
            )
            .await?;
        Ok(())
    }

    /// An `AUTH_REQUIRED` action failure flips the account back to
    /// `needs_login` and stamps the health check.
    async fn flip_account_on_auth_failure(
        &self,
        account: &SocialAccountRow,
        executed: &[(ActionRow, ExecuteActionResult)],
    ) -> sqlx::Result<()> {
        let auth_failed = executed.iter().any(|(_, result)| {
            result.status == ActionStatus::Failed
                && result.error_code.as_deref() == Some(codes::AUTH_REQUIRED)
        });
        if auth_failed {
            self.state
                .store
                .set_account_status(account.id, AccountStatus::NeedsLogin, Some(Utc::now()))
                .await?;
        }
        Ok(())
    }

    async fn fail(&self, error_code: &str) -> sqlx::Result<()> {
        tracing::warn!(
            account_run_id = %self.account_run_id,
            error_code,
            "account run failed"
        );
        self.finish(AccountRunStatus::Failed, Some(error_code)).await
    }

    async fn succeed(&self) -> sqlx::Result<()> {
        tracing::info!(account_run_id = %self.account_run_id, "account run succeeded");
        self.finish(AccountRunStatus::Succeeded, None).await
    }

    async fn finish(
        &self,
        status: AccountRunStatus,
        error_code: Option<&str>,
    ) -> sqlx::Result<()> {
        let now = Utc::now();
        let store = &self.state.store;
        store
            .finish_account_run(self.account_run_id, status, error_code, now)
            .await?;

        // Usage accounting: wall-clock seconds of this account run,
        // bucketed into the UTC month of completion.
        if let Some(account_run) = store.get_account_run(self.account_run_id).await? {
            if let (Some(started), Some(finished)) =
                (account_run.started_at, account_run.finished_at)
            {
                let seconds = (finished - started).num_seconds().max(0);
                store
                    .add_runtime_seconds(
                        self.workspace_id,
                        month_period_start(finished),
                        seconds,
                    )
                    .await?;
            }
        }

        if let Some(run_status) = store.finalize_run_if_done(self.run_id, now).await? {
            tracing::info!(run_id = %self.run_id, status = ?run_status, "run rolled up");
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn strategy_meta(strategy: &orb_storage::models::StrategyRow) -> serde_json::Value {
    serde_json::json!({
        "strategy_id": strategy.id,
        "strategy_version": strategy.version,
    })
}

fn object(value: &serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn bandwidth_mode_from(config: &serde_json::Value) -> Option<BandwidthMode> {
    match config.get("bandwidth_mode").and_then(|v| v.as_str()) {
        Some("eco") => Some(BandwidthMode::Eco),
        Some("balanced") => Some(BandwidthMode::Balanced),
        Some("full") => Some(BandwidthMode::Full),
        _ => None,
    }
}

fn fingerprint_from(account: &SocialAccountRow) -> Option<serde_json::Value> {
    account
        .fingerprint_profile
        .0
        .as_object()
        .filter(|map| !map.is_empty())
        .map(|map| serde_json::Value::Object(map.clone()))
}

/// First non-`ABORTED` failure code in the batch, falling back to
/// `ACTION_FAILED`. `None` when nothing failed.
pub(crate) fn first_failure_code(
    executed: &[(ActionRow, ExecuteActionResult)],
) -> Option<String> {
    let failures: Vec<&ExecuteActionResult> = executed
        .iter()
        .filter(|(_, result)| result.status == ActionStatus::Failed)
        .map(|(_, result)| result)
        .collect();
    if failures.is_empty() {
        return None;
    }
    failures
        .iter()
        .filter_map(|result| result.error_code.as_deref())
        .find(|code| *code != codes::ABORTED)
        .map(String::from)
        .or_else(|| Some(codes::ACTION_FAILED.to_string()))
}
