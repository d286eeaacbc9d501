//! Run endpoints: manual "run-now" plus read access.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orb_storage::models::{AccountRunRow, RunRow};

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RunNowRequest {
    pub strategy_id: Uuid,
    /// Same shape as a schedule's selector; defaults to healthy accounts.
    #[serde(default)]
    pub account_selector: Option<serde_json::Value>,
    #[serde(default)]
    pub triggered_by: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RunDetail {
    pub run: RunRow,
    pub account_runs: Vec<AccountRunRow>,
}

pub async fn run_now(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(request): Json<RunNowRequest>,
) -> Response {
    let strategy = match state
        .store
        .get_strategy_scoped(workspace_id, request.strategy_id)
        .await
    {
        Ok(Some(strategy)) => strategy,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "strategy not found"),
        Err(error) => return db_error(error),
    };

    let selector = request
        .account_selector
        .unwrap_or_else(|| serde_json::json!({}));
    let accounts = match state
        .store
        .resolve_account_selector(workspace_id, &selector)
        .await
    {
        Ok(accounts) => accounts,
        Err(error) => return db_error(error),
    };
    if accounts.is_empty() {
        return api_error(StatusCode::CONFLICT, "no accounts match the selector");
    }

    let account_ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
    let (run, account_runs) = match state
        .store
        .create_run(
            workspace_id,
            None,
            strategy.id,
            request.triggered_by,
            &account_ids,
        )
        .await
    {
        Ok(created) => created,
        Err(error) => return db_error(error),
    };

    tracing::info!(run_id = %run.id, accounts = account_runs.len(), "run-now triggered");
    for account_run in &account_runs {
        state.queue.enqueue(account_run.id);
    }

    (
        StatusCode::CREATED,
        Json(RunDetail { run, account_runs }),
    )
        .into_response()
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
) -> Response {
    match state.store.list_runs(workspace_id).await {
        Ok(runs) => Json(runs).into_response(),
        Err(error) => db_error(error),
    }
}

pub async fn get_one(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
) -> Response {
    let run = match state.store.get_run_scoped(workspace_id, id).await {
        Ok(Some(run)) => run,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "run not found"),
        Err(error) => return db_error(error),
    };
    match state.store.account_runs_for_run(run.id).await {
        Ok(account_runs) => Json(RunDetail { run, account_runs }).into_response(),
        Err(error) => db_error(error),
    }
}
