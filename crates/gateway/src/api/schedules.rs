//! Schedule endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use orb_storage::models::ScheduleFrequency;
use orb_storage::store::{NewSchedule, ScheduleUpdate};

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub strategy_id: Uuid,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: ScheduleFrequency,
    #[serde(default)]
    pub schedule_spec: Option<serde_json::Value>,
    #[serde(default)]
    pub random_config: Option<serde_json::Value>,
    #[serde(default)]
    pub account_selector: Option<serde_json::Value>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: i64,
}

fn default_enabled() -> bool {
    true
}
fn default_max_parallel() -> i64 {
    1
}

pub async fn create(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(request): Json<CreateScheduleRequest>,
) -> Response {
    match state
        .store
        .get_strategy_scoped(workspace_id, request.strategy_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "strategy not found"),
        Err(error) => return db_error(error),
    }

    let new = NewSchedule {
        workspace_id,
        name: request.name,
        strategy_id: request.strategy_id,
        enabled: request.enabled,
        frequency: request.frequency,
        schedule_spec: request.schedule_spec.unwrap_or_else(|| serde_json::json!({})),
        random_config: request.random_config.unwrap_or_else(|| serde_json::json!({})),
        account_selector: request
            .account_selector
            .unwrap_or_else(|| serde_json::json!({})),
        max_parallel: request.max_parallel.max(1),
    };
    match state.store.create_schedule(&new).await {
        Ok(schedule) => (StatusCode::CREATED, Json(schedule)).into_response(),
        Err(error) => db_error(error),
    }
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
) -> Response {
    match state.store.list_schedules(workspace_id).await {
        Ok(schedules) => Json(schedules).into_response(),
        Err(error) => db_error(error),
    }
}

#[derive(Deserialize, Default)]
pub struct UpdateScheduleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub frequency: Option<ScheduleFrequency>,
    #[serde(default)]
    pub schedule_spec: Option<serde_json::Value>,
    #[serde(default)]
    pub random_config: Option<serde_json::Value>,
    #[serde(default)]
    pub account_selector: Option<serde_json::Value>,
    #[serde(default)]
    pub max_parallel: Option<i64>,
}

pub async fn update(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Response {
    let update = ScheduleUpdate {
        name: request.name,
        enabled: request.enabled,
        frequency: request.frequency,
        schedule_spec: request.schedule_spec,
        random_config: request.random_config,
        account_selector: request.account_selector,
        max_parallel: request.max_parallel.map(|n| n.max(1)),
    };
    match state.store.update_schedule(workspace_id, id, &update).await {
        Ok(Some(schedule)) => Json(schedule).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "schedule not found"),
        Err(error) => db_error(error),
    }
}
