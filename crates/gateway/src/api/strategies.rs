//! Strategy endpoints. Config updates bump the version, which feeds the
//! action planner's idempotency keys.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateStrategyRequest {
    pub name: String,
    pub platform_key: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

pub async fn create(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(request): Json<CreateStrategyRequest>,
) -> Response {
    if orb_protocol::adapter_for(&request.platform_key).is_none() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("unsupported platform: {}", request.platform_key),
        );
    }
    let config = if request.config.is_null() {
        serde_json::json!({})
    } else {
        request.config
    };
    match state
        .store
        .create_strategy(workspace_id, &request.name, request.platform_key.trim(), config)
        .await
    {
        Ok(strategy) => (StatusCode::CREATED, Json(strategy)).into_response(),
        Err(error) => db_error(error),
    }
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
) -> Response {
    match state.store.list_strategies(workspace_id).await {
        Ok(strategies) => Json(strategies).into_response(),
        Err(error) => db_error(error),
    }
}

#[derive(Deserialize)]
pub struct UpdateStrategyRequest {
    pub config: serde_json::Value,
}

pub async fn update_config(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStrategyRequest>,
) -> Response {
    match state
        .store
        .update_strategy_config(workspace_id, id, request.config)
        .await
    {
        Ok(Some(strategy)) => Json(strategy).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "strategy not found"),
        Err(error) => db_error(error),
    }
}
