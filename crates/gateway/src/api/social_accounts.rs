//! Social account endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::fingerprint::generate_fingerprint_profile;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSocialAccountRequest {
    pub platform_key: String,
    #[serde(default)]
    pub handle: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(request): Json<CreateSocialAccountRequest>,
) -> Response {
    if orb_protocol::adapter_for(&request.platform_key).is_none() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("unsupported platform: {}", request.platform_key),
        );
    }

    let fingerprint = generate_fingerprint_profile(&request.platform_key);
    match state
        .store
        .create_social_account(
            workspace_id,
            request.platform_key.trim(),
            request.handle.as_deref(),
            fingerprint,
        )
        .await
    {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(error) => db_error(error),
    }
}

pub async fn list(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
) -> Response {
    match state.store.list_social_accounts(workspace_id).await {
        Ok(accounts) => Json(accounts).into_response(),
        Err(error) => db_error(error),
    }
}
