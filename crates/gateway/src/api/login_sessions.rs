//! Login-session endpoints: create (spawns the auto-capture loop), read
//! and cancel (both apply TTL expiry first), and interactive finalize.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use orb_storage::models::{LoginSessionRow, LoginSessionStatus};

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::runtime::auto_capture::{self, CaptureError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateLoginSessionRequest {
    pub social_account_id: Uuid,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(request): Json<CreateLoginSessionRequest>,
) -> Response {
    let account = match state
        .store
        .get_social_account(workspace_id, request.social_account_id)
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "social account not found"),
        Err(error) => return db_error(error),
    };

    let expires_at = Utc::now() + Duration::minutes(state.config.scheduler.login_session_ttl_mins);
    let session = match state
        .store
        .create_login_session(
            workspace_id,
            account.id,
            &account.platform_key,
            expires_at,
            request.created_by,
        )
        .await
    {
        Ok(session) => session,
        Err(error) => return db_error(error),
    };

    let fingerprint = account
        .fingerprint_profile
        .0
        .as_object()
        .filter(|map| !map.is_empty())
        .map(|map| serde_json::Value::Object(map.clone()));
    let remote_url = match state
        .cluster
        .start_login_session(session.id, &account.platform_key, fingerprint)
        .await
    {
        Ok(remote_url) => remote_url,
        Err(error) => {
            tracing::error!(
                login_session_id = %session.id,
                error = %error,
                "failed to start login session on worker"
            );
            let _ = state
                .store
                .transition_login_session(
                    session.id,
                    LoginSessionStatus::Failed,
                    &[LoginSessionStatus::Created],
                )
                .await;
            return api_error(StatusCode::BAD_GATEWAY, "browser worker unavailable");
        }
    };

    if let Err(error) = state
        .store
        .set_login_session_remote_url(session.id, remote_url.as_deref())
        .await
    {
        return db_error(error);
    }
    if let Err(error) = state
        .store
        .transition_login_session(
            session.id,
            LoginSessionStatus::Active,
            &[LoginSessionStatus::Created],
        )
        .await
    {
        return db_error(error);
    }

    auto_capture::spawn(state.clone(), session.id);

    match state.store.get_login_session(session.id).await {
        Ok(Some(session)) => (StatusCode::CREATED, Json(session)).into_response(),
        Ok(None) => api_error(StatusCode::INTERNAL_SERVER_ERROR, "session vanished"),
        Err(error) => db_error(error),
    }
}

/// Load a workspace-scoped session with TTL expiry applied.
async fn load_fresh(
    state: &AppState,
    workspace_id: Uuid,
    id: Uuid,
) -> Result<Option<LoginSessionRow>, sqlx::Error> {
    if state.store.get_login_session_scoped(workspace_id, id).await?.is_none() {
        return Ok(None);
    }
    state.store.expire_login_session_if_due(id, Utc::now()).await?;
    state.store.get_login_session_scoped(workspace_id, id).await
}

pub async fn get_one(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
) -> Response {
    match load_fresh(&state, workspace_id, id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "login session not found"),
        Err(error) => db_error(error),
    }
}

pub async fn cancel(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match load_fresh(&state, workspace_id, id).await {
        Ok(Some(session)) => session,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "login session not found"),
        Err(error) => return db_error(error),
    };

    if session.status.is_terminal() {
        return Json(serde_json::json!({ "ok": true, "status": session.status }))
            .into_response();
    }

    if let Err(error) = state
        .store
        .transition_login_session(
            id,
            LoginSessionStatus::Canceled,
            &[
                LoginSessionStatus::Created,
                LoginSessionStatus::Active,
                LoginSessionStatus::Capturing,
            ],
        )
        .await
    {
        return db_error(error);
    }
    let _ = state.cluster.stop_login_session(id).await;

    Json(serde_json::json!({ "ok": true, "status": LoginSessionStatus::Canceled }))
        .into_response()
}

pub async fn finalize(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match load_fresh(&state, workspace_id, id).await {
        Ok(Some(session)) => session,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "login session not found"),
        Err(error) => return db_error(error),
    };

    match auto_capture::finalize_interactive(&state, &session).await {
        Ok(()) => match state.store.get_login_session_scoped(workspace_id, id).await {
            Ok(Some(session)) => Json(session).into_response(),
            Ok(None) => api_error(StatusCode::NOT_FOUND, "login session not found"),
            Err(error) => db_error(error),
        },
        Err(CaptureError::NotLoggedIn) => {
            api_error(StatusCode::CONFLICT, "account is not logged in yet")
        }
        Err(CaptureError::RuntimeMissing) => {
            api_error(StatusCode::CONFLICT, "worker login runtime is gone")
        }
        Err(CaptureError::AlreadyTerminal) => {
            api_error(StatusCode::CONFLICT, "login session is already finished")
        }
        Err(CaptureError::VaultUnavailable) => api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "credential encryption key is not configured",
        ),
        Err(CaptureError::SessionNotFound) => {
            api_error(StatusCode::NOT_FOUND, "login session not found")
        }
        Err(CaptureError::Capture(message)) => api_error(StatusCode::BAD_GATEWAY, message),
        Err(CaptureError::Db(error)) => db_error(error),
    }
}
