//! Internal HTTP API.
//!
//! Every route requires the shared `x-internal-token` header, compared in
//! constant time against the digest computed at startup.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use orb_protocol::{
    ExecuteActionRequest, ExecuteBatchRequest, ExecuteBatchResponse, IsLoggedInResponse,
    StartLoginSessionRequest, StartLoginSessionResponse, StopSessionResponse,
    INTERNAL_TOKEN_HEADER,
};

use crate::automation;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct NodeState {
    pub sessions: Arc<SessionManager>,
    pub headless: bool,
    /// SHA-256 of the internal token, computed once at startup.
    pub token_hash: Arc<Vec<u8>>,
}

impl NodeState {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(
                config.novnc_public_url.clone(),
                config.headless,
            )),
            headless: config.headless,
            token_hash: Arc::new(Sha256::digest(config.internal_token.as_bytes()).to_vec()),
        }
    }
}

/// Extractor enforcing the internal token header.
pub struct InternalAuth;

#[async_trait]
impl FromRequestParts<NodeState> for InternalAuth {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &NodeState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let provided_hash = Sha256::digest(provided.as_bytes());
        if !bool::from(provided_hash.ct_eq(state.token_hash.as_slice())) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "unauthorized" })),
            ));
        }
        Ok(InternalAuth)
    }
}

pub fn router() -> Router<NodeState> {
    Router::new()
        .route("/health", get(health))
        .route("/login-sessions", post(start_login_session))
        .route("/login-sessions/:id/is-logged-in", get(is_logged_in))
        .route("/login-sessions/:id/storage-state", get(storage_state))
        .route("/login-sessions/:id/stop", post(stop_session))
        .route("/automation/actions/execute", post(execute_action))
        .route("/automation/actions/execute-batch", post(execute_batch))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn node_error_response(error: NodeError) -> Response {
    let status = match &error {
        NodeError::SessionNotFound => StatusCode::NOT_FOUND,
        NodeError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
        NodeError::Launch(_) | NodeError::Browser(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

async fn start_login_session(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Json(request): Json<StartLoginSessionRequest>,
) -> Response {
    match state
        .sessions
        .start_login(
            request.login_session_id,
            &request.platform_key,
            request.fingerprint_profile,
        )
        .await
    {
        Ok(remote_url) => Json(StartLoginSessionResponse { remote_url }).into_response(),
        Err(error) => node_error_response(error),
    }
}

async fn is_logged_in(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.is_logged_in(id).await {
        Ok(logged_in) => Json(IsLoggedInResponse { logged_in }).into_response(),
        Err(error) => node_error_response(error),
    }
}

async fn storage_state(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.export_storage_state(id).await {
        Ok(storage_state) => Json(storage_state).into_response(),
        Err(error) => node_error_response(error),
    }
}

async fn stop_session(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Path(id): Path<Uuid>,
) -> Response {
    state.sessions.stop(id).await;
    Json(StopSessionResponse { ok: true }).into_response()
}

async fn execute_action(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Json(request): Json<ExecuteActionRequest>,
) -> Response {
    let result = automation::execute_single(&request, state.headless).await;
    Json(result).into_response()
}

async fn execute_batch(
    State(state): State<NodeState>,
    _auth: InternalAuth,
    Json(request): Json<ExecuteBatchRequest>,
) -> Response {
    let results = automation::execute_batch(&request, state.headless).await;
    Json(ExecuteBatchResponse { results }).into_response()
}
