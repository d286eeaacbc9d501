//! Request guards: API bearer token and tenant scoping.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::state::AppState;

/// Enforces the API bearer token.
///
/// Uses SHA-256 + constant-time comparison so neither token content nor
/// length leaks through timing. If no token is configured (dev mode), all
/// requests pass.
pub struct ApiGuard;

#[async_trait]
impl FromRequestParts<AppState> for ApiGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected_hash) = &state.api_token_hash else {
            return Ok(ApiGuard);
        };

        let provided = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        let provided_hash = Sha256::digest(provided.as_bytes());

        if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid API token" })),
            ));
        }
        Ok(ApiGuard)
    }
}

/// Tenant scope taken from the `x-workspace-id` header.
///
/// User authentication is an external collaborator; by the time requests
/// reach this service something upstream has established which workspace
/// they act for.
pub struct WorkspaceId(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for WorkspaceId {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-workspace-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        match Uuid::parse_str(raw) {
            Ok(id) => Ok(WorkspaceId(id)),
            Err(_) => Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "missing or invalid x-workspace-id header" })),
            )),
        }
    }
}
