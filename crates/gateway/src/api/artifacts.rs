//! Artifact download with the storage-key traversal guard.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use orb_storage::models::ARTIFACT_TYPE_SCREENSHOT;

use crate::api::{api_error, db_error};
use crate::api::guard::{ApiGuard, WorkspaceId};
use crate::state::AppState;

pub async fn download(
    State(state): State<AppState>,
    _guard: ApiGuard,
    WorkspaceId(workspace_id): WorkspaceId,
    Path(id): Path<Uuid>,
) -> Response {
    let artifact = match state.store.get_artifact(workspace_id, id).await {
        Ok(Some(artifact)) => artifact,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "artifact not found"),
        Err(error) => return db_error(error),
    };

    // Resolve against the artifacts root and refuse anything that escapes
    // it — storage keys are server-generated, but a corrupted row must not
    // become a file-read primitive.
    let base = match tokio::fs::canonicalize(&state.config.artifacts.dir).await {
        Ok(base) => base,
        Err(_) => return api_error(StatusCode::NOT_FOUND, "artifact file missing"),
    };
    let path = match tokio::fs::canonicalize(base.join(&artifact.storage_key)).await {
        Ok(path) => path,
        Err(_) => return api_error(StatusCode::NOT_FOUND, "artifact file missing"),
    };
    if !path.starts_with(&base) {
        return api_error(StatusCode::BAD_REQUEST, "invalid artifact storage key");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return api_error(StatusCode::NOT_FOUND, "artifact file missing"),
    };

    let media_type = if artifact.artifact_type == ARTIFACT_TYPE_SCREENSHOT
        && path.extension().and_then(|e| e.to_str()) == Some("png")
    {
        "image/png"
    } else {
        "application/octet-stream"
    };

    ([(header::CONTENT_TYPE, media_type)], bytes).into_response()
}
