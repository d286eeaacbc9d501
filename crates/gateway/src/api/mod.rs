pub mod artifacts;
pub mod guard;
pub mod login_sessions;
pub mod runs;
pub mod schedules;
pub mod social_accounts;
pub mod strategies;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the control-plane API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health probe (public, no auth)
        .route("/v1/health", get(health))
        // Social accounts
        .route("/v1/social-accounts", post(social_accounts::create))
        .route("/v1/social-accounts", get(social_accounts::list))
        // Strategies
        .route("/v1/strategies", post(strategies::create))
        .route("/v1/strategies", get(strategies::list))
        .route("/v1/strategies/:id", put(strategies::update_config))
        // Schedules
        .route("/v1/schedules", post(schedules::create))
        .route("/v1/schedules", get(schedules::list))
        .route("/v1/schedules/:id", put(schedules::update))
        // Login sessions
        .route("/v1/login-sessions", post(login_sessions::create))
        .route("/v1/login-sessions/:id", get(login_sessions::get_one))
        .route("/v1/login-sessions/:id/cancel", post(login_sessions::cancel))
        .route(
            "/v1/login-sessions/:id/finalize",
            post(login_sessions::finalize),
        )
        // Runs
        .route("/v1/runs", post(runs::run_now))
        .route("/v1/runs", get(runs::list))
        .route("/v1/runs/:id", get(runs::get_one))
        // Artifacts
        .route("/v1/artifacts/:id/download", get(artifacts::download))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a database error to a 500 without leaking internals.
pub(crate) fn db_error(error: sqlx::Error) -> Response {
    tracing::error!(error = %error, "database error in API handler");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "database error")
}
