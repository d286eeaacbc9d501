//! Login-session auto-capture.
//!
//! One detached loop per freshly started login session polls the worker
//! until the user finishes the interactive login, then seals the exported
//! storage state into the account credential. The loop owns itself: the
//! LoginSession row is the only cancellation signal, and terminal states
//! make it exit.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use orb_storage::models::{AccountStatus, LoginSessionRow, LoginSessionStatus};

use crate::cluster::ClusterError;
use crate::state::AppState;
use crate::vault;

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("login session not found")]
    SessionNotFound,

    #[error("worker login runtime is gone")]
    RuntimeMissing,

    #[error("account is not logged in yet")]
    NotLoggedIn,

    #[error("login session is already terminal or being captured")]
    AlreadyTerminal,

    #[error("credential vault unavailable")]
    VaultUnavailable,

    #[error("capture failed: {0}")]
    Capture(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Non-terminal states a capture may start from.
const CAPTURABLE: &[LoginSessionStatus] =
    &[LoginSessionStatus::Created, LoginSessionStatus::Active];

/// Spawn the background capture loop for a login session.
///
/// No-op when auto-capture is disabled or the encryption key is unset —
/// without a vault there is nothing safe to persist.
pub fn spawn(state: AppState, login_session_id: Uuid) {
    if !state.config.credentials.auto_capture {
        return;
    }
    if state.vault.is_none() {
        tracing::warn!(
            login_session_id = %login_session_id,
            "auto-capture skipped: credential encryption key unset"
        );
        return;
    }
    tokio::spawn(async move {
        run_loop(&state, login_session_id).await;
    });
}

async fn run_loop(state: &AppState, login_session_id: Uuid) {
    let poll = Duration::from_millis(state.config.scheduler.capture_poll_interval_ms);
    loop {
        let row = match state.store.get_login_session(login_session_id).await {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(
                    login_session_id = %login_session_id,
                    error = %error,
                    "auto-capture failed to load session, retrying"
                );
                tokio::time::sleep(poll).await;
                continue;
            }
        };
        if row.status.is_terminal() {
            return;
        }

        let now = Utc::now();
        if row.expires_at <= now {
            let _ = state
                .store
                .transition_login_session(
                    login_session_id,
                    LoginSessionStatus::Expired,
                    &[
                        LoginSessionStatus::Created,
                        LoginSessionStatus::Active,
                        LoginSessionStatus::Capturing,
                    ],
                )
                .await;
            let _ = state.cluster.stop_login_session(login_session_id).await;
            tracing::info!(login_session_id = %login_session_id, "login session expired");
            return;
        }

        match state.cluster.is_logged_in(login_session_id).await {
            // The worker no longer knows this session; nothing to watch.
            Err(ClusterError::SessionNotFound) => return,
            Err(error) => {
                tracing::debug!(
                    login_session_id = %login_session_id,
                    error = %error,
                    "login probe failed, will retry"
                );
                tokio::time::sleep(poll).await;
            }
            Ok(false) => {
                tokio::time::sleep(poll).await;
            }
            Ok(true) => {
                match finalize_capture(state, &row).await {
                    Ok(()) => {
                        tracing::info!(
                            login_session_id = %login_session_id,
                            social_account_id = %row.social_account_id,
                            "login captured"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            login_session_id = %login_session_id,
                            error = %error,
                            "login capture failed"
                        );
                        let _ = state
                            .store
                            .transition_login_session(
                                login_session_id,
                                LoginSessionStatus::Failed,
                                &[
                                    LoginSessionStatus::Created,
                                    LoginSessionStatus::Active,
                                    LoginSessionStatus::Capturing,
                                ],
                            )
                            .await;
                        let _ = state.cluster.stop_login_session(login_session_id).await;
                    }
                }
                return;
            }
        }
    }
}

/// Export, encrypt, and persist the storage state for a logged-in session;
/// flips the account healthy and the session `succeeded`, then stops the
/// worker runtime. Shared by the background loop and the interactive
/// finalize endpoint.
pub async fn finalize_capture(
    state: &AppState,
    session: &LoginSessionRow,
) -> Result<(), CaptureError> {
    let Some(vault_ref) = state.vault.as_ref() else {
        return Err(CaptureError::VaultUnavailable);
    };

    // `capturing` is transient: claim it so concurrent finalizers (the
    // loop plus the endpoint) cannot double-capture.
    let claimed = state
        .store
        .transition_login_session(session.id, LoginSessionStatus::Capturing, CAPTURABLE)
        .await?;
    if !claimed {
        return Err(CaptureError::AlreadyTerminal);
    }

    let storage_state = state
        .cluster
        .export_storage_state(session.id)
        .await
        .map_err(|error| match error {
            ClusterError::SessionNotFound => CaptureError::RuntimeMissing,
            other => CaptureError::Capture(other.to_string()),
        })?;
    let blob = vault_ref
        .encrypt_json(&storage_state)
        .map_err(|error| CaptureError::Capture(error.to_string()))?;

    state
        .store
        .upsert_storage_state_credential(
            session.workspace_id,
            session.social_account_id,
            &blob,
            vault::KEY_VERSION,
        )
        .await?;
    state
        .store
        .set_account_status(
            session.social_account_id,
            AccountStatus::Healthy,
            Some(Utc::now()),
        )
        .await?;
    state
        .store
        .transition_login_session(
            session.id,
            LoginSessionStatus::Succeeded,
            &[LoginSessionStatus::Capturing],
        )
        .await?;

    let _ = state.cluster.stop_login_session(session.id).await;
    Ok(())
}

/// User-triggered capture: requires the runtime to exist and report a
/// logged-in session right now.
pub async fn finalize_interactive(
    state: &AppState,
    session: &LoginSessionRow,
) -> Result<(), CaptureError> {
    if session.status.is_terminal() {
        return Err(CaptureError::AlreadyTerminal);
    }
    let logged_in = state
        .cluster
        .is_logged_in(session.id)
        .await
        .map_err(|error| match error {
            ClusterError::SessionNotFound => CaptureError::RuntimeMissing,
            other => CaptureError::Capture(other.to_string()),
        })?;
    if !logged_in {
        return Err(CaptureError::NotLoggedIn);
    }
    finalize_capture(state, session).await
}
