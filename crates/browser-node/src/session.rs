//! Login-session runtime registry.
//!
//! One live browser per interactive login, keyed by the login-session
//! UUID. The registry mutex is never held across page operations: every
//! teardown pops the runtime first, then closes it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use parking_lot::Mutex;
use uuid::Uuid;

use orb_protocol::{adapter_for, sanitize_fingerprint, StorageCookie, StorageState};

use crate::automation::cdp;
use crate::error::NodeError;

struct LoginRuntime {
    platform_key: String,
    created_at: DateTime<Utc>,
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, LoginRuntime>>,
    novnc_public_url: Option<String>,
    headless: bool,
}

impl SessionManager {
    pub fn new(novnc_public_url: Option<String>, headless: bool) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            novnc_public_url,
            headless,
        }
    }

    /// Launch a browser at the platform's login page and register it.
    /// A session that already exists is not re-initialized; the caller
    /// just gets the public URL again.
    pub async fn start_login(
        &self,
        login_session_id: Uuid,
        platform_key: &str,
        fingerprint_profile: Option<serde_json::Value>,
    ) -> Result<Option<String>, NodeError> {
        let adapter = adapter_for(platform_key)
            .ok_or_else(|| NodeError::UnsupportedPlatform(platform_key.to_string()))?;

        if self.sessions.lock().contains_key(&login_session_id) {
            return Ok(self.novnc_public_url.clone());
        }

        let (browser, handler_task) = cdp::launch_browser(self.headless).await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| NodeError::Launch(e.to_string()))?;

        if let Some(raw) = &fingerprint_profile {
            let profile = sanitize_fingerprint(raw);
            cdp::apply_fingerprint(&page, &profile).await;
        }

        page.goto(adapter.login_url())
            .await
            .map_err(|e| NodeError::Browser(e.to_string()))?;

        let runtime = LoginRuntime {
            platform_key: adapter.platform_key().to_string(),
            created_at: Utc::now(),
            browser,
            page,
            handler_task,
        };

        // A racing start for the same id keeps the first runtime.
        let superseded = {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(&login_session_id) {
                Some(runtime)
            } else {
                sessions.insert(login_session_id, runtime);
                None
            }
        };
        if let Some(runtime) = superseded {
            close_runtime(runtime).await;
        }

        tracing::info!(
            login_session_id = %login_session_id,
            platform_key,
            "login session started"
        );
        Ok(self.novnc_public_url.clone())
    }

    /// Platform cookie predicate against the live context: fetch the
    /// cookies that apply to the platform's cookie origin, then delegate.
    pub async fn is_logged_in(&self, login_session_id: Uuid) -> Result<bool, NodeError> {
        let (page, platform_key) = self.page_for(login_session_id)?;
        let adapter = adapter_for(&platform_key)
            .ok_or_else(|| NodeError::UnsupportedPlatform(platform_key.clone()))?;
        let state = cdp::export_storage_state(&page)
            .await
            .map_err(|e| NodeError::Browser(e.to_string()))?;
        let origin_cookies: Vec<StorageCookie> = state
            .cookies
            .into_iter()
            .filter(|cookie| cookie_sent_to_origin(&cookie.domain, adapter.cookie_origin()))
            .collect();
        Ok(adapter.is_logged_in(&origin_cookies))
    }

    /// Full storage-state export (cookies; origins carried opaquely).
    pub async fn export_storage_state(
        &self,
        login_session_id: Uuid,
    ) -> Result<serde_json::Value, NodeError> {
        let (page, _) = self.page_for(login_session_id)?;
        let state: StorageState = cdp::export_storage_state(&page)
            .await
            .map_err(|e| NodeError::Browser(e.to_string()))?;
        Ok(state.to_value())
    }

    /// Pop and tear down. Never raises; an unknown id is a no-op.
    pub async fn stop(&self, login_session_id: Uuid) {
        let runtime = self.sessions.lock().remove(&login_session_id);
        if let Some(runtime) = runtime {
            let age_secs = (Utc::now() - runtime.created_at).num_seconds();
            close_runtime(runtime).await;
            tracing::info!(
                login_session_id = %login_session_id,
                age_secs,
                "login session stopped"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn page_for(&self, login_session_id: Uuid) -> Result<(Page, String), NodeError> {
        let sessions = self.sessions.lock();
        let runtime = sessions
            .get(&login_session_id)
            .ok_or(NodeError::SessionNotFound)?;
        Ok((runtime.page.clone(), runtime.platform_key.clone()))
    }
}

/// Whether a cookie with `domain` would be sent to `origin`
/// (`scheme://host`). A leading dot marks a domain cookie, valid for the
/// host and its subdomains; host-only cookies must match exactly.
fn cookie_sent_to_origin(domain: &str, origin: &str) -> bool {
    let host = origin
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);
    let domain = domain.trim_start_matches('.');
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

async fn close_runtime(mut runtime: LoginRuntime) {
    if let Err(error) = runtime.browser.close().await {
        tracing::debug!(error = %error, "login browser close failed");
    }
    let _ = runtime.browser.wait().await;
    runtime.handler_task.abort();
}
