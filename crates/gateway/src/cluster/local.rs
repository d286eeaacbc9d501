//! In-process worker: the browser node's session manager and action
//! executor linked straight into the gateway (single-box deployments).

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use orb_browser_node::automation;
use orb_browser_node::error::NodeError;
use orb_browser_node::session::SessionManager;
use orb_protocol::{ExecuteActionResult, ExecuteBatchRequest};

use super::{BrowserCluster, ClusterError, ClusterResult};

pub struct LocalBrowserCluster {
    sessions: Arc<SessionManager>,
    headless: bool,
}

impl LocalBrowserCluster {
    pub fn new(novnc_public_url: Option<String>, headless: bool) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(novnc_public_url, headless)),
            headless,
        }
    }
}

fn map_err(err: NodeError) -> ClusterError {
    match err {
        NodeError::SessionNotFound => ClusterError::SessionNotFound,
        NodeError::UnsupportedPlatform(key) => ClusterError::UnsupportedPlatform(key),
        NodeError::Browser(message) | NodeError::Launch(message) => {
            ClusterError::Transport(message)
        }
    }
}

#[async_trait]
impl BrowserCluster for LocalBrowserCluster {
    async fn start_login_session(
        &self,
        login_session_id: Uuid,
        platform_key: &str,
        fingerprint_profile: Option<serde_json::Value>,
    ) -> ClusterResult<Option<String>> {
        self.sessions
            .start_login(login_session_id, platform_key, fingerprint_profile)
            .await
            .map_err(map_err)
    }

    async fn is_logged_in(&self, login_session_id: Uuid) -> ClusterResult<bool> {
        self.sessions
            .is_logged_in(login_session_id)
            .await
            .map_err(map_err)
    }

    async fn export_storage_state(
        &self,
        login_session_id: Uuid,
    ) -> ClusterResult<serde_json::Value> {
        self.sessions
            .export_storage_state(login_session_id)
            .await
            .map_err(map_err)
    }

    async fn stop_login_session(&self, login_session_id: Uuid) -> ClusterResult<()> {
        self.sessions.stop(login_session_id).await;
        Ok(())
    }

    async fn execute_batch(
        &self,
        request: ExecuteBatchRequest,
    ) -> ClusterResult<Vec<ExecuteActionResult>> {
        Ok(automation::execute_batch(&request, self.headless).await)
    }
}
