//! Remote browser node reached over HTTP with the shared internal token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use orb_protocol::{
    ExecuteActionResult, ExecuteBatchRequest, ExecuteBatchResponse, IsLoggedInResponse,
    StartLoginSessionRequest, StartLoginSessionResponse, INTERNAL_TOKEN_HEADER,
};

use super::{BrowserCluster, ClusterError, ClusterResult};

pub struct RemoteBrowserCluster {
    http: reqwest::Client,
    base_url: String,
    internal_token: String,
}

impl RemoteBrowserCluster {
    pub fn new(
        base_url: &str,
        internal_token: String,
        request_timeout: Duration,
    ) -> ClusterResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            internal_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn check_status(status: StatusCode) -> ClusterResult<()> {
        if status == StatusCode::NOT_FOUND {
            return Err(ClusterError::SessionNotFound);
        }
        if !status.is_success() {
            return Err(ClusterError::Transport(format!(
                "browser node returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserCluster for RemoteBrowserCluster {
    async fn start_login_session(
        &self,
        login_session_id: Uuid,
        platform_key: &str,
        fingerprint_profile: Option<serde_json::Value>,
    ) -> ClusterResult<Option<String>> {
        let response = self
            .http
            .post(self.url("/login-sessions"))
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token)
            .json(&StartLoginSessionRequest {
                login_session_id,
                platform_key: platform_key.to_string(),
                fingerprint_profile,
            })
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Self::check_status(response.status())?;
        let body: StartLoginSessionResponse = response
            .json()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(body.remote_url)
    }

    async fn is_logged_in(&self, login_session_id: Uuid) -> ClusterResult<bool> {
        let response = self
            .http
            .get(self.url(&format!("/login-sessions/{login_session_id}/is-logged-in")))
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token)
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Self::check_status(response.status())?;
        let body: IsLoggedInResponse = response
            .json()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(body.logged_in)
    }

    async fn export_storage_state(
        &self,
        login_session_id: Uuid,
    ) -> ClusterResult<serde_json::Value> {
        let response = self
            .http
            .get(self.url(&format!("/login-sessions/{login_session_id}/storage-state")))
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token)
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Self::check_status(response.status())?;
        response
            .json()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))
    }

    async fn stop_login_session(&self, login_session_id: Uuid) -> ClusterResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/login-sessions/{login_session_id}/stop")))
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token)
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        // Stop is idempotent; an unknown id is success.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(response.status())
    }

    async fn execute_batch(
        &self,
        request: ExecuteBatchRequest,
    ) -> ClusterResult<Vec<ExecuteActionResult>> {
        let response = self
            .http
            .post(self.url("/automation/actions/execute-batch"))
            .header(INTERNAL_TOKEN_HEADER, &self.internal_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Self::check_status(response.status())?;
        let body: ExecuteBatchResponse = response
            .json()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(body.results)
    }
}
