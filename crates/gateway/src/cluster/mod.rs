//! Browser cluster seam.
//!
//! The control plane talks to browser capacity through one trait with two
//! implementations: an in-process worker (local mode) and a remote browser
//! node over HTTP (remote mode). Callers distinguish "the worker no longer
//! knows this session" from transport trouble, because auto-capture stops
//! on the former and retries on the latter.

mod local;
mod remote;

pub use local::LocalBrowserCluster;
pub use remote::RemoteBrowserCluster;

use async_trait::async_trait;
use uuid::Uuid;

use orb_protocol::{ExecuteBatchRequest, ExecuteActionResult};

#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("login session runtime not found")]
    SessionNotFound,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("browser node transport: {0}")]
    Transport(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[async_trait]
pub trait BrowserCluster: Send + Sync {
    /// Start (or re-attach to) an interactive login session. Returns the
    /// public remote-view URL when one is configured.
    async fn start_login_session(
        &self,
        login_session_id: Uuid,
        platform_key: &str,
        fingerprint_profile: Option<serde_json::Value>,
    ) -> ClusterResult<Option<String>>;

    async fn is_logged_in(&self, login_session_id: Uuid) -> ClusterResult<bool>;

    async fn export_storage_state(
        &self,
        login_session_id: Uuid,
    ) -> ClusterResult<serde_json::Value>;

    /// Tear a login session down. Never fails on an unknown id.
    async fn stop_login_session(&self, login_session_id: Uuid) -> ClusterResult<()>;

    /// Execute an ordered action batch. The worker guarantees strict
    /// sequential execution and abort-on-first-failure; the result vector
    /// is positionally aligned with the request.
    async fn execute_batch(
        &self,
        request: ExecuteBatchRequest,
    ) -> ClusterResult<Vec<ExecuteActionResult>>;
}
