//! Shared fakes for runtime tests: scripted browser clusters and a
//! ready-made `AppState` over an in-memory store.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use orb_domain::config::Config;
use orb_protocol::{ExecuteActionResult, ExecuteBatchRequest};
use orb_storage::Store;

use crate::cluster::{BrowserCluster, ClusterError, ClusterResult};
use crate::runtime::queue::RunQueue;
use crate::state::AppState;
use crate::vault::CredentialVault;

/// Cluster that panics if any browser work is attempted. For tests that
/// exercise pure control-plane paths.
pub struct NoopCluster;

#[async_trait]
impl BrowserCluster for NoopCluster {
    async fn start_login_session(
        &self,
        _id: Uuid,
        _platform_key: &str,
        _fingerprint_profile: Option<serde_json::Value>,
    ) -> ClusterResult<Option<String>> {
        panic!("unexpected start_login_session");
    }

    async fn is_logged_in(&self, _id: Uuid) -> ClusterResult<bool> {
        panic!("unexpected is_logged_in");
    }

    async fn export_storage_state(&self, _id: Uuid) -> ClusterResult<serde_json::Value> {
        panic!("unexpected export_storage_state");
    }

    async fn stop_login_session(&self, _id: Uuid) -> ClusterResult<()> {
        Ok(())
    }

    async fn execute_batch(
        &self,
        _request: ExecuteBatchRequest,
    ) -> ClusterResult<Vec<ExecuteActionResult>> {
        panic!("unexpected execute_batch");
    }
}

/// One scripted reply for a batch call.
pub enum ScriptedBatch {
    Results(Vec<ExecuteActionResult>),
    TransportError,
}

/// One scripted reply for a login probe.
pub enum ScriptedProbe {
    LoggedIn(bool),
    RuntimeMissing,
    TransportError,
}

/// Scripted cluster: answers batch calls and login probes from queues and
/// records everything it was asked to do.
#[derive(Default)]
pub struct FakeCluster {
    pub batches: Mutex<VecDeque<ScriptedBatch>>,
    pub probes: Mutex<VecDeque<ScriptedProbe>>,
    pub storage_state: Mutex<serde_json::Value>,
    pub requests: Mutex<Vec<ExecuteBatchRequest>>,
    pub started: Mutex<Vec<(Uuid, String)>>,
    pub stopped: Mutex<Vec<Uuid>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            storage_state: Mutex::new(serde_json::json!({"cookies": [], "origins": []})),
            ..Default::default()
        }
    }

    pub fn script_batch(&self, batch: ScriptedBatch) {
        self.batches.lock().push_back(batch);
    }

    pub fn script_probe(&self, probe: ScriptedProbe) {
        self.probes.lock().push_back(probe);
    }

    pub fn batch_requests(&self) -> Vec<ExecuteBatchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl BrowserCluster for FakeCluster {
    async fn start_login_session(
        &self,
        id: Uuid,
        platform_key: &str,
        _fingerprint_profile: Option<serde_json::Value>,
    ) -> ClusterResult<Option<String>> {
        self.started.lock().push((id, platform_key.to_string()));
        Ok(Some("http://vnc.example/session".into()))
    }

    async fn is_logged_in(&self, _id: Uuid) -> ClusterResult<bool> {
        match self.probes.lock().pop_front() {
            Some(ScriptedProbe::LoggedIn(flag)) => Ok(flag),
            Some(ScriptedProbe::RuntimeMissing) => Err(ClusterError::SessionNotFound),
            Some(ScriptedProbe::TransportError) => {
                Err(ClusterError::Transport("scripted transport error".into()))
            }
            None => Ok(false),
        }
    }

    async fn export_storage_state(&self, _id: Uuid) -> ClusterResult<serde_json::Value> {
        Ok(self.storage_state.lock().clone())
    }

    async fn stop_login_session(&self, id: Uuid) -> ClusterResult<()> {
        self.stopped.lock().push(id);
        Ok(())
    }

    async fn execute_batch(
        &self,
        request: ExecuteBatchRequest,
    ) -> ClusterResult<Vec<ExecuteActionResult>> {
        self.requests.lock().push(request);
        match self.batches.lock().pop_front() {
            Some(ScriptedBatch::Results(results)) => Ok(results),
            Some(ScriptedBatch::TransportError) => {
                Err(ClusterError::Transport("scripted transport error".into()))
            }
            None => Err(ClusterError::Transport("no scripted batch left".into())),
        }
    }
}

/// Fixed test key so credentials sealed in one helper can be opened in
/// another.
pub fn test_vault() -> CredentialVault {
    CredentialVault::new(&[42u8; 32]).expect("static test key")
}

/// In-memory `AppState` wired to the given cluster. Returns the queue
/// receiver (tests drain it directly) and the artifacts tempdir guard.
pub async fn test_state(
    cluster: Arc<dyn BrowserCluster>,
) -> (AppState, mpsc::UnboundedReceiver<Uuid>, tempfile::TempDir) {
    let store = Store::connect_in_memory().await.expect("in-memory store");
    let dir = tempfile::tempdir().expect("artifacts tempdir");

    let mut config = Config::default();
    config.artifacts.dir = dir.path().to_path_buf();
    config.scheduler.capture_poll_interval_ms = 5;

    let (queue, rx) = RunQueue::new();
    let state = AppState {
        config: Arc::new(config),
        store,
        cluster,
        vault: Some(Arc::new(test_vault())),
        queue,
        api_token_hash: None,
    };
    (state, rx, dir)
}
