use std::sync::Arc;

use orb_domain::config::Config;
use orb_storage::Store;

use crate::cluster::BrowserCluster;
use crate::runtime::queue::RunQueue;
use crate::vault::CredentialVault;

/// Shared application state passed to all API handlers and background
/// loops.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    /// Browser capacity (in-process worker or remote node).
    pub cluster: Arc<dyn BrowserCluster>,
    /// `None` when `CREDENTIAL_ENCRYPTION_KEY` is unset; the executor and
    /// auto-capture refuse to operate without it.
    pub vault: Option<Arc<CredentialVault>>,
    /// Account-run work queue (best-effort; rows are the source of truth).
    pub queue: RunQueue,
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
