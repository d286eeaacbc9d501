use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser cluster
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where browser work runs: an in-process worker or a remote browser node
/// reached over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserClusterConfig {
    /// Overridden by `BROWSER_CLUSTER_MODE`.
    #[serde(default)]
    pub mode: ClusterMode,
    /// Remote mode only. Overridden by `BROWSER_NODE_API_BASE_URL`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Environment variable holding the internal bearer token shared with
    /// the browser node (remote mode only).
    #[serde(default = "d_internal_token_env")]
    pub internal_token_env: String,
    /// Public noVNC URL handed back to users as `LoginSession.remote_url`.
    /// Overridden by `NOVNC_PUBLIC_URL`.
    #[serde(default)]
    pub novnc_public_url: Option<String>,
    /// Launch browsers headless. Interactive login wants a visible browser.
    #[serde(default)]
    pub headless: bool,
    /// Per-call HTTP timeout towards the browser node.
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BrowserClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::Local,
            api_base_url: None,
            internal_token_env: d_internal_token_env(),
            novnc_public_url: None,
            headless: false,
            request_timeout_secs: d_request_timeout_secs(),
        }
    }
}

fn d_internal_token_env() -> String {
    "BROWSER_NODE_INTERNAL_TOKEN".into()
}
fn d_request_timeout_secs() -> u64 {
    30
}
