use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Artifacts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Screenshot artifact storage. The directory is workspace-sharded:
/// `{dir}/{workspace_id}/{action_id}-screenshot.png`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root directory. Overridden by `ARTIFACTS_DIR`.
    #[serde(default = "d_dir")]
    pub dir: PathBuf,
    /// How often the retention sweeper runs.
    #[serde(default = "d_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: d_dir(),
            cleanup_interval_secs: d_cleanup_interval_secs(),
        }
    }
}

fn d_dir() -> PathBuf {
    "data/artifacts".into()
}
fn d_cleanup_interval_secs() -> u64 {
    6 * 3600
}
