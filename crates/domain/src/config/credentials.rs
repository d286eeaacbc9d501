use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Environment variable holding the base64-encoded 32-byte AES-GCM key.
    /// If unset, the run executor and login auto-capture refuse to operate.
    #[serde(default = "d_encryption_key_env")]
    pub encryption_key_env: String,
    /// Enable the background login-session auto-capture loop.
    /// Overridden by `LOGIN_SESSION_AUTO_CAPTURE`.
    #[serde(default = "d_auto_capture")]
    pub auto_capture: bool,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            encryption_key_env: d_encryption_key_env(),
            auto_capture: d_auto_capture(),
        }
    }
}

fn d_encryption_key_env() -> String {
    "CREDENTIAL_ENCRYPTION_KEY".into()
}
fn d_auto_capture() -> bool {
    true
}
