//! Request/response bodies of the browser-node internal HTTP API.
//!
//! Every endpoint requires the `x-internal-token` header, compared in
//! constant time on the node side.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{ActionRequest, BandwidthMode, ExecuteActionResult};

/// Header carrying the shared internal bearer token.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

// ── POST /login-sessions ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartLoginSessionRequest {
    pub login_session_id: Uuid,
    pub platform_key: String,
    /// Raw profile map; the node sanitizes it against the whitelist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_profile: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartLoginSessionResponse {
    pub remote_url: Option<String>,
}

// ── GET /login-sessions/{id}/is-logged-in ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsLoggedInResponse {
    pub logged_in: bool,
}

// ── POST /login-sessions/{id}/stop ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSessionResponse {
    pub ok: bool,
}

// ── POST /automation/actions/execute ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteActionRequest {
    pub platform_key: String,
    pub action_type: String,
    /// Opaque storage-state map decrypted from the account credential.
    pub storage_state: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_mode: Option<BandwidthMode>,
    #[serde(default)]
    pub action_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_profile: Option<serde_json::Value>,
}

// ── POST /automation/actions/execute-batch ──────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteBatchRequest {
    pub platform_key: String,
    pub storage_state: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_mode: Option<BandwidthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_profile: Option<serde_json::Value>,
    pub actions: Vec<ActionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteBatchResponse {
    pub results: Vec<ExecuteActionResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_request_roundtrip() {
        let request = ExecuteBatchRequest {
            platform_key: "x".into(),
            storage_state: serde_json::json!({"cookies": []}),
            bandwidth_mode: Some(BandwidthMode::Eco),
            fingerprint_profile: None,
            actions: vec![
                ActionRequest::new("health_check"),
                ActionRequest {
                    action_type: "x_like".into(),
                    target_url: Some("https://x.com/u/status/1".into()),
                    target_external_id: Some("1".into()),
                    action_params: serde_json::Map::new(),
                },
            ],
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: ExecuteBatchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.actions.len(), 2);
        assert_eq!(back.actions[1].target_external_id.as_deref(), Some("1"));
        assert_eq!(back.bandwidth_mode, Some(BandwidthMode::Eco));
    }

    #[test]
    fn start_login_request_defaults_profile() {
        let raw = format!(
            r#"{{"login_session_id":"{}","platform_key":"x"}}"#,
            Uuid::new_v4()
        );
        let request: StartLoginSessionRequest = serde_json::from_str(&raw).unwrap();
        assert!(request.fingerprint_profile.is_none());
    }
}
