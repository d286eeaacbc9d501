//! Per-action request/result shapes shared by both sides of the boundary.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of one executed action. `Skipped` is a policy outcome
/// (already liked, reply restricted), not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl<'de> Deserialize<'de> for ActionStatus {
    // A status this side doesn't recognize (version skew) reads as a
    // failure rather than poisoning the whole batch response.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "succeeded" => Self::Succeeded,
            "skipped" => Self::Skipped,
            _ => Self::Failed,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bandwidth mode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request filtering bucket applied to browser traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthMode {
    /// Abort `image` and `media` requests.
    Eco,
    /// Abort `media` requests.
    Balanced,
    /// No filtering.
    #[default]
    Full,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action request / result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One action slot inside a batch. `action_type` stays a free string on the
/// wire; the worker normalizes aliases (`like` → `x_like`) at dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_external_id: Option<String>,
    #[serde(default)]
    pub action_params: serde_json::Map<String, serde_json::Value>,
}

impl ActionRequest {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target_url: None,
            target_external_id: None,
            action_params: serde_json::Map::new(),
        }
    }
}

/// Result of one action, positionally aligned with the submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteActionResult {
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    /// Base64 PNG captured on failure paths; stripped before the control
    /// plane persists result metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExecuteActionResult {
    pub fn succeeded() -> Self {
        Self {
            status: ActionStatus::Succeeded,
            error_code: None,
            message: None,
            current_url: None,
            screenshot_base64: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn failed(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            error_code: Some(error_code.to_string()),
            message: Some(message.into()),
            current_url: None,
            screenshot_base64: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Skipped,
            error_code: None,
            message: Some(message.into()),
            current_url: None,
            screenshot_base64: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a code to a non-failure outcome (e.g. `REPLY_RESTRICTED`
    /// rides on a `skipped` result).
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }

    pub fn with_screenshot(mut self, screenshot_base64: Option<String>) -> Self {
        self.screenshot_base64 = screenshot_base64;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search candidates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One post discovered by `x_search_collect`, carried in the result's
/// `metadata.candidates` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub tweet_id: String,
    pub url: String,
    pub is_verified: bool,
}
