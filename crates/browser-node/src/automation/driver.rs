//! The page-driver seam.
//!
//! All per-action UI logic is written against this narrow trait; the CDP
//! implementation lives in one module and a scripted fake stands in for
//! tests. Timeouts surface as `DriverError::Timeout` so each action stage
//! can map them to its own error code.

use std::time::Duration;

use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("browser: {0}")]
    Browser(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the document to load.
    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> String;

    /// Number of elements currently matching the CSS selector.
    async fn count(&self, selector: &str) -> DriverResult<usize>;

    /// Wait until the selector has a visible match.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Wait until the selector has no match.
    async fn wait_detached(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Click the first match (native input event).
    async fn click(&self, selector: &str) -> DriverResult<()>;

    /// Best-effort wait for the first match to report enabled
    /// (`aria-disabled` and the native `disabled` flag both clear).
    async fn wait_enabled(&self, selector: &str, timeout: Duration);

    /// Type into the focused element with human-like per-character delays.
    async fn type_text(&self, text: &str) -> DriverResult<()>;

    /// Whether any of the needles appears in the page's visible text.
    async fn text_visible(&self, needles: &[&str]) -> DriverResult<bool>;

    /// Best-effort click of a button whose label matches one of `labels`.
    /// Returns `true` if something was clicked.
    async fn click_button_with_text(&self, labels: &[&str]) -> DriverResult<bool>;

    async fn scroll_by(&self, delta_y: i64) -> DriverResult<()>;

    async fn sleep_ms(&self, ms: u64);

    /// Evaluate a script and return its JSON value.
    async fn eval_json(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Non-fullpage PNG, base64-encoded. Best-effort, never raises.
    async fn screenshot_base64(&self) -> Option<String>;
}
