//! Scripted page driver for automation tests.
//!
//! Visibility is token-based: a selector "matches" when any scripted token
//! is a substring of it, so tests script `data-testid='like'` instead of
//! reproducing full composed selectors. Clicks can add/remove tokens to
//! model UI state changes (like → unlike, dialog close).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::driver::{DriverError, DriverResult, PageDriver};

#[derive(Default)]
pub struct FakeDriver {
    pub url: Mutex<String>,
    /// Navigations redirect here when set (e.g. bounced to the login flow).
    pub redirect_to: Mutex<Option<String>>,
    pub goto_urls: Mutex<Vec<String>>,
    pub visible: Mutex<HashSet<String>>,
    pub add_on_click: Mutex<HashMap<String, Vec<String>>>,
    pub remove_on_click: Mutex<HashMap<String, Vec<String>>>,
    pub clicks: Mutex<Vec<String>>,
    /// Tokens whose clicks time out even though the element is visible.
    pub fail_clicks: Mutex<HashSet<String>>,
    pub typed: Mutex<String>,
    pub eval_results: Mutex<VecDeque<serde_json::Value>>,
    pub restriction_visible: AtomicBool,
    pub dismissed: AtomicBool,
    pub scrolls: Mutex<Vec<i64>>,
    pub goto_fails: Mutex<Option<DriverError>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logged-in page baseline: the nav-bar compose button is visible.
    pub fn logged_in() -> Self {
        let driver = Self::new();
        driver.show("SideNav_NewTweet_Button");
        driver
    }

    pub fn show(&self, token: &str) {
        self.visible.lock().insert(token.to_string());
    }

    pub fn hide(&self, token: &str) {
        self.visible.lock().remove(token);
    }

    pub fn on_click_show(&self, clicked: &str, appears: &str) {
        self.add_on_click
            .lock()
            .entry(clicked.to_string())
            .or_default()
            .push(appears.to_string());
    }

    pub fn on_click_hide(&self, clicked: &str, disappears: &str) {
        self.remove_on_click
            .lock()
            .entry(clicked.to_string())
            .or_default()
            .push(disappears.to_string());
    }

    pub fn script_eval(&self, value: serde_json::Value) {
        self.eval_results.lock().push_back(value);
    }

    pub fn fail_click(&self, token: &str) {
        self.fail_clicks.lock().insert(token.to_string());
    }

    /// Match tokens against each comma alternative's final compound
    /// segment, so a token like `'like'` targets
    /// `... button[data-testid='like']` without lighting up every
    /// descendant selector under the same article.
    fn target_segments(selector: &str) -> Vec<&str> {
        selector
            .split(',')
            .map(|alternative| {
                let alternative = alternative.trim();
                alternative.rsplit(' ').next().unwrap_or(alternative)
            })
            .collect()
    }

    fn matches(&self, selector: &str) -> bool {
        let segments = Self::target_segments(selector);
        self.visible
            .lock()
            .iter()
            .any(|token| segments.iter().any(|segment| segment.contains(token.as_str())))
    }

    fn matched_tokens(&self, selector: &str) -> Vec<String> {
        let segments = Self::target_segments(selector);
        self.visible
            .lock()
            .iter()
            .filter(|token| segments.iter().any(|segment| segment.contains(token.as_str())))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        if let Some(error) = self.goto_fails.lock().take() {
            return Err(error);
        }
        self.goto_urls.lock().push(url.to_string());
        let landed = self
            .redirect_to
            .lock()
            .clone()
            .unwrap_or_else(|| url.to_string());
        *self.url.lock() = landed;
        Ok(())
    }

    async fn current_url(&self) -> String {
        self.url.lock().clone()
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        Ok(usize::from(self.matches(selector)))
    }

    async fn wait_visible(&self, selector: &str, _timeout: std::time::Duration) -> DriverResult<()> {
        if self.matches(selector) {
            Ok(())
        } else {
            Err(DriverError::Timeout(format!("not visible: {selector}")))
        }
    }

    async fn wait_detached(&self, selector: &str, _timeout: std::time::Duration) -> DriverResult<()> {
        if self.matches(selector) {
            Err(DriverError::Timeout(format!("still attached: {selector}")))
        } else {
            Ok(())
        }
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        if !self.matches(selector) {
            return Err(DriverError::Timeout(format!("not clickable: {selector}")));
        }
        {
            let segments = Self::target_segments(selector);
            let failing = self.fail_clicks.lock();
            if failing
                .iter()
                .any(|token| segments.iter().any(|segment| segment.contains(token.as_str())))
            {
                return Err(DriverError::Timeout(format!("click blocked: {selector}")));
            }
        }
        self.clicks.lock().push(selector.to_string());
        for token in self.matched_tokens(selector) {
            if let Some(appearing) = self.add_on_click.lock().get(&token) {
                for item in appearing.clone() {
                    self.show(&item);
                }
            }
            if let Some(disappearing) = self.remove_on_click.lock().get(&token) {
                for item in disappearing.clone() {
                    self.hide(&item);
                }
            }
        }
        Ok(())
    }

    async fn wait_enabled(&self, _selector: &str, _timeout: std::time::Duration) {}

    async fn type_text(&self, text: &str) -> DriverResult<()> {
        self.typed.lock().push_str(text);
        Ok(())
    }

    async fn text_visible(&self, _needles: &[&str]) -> DriverResult<bool> {
        Ok(self.restriction_visible.load(Ordering::SeqCst))
    }

    async fn click_button_with_text(&self, _labels: &[&str]) -> DriverResult<bool> {
        self.dismissed.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn scroll_by(&self, delta_y: i64) -> DriverResult<()> {
        self.scrolls.lock().push(delta_y);
        Ok(())
    }

    async fn sleep_ms(&self, _ms: u64) {}

    async fn eval_json(&self, _script: &str) -> DriverResult<serde_json::Value> {
        Ok(self
            .eval_results
            .lock()
            .pop_front()
            .unwrap_or(serde_json::Value::Array(Vec::new())))
    }

    async fn screenshot_base64(&self) -> Option<String> {
        Some("c2NyZWVuc2hvdA==".to_string())
    }
}
