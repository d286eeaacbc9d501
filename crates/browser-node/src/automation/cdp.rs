//! CDP-backed page driver (chromiumoxide).
//!
//! One `BrowserSession` per action batch: fresh browser, one page, cookies
//! seeded from the storage state, fingerprint overrides applied, and the
//! bandwidth filter installed as a fetch-interception loop.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    MediaFeature, SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
    SetLocaleOverrideParams, SetTimezoneOverrideParams, SetTouchEmulationEnabledParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use rand::Rng;

use orb_protocol::{BandwidthMode, FingerprintProfile, StorageCookie, StorageState};

use crate::error::NodeError;

use super::driver::{DriverError, DriverResult, PageDriver};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bandwidth filter decision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Image,
    Media,
    Other,
}

pub fn resource_class(resource_type: &ResourceType) -> ResourceClass {
    match resource_type {
        ResourceType::Image => ResourceClass::Image,
        ResourceType::Media => ResourceClass::Media,
        _ => ResourceClass::Other,
    }
}

const BLOCKED_HOSTS: &[&str] = &["doubleclick.net", "google-analytics.com"];

/// Whether a request should be aborted under the given bandwidth mode.
/// `full` installs no filter at all; this is only consulted for eco and
/// balanced.
pub fn should_abort(mode: BandwidthMode, resource: ResourceClass, url: &str) -> bool {
    let by_type = match mode {
        BandwidthMode::Eco => matches!(resource, ResourceClass::Image | ResourceClass::Media),
        BandwidthMode::Balanced => resource == ResourceClass::Media,
        BandwidthMode::Full => false,
    };
    if by_type {
        return true;
    }
    match mode {
        BandwidthMode::Eco | BandwidthMode::Balanced => {
            BLOCKED_HOSTS.iter().any(|host| url.contains(host))
        }
        BandwidthMode::Full => false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    intercept_task: Option<tokio::task::JoinHandle<()>>,
    driver: CdpDriver,
}

impl BrowserSession {
    pub async fn launch(
        storage_state: &serde_json::Value,
        bandwidth_mode: Option<BandwidthMode>,
        fingerprint_profile: Option<&serde_json::Value>,
        headless: bool,
    ) -> Result<Self, NodeError> {
        let (browser, handler_task) = launch_browser(headless).await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| NodeError::Launch(e.to_string()))?;

        if let Some(raw) = fingerprint_profile {
            let profile = orb_protocol::sanitize_fingerprint(raw);
            apply_fingerprint(&page, &profile).await;
        }

        let state = StorageState::from_value(storage_state);
        apply_cookies(&page, &state.cookies)
            .await
            .map_err(|e| NodeError::Browser(e.to_string()))?;

        let intercept_task = match bandwidth_mode {
            Some(mode @ (BandwidthMode::Eco | BandwidthMode::Balanced)) => {
                Some(install_bandwidth_filter(&page, mode).await?)
            }
            _ => None,
        };

        Ok(Self {
            browser,
            handler_task,
            intercept_task,
            driver: CdpDriver { page },
        })
    }

    pub fn driver(&self) -> &CdpDriver {
        &self.driver
    }

    /// Teardown in order: interception, page (with the browser), driver
    /// loop. Never raises.
    pub async fn close(mut self) {
        if let Some(task) = self.intercept_task.take() {
            task.abort();
        }
        if let Err(error) = self.browser.close().await {
            tracing::debug!(error = %error, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

pub(crate) async fn launch_browser(
    headless: bool,
) -> Result<(Browser, tokio::task::JoinHandle<()>), NodeError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .request_timeout(NAVIGATION_TIMEOUT);
    if !headless {
        builder = builder.with_head();
    }
    let config = builder.build().map_err(NodeError::Launch)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| NodeError::Launch(e.to_string()))?;
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
    Ok((browser, handler_task))
}

/// Apply the whitelisted fingerprint fields. Each override is independent
/// and best-effort; a rejected override must not abort the launch.
pub(crate) async fn apply_fingerprint(page: &Page, profile: &FingerprintProfile) {
    if let Some(user_agent) = &profile.user_agent {
        let params = SetUserAgentOverrideParams::new(user_agent.clone());
        if let Err(error) = page.execute(params).await {
            tracing::debug!(error = %error, "user-agent override failed");
        }
    }
    if let Some(viewport) = &profile.viewport {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(profile.device_scale_factor.unwrap_or(1.0))
            .mobile(profile.is_mobile.unwrap_or(false))
            .build();
        match params {
            Ok(params) => {
                if let Err(error) = page.execute(params).await {
                    tracing::debug!(error = %error, "viewport override failed");
                }
            }
            Err(error) => tracing::debug!(error = %error, "viewport params invalid"),
        }
    }
    if let Some(timezone_id) = &profile.timezone_id {
        let params = SetTimezoneOverrideParams::new(timezone_id.clone());
        if let Err(error) = page.execute(params).await {
            tracing::debug!(error = %error, "timezone override failed");
        }
    }
    if let Some(locale) = &profile.locale {
        let params = SetLocaleOverrideParams::builder().locale(locale.clone()).build();
        if let Err(error) = page.execute(params).await {
            tracing::debug!(error = %error, "locale override failed");
        }
    }
    if let Some(color_scheme) = &profile.color_scheme {
        let params = SetEmulatedMediaParams::builder()
            .feature(MediaFeature {
                name: "prefers-color-scheme".into(),
                value: color_scheme.clone(),
            })
            .build();
        if let Err(error) = page.execute(params).await {
            tracing::debug!(error = %error, "color-scheme override failed");
        }
    }
    if let Some(has_touch) = profile.has_touch {
        let params = SetTouchEmulationEnabledParams::new(has_touch);
        if let Err(error) = page.execute(params).await {
            tracing::debug!(error = %error, "touch override failed");
        }
    }
}

pub(crate) async fn apply_cookies(
    page: &Page,
    cookies: &[StorageCookie],
) -> Result<(), CdpError> {
    if cookies.is_empty() {
        return Ok(());
    }
    let params: Vec<CookieParam> = cookies
        .iter()
        .filter_map(|cookie| {
            CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(if cookie.path.is_empty() {
                    "/".to_string()
                } else {
                    cookie.path.clone()
                })
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
                .ok()
        })
        .collect();
    page.set_cookies(params).await?;
    Ok(())
}

/// Export the page's cookie jar back into the storage-state shape.
pub(crate) async fn export_storage_state(page: &Page) -> Result<StorageState, CdpError> {
    let cookies = page.get_cookies().await?;
    Ok(StorageState {
        cookies: cookies
            .into_iter()
            .map(|cookie| StorageCookie {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
                path: cookie.path,
                expires: cookie.expires,
                http_only: cookie.http_only,
                secure: cookie.secure,
                same_site: cookie.same_site.map(|s| format!("{s:?}")),
            })
            .collect(),
        origins: Vec::new(),
    })
}

async fn install_bandwidth_filter(
    page: &Page,
    mode: BandwidthMode,
) -> Result<tokio::task::JoinHandle<()>, NodeError> {
    page.execute(
        EnableParams::builder()
            .patterns(vec![RequestPattern::builder().url_pattern("*").build()])
            .build(),
    )
    .await
    .map_err(|e| NodeError::Browser(e.to_string()))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| NodeError::Browser(e.to_string()))?;
    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let abort = should_abort(
                mode,
                resource_class(&event.resource_type),
                &event.request.url,
            );
            let sent = if abort {
                page.execute(FailRequestParams::new(
                    event.request_id.clone(),
                    ErrorReason::Aborted,
                ))
                .await
                .map(|_| ())
            } else {
                page.execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ())
            };
            if sent.is_err() {
                break;
            }
        }
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CdpDriver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CdpDriver {
    page: Page,
}

impl CdpDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    fn map_err(error: CdpError) -> DriverError {
        match error {
            CdpError::Timeout => DriverError::Timeout("cdp command timed out".into()),
            other => DriverError::Browser(other.to_string()),
        }
    }

    /// JS expression checking the first match for layout-level visibility.
    fn visibility_script(selector: &str) -> String {
        let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".into());
        format!(
            "(() => {{ const el = document.querySelector({quoted}); \
             if (!el) return false; \
             const rect = el.getBoundingClientRect(); \
             return !!(rect.width || rect.height || el.getClientRects().length); }})()"
        )
    }

}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.page.goto(url).await.map(|_| ()).map_err(Self::map_err)
    }

    async fn current_url(&self) -> String {
        self.page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| DriverError::Browser(e.to_string()))?;
        let script = format!("document.querySelectorAll({quoted}).length");
        let value = self.eval_json(&script).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let script = Self::visibility_script(selector);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(value) = self.eval_json(&script).await {
                if value.as_bool() == Some(true) {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "selector not visible: {selector}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_detached(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count(selector).await.unwrap_or(0) == 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "selector still attached: {selector}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::Timeout(format!("element not found: {selector}")))?;
        if let Err(error) = element.scroll_into_view().await {
            tracing::debug!(error = %error, selector, "scroll_into_view failed");
        }
        element.click().await.map(|_| ()).map_err(Self::map_err)
    }

    async fn wait_enabled(&self, selector: &str, timeout: Duration) {
        let quoted = match serde_json::to_string(selector) {
            Ok(quoted) => quoted,
            Err(_) => return,
        };
        let script = format!(
            "(() => {{ const el = document.querySelector({quoted}); \
             if (!el) return false; \
             if (el.getAttribute('aria-disabled') === 'true') return false; \
             if (typeof el.disabled !== 'undefined' && el.disabled) return false; \
             return true; }})()"
        );
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(value) = self.eval_json(&script).await {
                if value.as_bool() == Some(true) {
                    return;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn type_text(&self, text: &str) -> DriverResult<()> {
        let mut typed = 0usize;
        for ch in text.chars() {
            self.page
                .execute(InsertTextParams::new(ch.to_string()))
                .await
                .map(|_| ())
                .map_err(Self::map_err)?;
            let delay_ms = rand::thread_rng().gen_range(35..=75);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            typed += 1;
            if typed % 160 == 0 {
                let pause_ms = rand::thread_rng().gen_range(120..=260);
                tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            }
        }
        Ok(())
    }

    async fn text_visible(&self, needles: &[&str]) -> DriverResult<bool> {
        let needles_json = serde_json::to_string(needles)
            .map_err(|e| DriverError::Browser(e.to_string()))?;
        let script = format!(
            "(() => {{ const text = document.body ? document.body.innerText : ''; \
             return {needles_json}.some((needle) => text.includes(needle)); }})()"
        );
        let value = self.eval_json(&script).await?;
        Ok(value.as_bool() == Some(true))
    }

    async fn click_button_with_text(&self, labels: &[&str]) -> DriverResult<bool> {
        let labels_json = serde_json::to_string(labels)
            .map_err(|e| DriverError::Browser(e.to_string()))?;
        let script = format!(
            "(() => {{ const labels = {labels_json}; \
             const buttons = Array.from(document.querySelectorAll('button')); \
             const hit = buttons.find((b) => labels.some((l) => (b.textContent || '').trim() === l)); \
             if (!hit) return false; hit.click(); return true; }})()"
        );
        let value = self.eval_json(&script).await?;
        Ok(value.as_bool() == Some(true))
    }

    async fn scroll_by(&self, delta_y: i64) -> DriverResult<()> {
        self.eval_json(&format!("window.scrollBy(0, {delta_y}); true"))
            .await
            .map(|_| ())
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn eval_json(&self, script: &str) -> DriverResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(Self::map_err)?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Browser(e.to_string()))
    }

    async fn screenshot_base64(&self) -> Option<String> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        match self.page.screenshot(params).await {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(error) => {
                tracing::debug!(error = %error, "screenshot failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eco_aborts_images_media_and_trackers() {
        assert!(should_abort(BandwidthMode::Eco, ResourceClass::Image, "https://x.com/a.png"));
        assert!(should_abort(BandwidthMode::Eco, ResourceClass::Media, "https://x.com/a.mp4"));
        assert!(should_abort(
            BandwidthMode::Eco,
            ResourceClass::Other,
            "https://ads.doubleclick.net/pixel"
        ));
        assert!(!should_abort(BandwidthMode::Eco, ResourceClass::Other, "https://x.com/api"));
    }

    #[test]
    fn balanced_aborts_media_and_trackers_only() {
        assert!(!should_abort(
            BandwidthMode::Balanced,
            ResourceClass::Image,
            "https://x.com/a.png"
        ));
        assert!(should_abort(
            BandwidthMode::Balanced,
            ResourceClass::Media,
            "https://x.com/a.mp4"
        ));
        assert!(should_abort(
            BandwidthMode::Balanced,
            ResourceClass::Other,
            "https://www.google-analytics.com/collect"
        ));
    }

    #[test]
    fn full_never_aborts() {
        for class in [ResourceClass::Image, ResourceClass::Media, ResourceClass::Other] {
            assert!(!should_abort(
                BandwidthMode::Full,
                class,
                "https://ads.doubleclick.net/pixel"
            ));
        }
    }

    #[test]
    fn visibility_script_escapes_selector() {
        let script = CdpDriver::visibility_script("a[href*='/status/1\"]']");
        assert!(script.contains("querySelector"));
        assert!(!script.contains("querySelector(a["), "selector must be quoted");
    }
}
