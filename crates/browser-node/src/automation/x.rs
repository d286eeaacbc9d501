//! Platform "x" action semantics.
//!
//! Each action navigates on the shared batch page, verifies the session is
//! still authenticated, and drives the UI through data-testid selectors.
//! Failure paths attach a screenshot whenever a page has rendered.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use orb_protocol::{codes, ActionRequest, ExecuteActionResult, SearchCandidate};

use super::driver::{DriverError, PageDriver};

const ARTICLE_TIMEOUT: Duration = Duration::from_secs(10);
const CLICK_TIMEOUT: Duration = Duration::from_secs(10);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);
const TEXTAREA_TIMEOUT: Duration = Duration::from_secs(12);
const QUOTE_TEXTAREA_TIMEOUT: Duration = Duration::from_secs(20);
const DIALOG_DETACH_TIMEOUT: Duration = Duration::from_secs(15);
const LOGIN_PROBE_TIMEOUT: Duration = Duration::from_millis(2_500);
const SEARCH_RESULTS_TIMEOUT: Duration = Duration::from_secs(10);

const TEXTAREA_SELECTOR: &str = "[data-testid='tweetTextarea_0']";
const SUBMIT_SELECTOR: &str = "[data-testid='tweetButton'], [data-testid='tweetButtonInline']";
const DIALOG_SELECTOR: &str = "div[role='dialog'][aria-modal='true']";

/// Dispatch one action on an already-prepared page.
pub async fn execute_on_page(
    driver: &dyn PageDriver,
    action: &ActionRequest,
) -> ExecuteActionResult {
    let action_type = action.action_type.trim().to_ascii_lowercase();
    let target_url = action.target_url.as_deref().filter(|s| !s.trim().is_empty());
    let tweet_id = action
        .target_external_id
        .as_deref()
        .filter(|s| !s.trim().is_empty());

    match action_type.as_str() {
        "health_check" | "x_health_check" => health_check(driver).await,
        "x_like" | "like" => like(driver, target_url, tweet_id).await,
        "x_repost" | "x_retweet" | "retweet" | "repost" => {
            repost(driver, target_url, tweet_id).await
        }
        "x_reply" | "reply" | "comment" | "x_comment" => {
            reply(driver, target_url, tweet_id, &action.action_params).await
        }
        "x_quote" | "quote" => quote(driver, target_url, tweet_id, &action.action_params).await,
        "x_search_collect" | "search_collect" => {
            search_collect(driver, target_url, &action.action_params).await
        }
        _ => {
            ExecuteActionResult::failed(
                codes::UNSUPPORTED_ACTION,
                format!("Unsupported action_type: {}", action.action_type),
            )
            .with_url(driver.current_url().await)
            .with_screenshot(driver.screenshot_base64().await)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logged-in predicate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn is_logged_in(driver: &dyn PageDriver) -> bool {
    let url = driver.current_url().await;
    if url.contains("/i/flow/login") || url.contains("/login") {
        return false;
    }
    if driver
        .count("[data-testid='loginButton']")
        .await
        .unwrap_or(0)
        > 0
    {
        return false;
    }
    if driver
        .count("a[href='/login'], a[href*='/i/flow/login']")
        .await
        .unwrap_or(0)
        > 0
    {
        return false;
    }
    // Each marker gets its own probe budget; a slowly rendering but
    // authenticated page may only show the second one late.
    for selector in [
        "[data-testid='SideNav_NewTweet_Button']",
        "[data-testid='AppTabBar_Profile_Link']",
    ] {
        if driver
            .wait_visible(selector, LOGIN_PROBE_TIMEOUT)
            .await
            .is_ok()
        {
            return true;
        }
    }
    false
}

async fn auth_failure(driver: &dyn PageDriver) -> ExecuteActionResult {
    ExecuteActionResult::failed(codes::AUTH_REQUIRED, "Not logged in")
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)
        .with_metadata("logged_in", false.into())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared pieces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scope to the article for the target post: the one containing its
/// `/status/<id>` permalink, or the first article on the page.
fn article_selector(tweet_id: Option<&str>) -> String {
    match tweet_id {
        Some(id) => format!("article:has(a[href*='/status/{id}'])"),
        None => "article".to_string(),
    }
}

async fn navigate(
    driver: &dyn PageDriver,
    url: &str,
) -> Result<(), ExecuteActionResult> {
    match driver.goto(url).await {
        Ok(()) => Ok(()),
        Err(DriverError::Timeout(message)) => Err(ExecuteActionResult::failed(
            codes::NETWORK_TIMEOUT,
            message,
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)),
        Err(DriverError::Browser(message)) => Err(ExecuteActionResult::failed(
            codes::BROWSER_ERROR,
            message,
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)),
    }
}

/// Wait for the target article, mapping a timeout to UI drift.
async fn find_article(
    driver: &dyn PageDriver,
    selector: &str,
) -> Result<(), ExecuteActionResult> {
    match driver.wait_visible(selector, ARTICLE_TIMEOUT).await {
        Ok(()) => Ok(()),
        Err(_) => Err(ExecuteActionResult::failed(
            codes::UI_SELECTOR_CHANGED,
            "Tweet article not found",
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)),
    }
}

/// Wait-and-click with stage-specific error codes: a timeout is an
/// intercepted control, anything else is a browser fault.
async fn click_control(
    driver: &dyn PageDriver,
    selector: &str,
    timeout: Duration,
    timeout_code: &str,
    timeout_message: &str,
) -> Result<(), ExecuteActionResult> {
    let clicked = async {
        driver.wait_visible(selector, timeout).await?;
        driver.click(selector).await
    }
    .await;
    match clicked {
        Ok(()) => Ok(()),
        Err(DriverError::Timeout(_)) => Err(ExecuteActionResult::failed(
            timeout_code,
            timeout_message,
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)),
        Err(DriverError::Browser(message)) => Err(ExecuteActionResult::failed(
            codes::BROWSER_ERROR,
            message,
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)),
    }
}

fn invalid_target(action: &str) -> ExecuteActionResult {
    ExecuteActionResult::failed(
        codes::INVALID_TARGET,
        format!("target_url is required for {action}"),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// health_check
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn health_check(driver: &dyn PageDriver) -> ExecuteActionResult {
    if let Err(failure) = navigate(driver, "https://x.com/home").await {
        return failure;
    }
    if is_logged_in(driver).await {
        ExecuteActionResult::succeeded()
            .with_url(driver.current_url().await)
            .with_metadata("logged_in", true.into())
    } else {
        auth_failure(driver).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_like
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn like(
    driver: &dyn PageDriver,
    target_url: Option<&str>,
    tweet_id: Option<&str>,
) -> ExecuteActionResult {
    let Some(target_url) = target_url else {
        return invalid_target("x_like");
    };
    if let Err(failure) = navigate(driver, target_url).await {
        return failure;
    }
    if !is_logged_in(driver).await {
        return auth_failure(driver).await;
    }

    let article = article_selector(tweet_id);
    if let Err(failure) = find_article(driver, &article).await {
        return failure;
    }

    let unlike = format!("{article} button[data-testid='unlike']");
    if driver.count(&unlike).await.unwrap_or(0) > 0 {
        return ExecuteActionResult::skipped("Already liked")
            .with_url(driver.current_url().await)
            .with_metadata("already_liked", true.into());
    }

    let like_button = format!("{article} button[data-testid='like']");
    if let Err(failure) = click_control(
        driver,
        &like_button,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Like button not clickable",
    )
    .await
    {
        return failure;
    }

    match driver.wait_visible(&unlike, VALIDATE_TIMEOUT).await {
        Ok(()) => ExecuteActionResult::succeeded()
            .with_url(driver.current_url().await)
            .with_metadata("already_liked", false.into()),
        Err(_) => ExecuteActionResult::failed(
            codes::POST_VALIDATION_FAILED,
            "Like action not confirmed (unlike not visible)",
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)
        .with_metadata("already_liked", false.into()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_repost
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn repost(
    driver: &dyn PageDriver,
    target_url: Option<&str>,
    tweet_id: Option<&str>,
) -> ExecuteActionResult {
    let Some(target_url) = target_url else {
        return invalid_target("x_repost");
    };
    if let Err(failure) = navigate(driver, target_url).await {
        return failure;
    }
    if !is_logged_in(driver).await {
        return auth_failure(driver).await;
    }

    let article = article_selector(tweet_id);
    if let Err(failure) = find_article(driver, &article).await {
        return failure;
    }

    let unretweet = format!("{article} button[data-testid='unretweet']");
    if driver.count(&unretweet).await.unwrap_or(0) > 0 {
        return ExecuteActionResult::skipped("Already reposted")
            .with_url(driver.current_url().await)
            .with_metadata("already_reposted", true.into());
    }

    let retweet_button = format!("{article} button[data-testid='retweet']");
    if let Err(failure) = click_control(
        driver,
        &retweet_button,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Repost button not clickable",
    )
    .await
    {
        return failure;
    }

    // The menu needs its confirm option clicked before anything happens.
    if let Err(failure) = click_control(
        driver,
        "[data-testid='retweetConfirm']",
        CONFIRM_TIMEOUT,
        codes::UI_SELECTOR_CHANGED,
        "Repost confirm not found",
    )
    .await
    {
        return failure;
    }

    match driver.wait_visible(&unretweet, VALIDATE_TIMEOUT).await {
        Ok(()) => ExecuteActionResult::succeeded()
            .with_url(driver.current_url().await)
            .with_metadata("already_reposted", false.into()),
        Err(_) => ExecuteActionResult::failed(
            codes::POST_VALIDATION_FAILED,
            "Repost action not confirmed (unretweet not visible)",
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await)
        .with_metadata("already_reposted", false.into()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_reply
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const RESTRICTION_NEEDLES: &[&str] = &["Who can reply", "who can reply", "谁可以回复"];
const RESTRICTION_DISMISS_LABELS: &[&str] = &["Got it", "got it", "OK", "Ok", "知道了", "确定"];

async fn reply(
    driver: &dyn PageDriver,
    target_url: Option<&str>,
    tweet_id: Option<&str>,
    params: &serde_json::Map<String, serde_json::Value>,
) -> ExecuteActionResult {
    let Some(target_url) = target_url else {
        return invalid_target("x_reply");
    };
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if text.is_empty() {
        return ExecuteActionResult::failed(
            codes::INVALID_PARAMS,
            "action_params.text is required for x_reply",
        );
    }

    if let Err(failure) = navigate(driver, target_url).await {
        return failure;
    }
    if !is_logged_in(driver).await {
        return auth_failure(driver).await;
    }

    let article = article_selector(tweet_id);
    if let Err(failure) = find_article(driver, &article).await {
        return failure;
    }

    let reply_button = format!("{article} button[data-testid='reply']");
    if let Err(failure) = click_control(
        driver,
        &reply_button,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Reply button not clickable",
    )
    .await
    {
        return failure;
    }
    let reply_delay_ms = rand::thread_rng().gen_range(900..=1_600);
    driver.sleep_ms(reply_delay_ms).await;

    // Authors can restrict who replies; the compose dialog never opens.
    if driver
        .text_visible(RESTRICTION_NEEDLES)
        .await
        .unwrap_or(false)
    {
        let _ = driver
            .click_button_with_text(RESTRICTION_DISMISS_LABELS)
            .await;
        return ExecuteActionResult::skipped("Reply restricted by author")
            .with_error_code(codes::REPLY_RESTRICTED)
            .with_url(driver.current_url().await);
    }

    let typed = async {
        driver.wait_visible(TEXTAREA_SELECTOR, TEXTAREA_TIMEOUT).await?;
        driver.click(TEXTAREA_SELECTOR).await?;
        driver.type_text(text).await
    }
    .await;
    if typed.is_err() {
        return ExecuteActionResult::failed(
            codes::UI_SELECTOR_CHANGED,
            "Reply textarea not found",
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await);
    }

    driver.wait_enabled(SUBMIT_SELECTOR, CONFIRM_TIMEOUT).await;
    if let Err(failure) = click_control(
        driver,
        SUBMIT_SELECTOR,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Reply submit not clickable",
    )
    .await
    {
        return failure;
    }

    // Wait for the compose dialog to go away; best-effort.
    let _ = driver
        .wait_detached(DIALOG_SELECTOR, DIALOG_DETACH_TIMEOUT)
        .await;

    ExecuteActionResult::succeeded().with_url(driver.current_url().await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_quote
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn quote(
    driver: &dyn PageDriver,
    target_url: Option<&str>,
    tweet_id: Option<&str>,
    params: &serde_json::Map<String, serde_json::Value>,
) -> ExecuteActionResult {
    let Some(target_url) = target_url else {
        return invalid_target("x_quote");
    };
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if text.is_empty() {
        return ExecuteActionResult::failed(
            codes::INVALID_PARAMS,
            "action_params.text is required for x_quote",
        );
    }

    if let Err(failure) = navigate(driver, target_url).await {
        return failure;
    }
    if !is_logged_in(driver).await {
        return auth_failure(driver).await;
    }

    let article = article_selector(tweet_id);
    if let Err(failure) = find_article(driver, &article).await {
        return failure;
    }

    if driver
        .count(&format!("{article} button[data-testid='unretweet']"))
        .await
        .unwrap_or(0)
        > 0
    {
        return ExecuteActionResult::skipped("Already reposted")
            .with_url(driver.current_url().await)
            .with_metadata("already_reposted", true.into());
    }

    let retweet_button = format!("{article} button[data-testid='retweet']");
    if let Err(failure) = click_control(
        driver,
        &retweet_button,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Repost button not clickable",
    )
    .await
    {
        return failure;
    }

    // From the repost menu, pick the compose (quote) option.
    if let Err(failure) = click_control(
        driver,
        "a[href*='/compose/'], [data-testid='retweetWithComment']",
        Duration::from_secs(6),
        codes::UI_SELECTOR_CHANGED,
        "Quote option not found",
    )
    .await
    {
        return failure;
    }
    let quote_open_delay_ms = rand::thread_rng().gen_range(900..=1_600);
    driver.sleep_ms(quote_open_delay_ms).await;

    if driver
        .wait_visible(TEXTAREA_SELECTOR, QUOTE_TEXTAREA_TIMEOUT)
        .await
        .is_err()
    {
        return ExecuteActionResult::failed(
            codes::UI_SELECTOR_CHANGED,
            "Quote textarea not found",
        )
        .with_url(driver.current_url().await)
        .with_screenshot(driver.screenshot_base64().await);
    }

    // The textarea exists; failing to click or type into it is an
    // intercepted control, not selector drift.
    let typed = async {
        driver.click(TEXTAREA_SELECTOR).await?;
        driver.type_text(text).await
    }
    .await;
    if typed.is_err() {
        return ExecuteActionResult::failed(codes::UI_INTERCEPTED, "Cannot type quote text")
            .with_url(driver.current_url().await)
            .with_screenshot(driver.screenshot_base64().await);
    }

    driver.wait_enabled(SUBMIT_SELECTOR, CONFIRM_TIMEOUT).await;
    if let Err(failure) = click_control(
        driver,
        SUBMIT_SELECTOR,
        CLICK_TIMEOUT,
        codes::UI_INTERCEPTED,
        "Quote submit not clickable",
    )
    .await
    {
        return failure;
    }
    let quote_submit_delay_ms = rand::thread_rng().gen_range(1_200..=2_200);
    driver.sleep_ms(quote_submit_delay_ms).await;

    ExecuteActionResult::succeeded().with_url(driver.current_url().await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_search_collect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-article extraction: the permalink href and the verified badge.
const COLLECT_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('article')).map((article) => {
  const link = article.querySelector("a[href*='/status/']");
  return {
    href: link ? link.getAttribute('href') : null,
    verified: !!article.querySelector("[data-testid='icon-verified']"),
  };
})
"#;

async fn search_collect(
    driver: &dyn PageDriver,
    search_url: Option<&str>,
    params: &serde_json::Map<String, serde_json::Value>,
) -> ExecuteActionResult {
    let Some(search_url) = search_url else {
        return ExecuteActionResult::failed(
            codes::INVALID_TARGET,
            "target_url is required for x_search_collect",
        );
    };

    let max_candidates = clamped_param(params, "max_candidates", 20, 1, 200) as usize;
    let scroll_limit = clamped_param(params, "scroll_limit", 6, 0, 50) as usize;
    let verified_only_dom = params.get("verified_only_dom").and_then(|v| v.as_bool())
        == Some(true);

    if let Err(failure) = navigate(driver, search_url).await {
        return failure;
    }
    if !is_logged_in(driver).await {
        return auth_failure(driver).await;
    }

    if driver
        .wait_visible("article", SEARCH_RESULTS_TIMEOUT)
        .await
        .is_err()
    {
        return ExecuteActionResult::skipped("No search results")
            .with_url(driver.current_url().await)
            .with_screenshot(driver.screenshot_base64().await)
            .with_metadata("candidates", serde_json::json!([]))
            .with_metadata("collected", 0.into());
    }

    let mut candidates: Vec<SearchCandidate> = Vec::new();
    let mut seen: HashMap<String, ()> = HashMap::new();

    for pass in 0..=scroll_limit {
        let articles = driver
            .eval_json(COLLECT_SCRIPT)
            .await
            .ok()
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default();

        for entry in &articles {
            if candidates.len() >= max_candidates {
                break;
            }
            let Some(href) = entry.get("href").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(tweet_id) = extract_tweet_id(href) else {
                continue;
            };
            if seen.contains_key(&tweet_id) {
                continue;
            }
            let is_verified = entry.get("verified").and_then(|v| v.as_bool()) == Some(true);
            if verified_only_dom && !is_verified {
                continue;
            }
            seen.insert(tweet_id.clone(), ());
            candidates.push(SearchCandidate {
                tweet_id,
                url: normalize_x_url(href),
                is_verified,
            });
        }

        if candidates.len() >= max_candidates || pass == scroll_limit {
            break;
        }
        let scroll_amount = rand::thread_rng().gen_range(900..=1_400);
        let _ = driver.scroll_by(scroll_amount).await;
        let scroll_delay_ms = rand::thread_rng().gen_range(450..=900);
        driver.sleep_ms(scroll_delay_ms).await;
    }

    if candidates.is_empty() {
        return ExecuteActionResult::skipped("No candidates found")
            .with_url(driver.current_url().await)
            .with_metadata("candidates", serde_json::json!([]))
            .with_metadata("collected", 0.into());
    }

    let collected = candidates.len();
    ExecuteActionResult::succeeded()
        .with_url(driver.current_url().await)
        .with_metadata(
            "candidates",
            serde_json::to_value(candidates).unwrap_or(serde_json::json!([])),
        )
        .with_metadata("collected", collected.into())
}

fn extract_tweet_id(href: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/status/(\d+)").expect("static regex"));
    re.captures(href)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalize a permalink to an absolute `https://x.com/...` URL without a
/// query string.
fn normalize_x_url(href: &str) -> String {
    let raw = href.trim();
    let absolute = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("https://x.com{raw}")
    } else {
        format!("https://x.com/{raw}")
    };
    absolute
        .split('?')
        .next()
        .unwrap_or(&absolute)
        .to_string()
}

fn clamped_param(
    params: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    default: i64,
    min: i64,
    max: i64,
) -> i64 {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_selector_scopes_to_tweet() {
        assert_eq!(
            article_selector(Some("123")),
            "article:has(a[href*='/status/123'])"
        );
        assert_eq!(article_selector(None), "article");
    }

    #[test]
    fn normalize_relative_href() {
        assert_eq!(
            normalize_x_url("/user/status/99?s=20"),
            "https://x.com/user/status/99"
        );
        assert_eq!(
            normalize_x_url("https://x.com/a/status/1?x=y"),
            "https://x.com/a/status/1"
        );
        assert_eq!(normalize_x_url("user/status/5"), "https://x.com/user/status/5");
    }

    #[test]
    fn tweet_id_from_href() {
        assert_eq!(extract_tweet_id("/u/status/42/photo/1"), Some("42".into()));
        assert_eq!(extract_tweet_id("/u/profile"), None);
    }

    #[test]
    fn clamped_param_bounds() {
        let params = serde_json::json!({"max_candidates": 9999, "scroll_limit": -1});
        let map = params.as_object().unwrap();
        assert_eq!(clamped_param(map, "max_candidates", 20, 1, 200), 200);
        assert_eq!(clamped_param(map, "scroll_limit", 6, 0, 50), 0);
        assert_eq!(clamped_param(map, "missing", 6, 0, 50), 6);
    }
}
