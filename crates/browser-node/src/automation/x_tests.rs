//! Action-semantics tests on the scripted driver.

use orb_protocol::{codes, ActionRequest, ActionStatus, ExecuteBatchRequest};

use super::fake::FakeDriver;
use super::x::execute_on_page;
use super::{execute_batch, run_batch};

fn like_request(url: Option<&str>, tweet_id: Option<&str>) -> ActionRequest {
    ActionRequest {
        action_type: "x_like".into(),
        target_url: url.map(String::from),
        target_external_id: tweet_id.map(String::from),
        action_params: serde_json::Map::new(),
    }
}

fn text_params(text: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut params = serde_json::Map::new();
    params.insert("text".into(), text.into());
    params
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// health_check
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn health_check_succeeds_when_logged_in() {
    let driver = FakeDriver::logged_in();
    let result = execute_on_page(&driver, &ActionRequest::new("health_check")).await;
    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(result.metadata["logged_in"], true);
    assert_eq!(driver.goto_urls.lock().as_slice(), &["https://x.com/home"]);
}

#[tokio::test]
async fn health_check_reports_auth_required_with_screenshot() {
    let driver = FakeDriver::new();
    let result = execute_on_page(&driver, &ActionRequest::new("health_check")).await;
    assert_eq!(result.status, ActionStatus::Failed);
    assert_eq!(result.error_code.as_deref(), Some(codes::AUTH_REQUIRED));
    assert!(result.screenshot_base64.is_some());
    assert_eq!(result.metadata["logged_in"], false);
}

#[tokio::test]
async fn login_flow_url_means_logged_out() {
    let driver = FakeDriver::logged_in();
    *driver.redirect_to.lock() = Some("https://x.com/i/flow/login".into());
    let result = execute_on_page(&driver, &ActionRequest::new("health_check")).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::AUTH_REQUIRED));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_like
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn like_clicks_and_post_validates() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'like'");
    driver.on_click_show("'like'", "'unlike'");

    let result = execute_on_page(
        &driver,
        &like_request(Some("https://x.com/u/status/111"), Some("111")),
    )
    .await;

    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(result.metadata["already_liked"], false);
    let clicks = driver.clicks.lock();
    assert_eq!(clicks.len(), 1);
    assert!(clicks[0].contains("/status/111"), "click scoped to the target article");
    assert!(clicks[0].contains("data-testid='like'"));
}

#[tokio::test]
async fn like_skips_when_already_liked() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'unlike'");

    let result = execute_on_page(&driver, &like_request(Some("https://x.com/u/status/1"), None)).await;
    assert_eq!(result.status, ActionStatus::Skipped);
    assert_eq!(result.metadata["already_liked"], true);
    assert!(driver.clicks.lock().is_empty());
}

#[tokio::test]
async fn like_requires_target_url() {
    let driver = FakeDriver::logged_in();
    let result = execute_on_page(&driver, &like_request(None, None)).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::INVALID_TARGET));
    assert!(driver.goto_urls.lock().is_empty());
}

#[tokio::test]
async fn like_missing_article_is_ui_drift() {
    let driver = FakeDriver::logged_in();
    let result = execute_on_page(&driver, &like_request(Some("https://x.com/u/status/1"), None)).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UI_SELECTOR_CHANGED));
    assert!(result.screenshot_base64.is_some());
}

#[tokio::test]
async fn like_unclickable_button_is_intercepted() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    let result = execute_on_page(&driver, &like_request(Some("https://x.com/u/status/1"), None)).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UI_INTERCEPTED));
}

#[tokio::test]
async fn like_without_confirmation_fails_post_validation() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'like'");
    // No unlike appears after the click.
    let result = execute_on_page(&driver, &like_request(Some("https://x.com/u/status/1"), None)).await;
    assert_eq!(
        result.error_code.as_deref(),
        Some(codes::POST_VALIDATION_FAILED)
    );
    assert!(result.screenshot_base64.is_some());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_repost
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn repost_request(url: &str) -> ActionRequest {
    ActionRequest {
        action_type: "x_repost".into(),
        target_url: Some(url.into()),
        target_external_id: None,
        action_params: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn repost_clicks_menu_then_confirm() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'retweet'");
    driver.on_click_show("'retweet'", "retweetConfirm");
    driver.on_click_show("retweetConfirm", "'unretweet'");

    let result = execute_on_page(&driver, &repost_request("https://x.com/u/status/9")).await;
    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(result.metadata["already_reposted"], false);

    let clicks = driver.clicks.lock();
    assert_eq!(clicks.len(), 2);
    assert!(clicks[1].contains("retweetConfirm"));
}

#[tokio::test]
async fn repost_missing_confirm_is_ui_drift() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'retweet'");

    let result = execute_on_page(&driver, &repost_request("https://x.com/u/status/9")).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UI_SELECTOR_CHANGED));
}

#[tokio::test]
async fn repost_skips_when_already_reposted() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'unretweet'");

    let result = execute_on_page(&driver, &repost_request("https://x.com/u/status/9")).await;
    assert_eq!(result.status, ActionStatus::Skipped);
    assert_eq!(result.metadata["already_reposted"], true);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_reply / x_quote
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn reply_types_and_submits() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'reply'");
    driver.on_click_show("'reply'", "tweetTextarea_0");
    driver.show("tweetButton");

    let request = ActionRequest {
        action_type: "x_reply".into(),
        target_url: Some("https://x.com/u/status/7".into()),
        target_external_id: Some("7".into()),
        action_params: text_params("great point"),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(driver.typed.lock().as_str(), "great point");
}

#[tokio::test]
async fn reply_requires_text() {
    let driver = FakeDriver::logged_in();
    let request = ActionRequest {
        action_type: "x_reply".into(),
        target_url: Some("https://x.com/u/status/7".into()),
        target_external_id: None,
        action_params: serde_json::Map::new(),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::INVALID_PARAMS));
}

#[tokio::test]
async fn restricted_reply_is_skipped_and_dismissed() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'reply'");
    driver
        .restriction_visible
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let request = ActionRequest {
        action_type: "x_reply".into(),
        target_url: Some("https://x.com/u/status/7".into()),
        target_external_id: None,
        action_params: text_params("hi"),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.status, ActionStatus::Skipped);
    assert_eq!(result.error_code.as_deref(), Some(codes::REPLY_RESTRICTED));
    assert!(driver.dismissed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(driver.typed.lock().is_empty());
}

#[tokio::test]
async fn quote_opens_compose_from_repost_menu() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'retweet'");
    driver.on_click_show("'retweet'", "retweetWithComment");
    driver.on_click_show("retweetWithComment", "tweetTextarea_0");
    driver.show("tweetButton");

    let request = ActionRequest {
        action_type: "x_quote".into(),
        target_url: Some("https://x.com/u/status/5".into()),
        target_external_id: Some("5".into()),
        action_params: text_params("worth a read"),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(driver.typed.lock().as_str(), "worth a read");
    assert_eq!(driver.clicks.lock().len(), 4, "retweet, quote option, textarea, submit");
}

#[tokio::test]
async fn quote_missing_textarea_is_selector_drift() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'retweet'");
    driver.on_click_show("'retweet'", "retweetWithComment");
    // The compose option opens nothing: no textarea ever appears.

    let request = ActionRequest {
        action_type: "x_quote".into(),
        target_url: Some("https://x.com/u/status/5".into()),
        target_external_id: None,
        action_params: text_params("worth a read"),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UI_SELECTOR_CHANGED));
    assert_eq!(result.message.as_deref(), Some("Quote textarea not found"));
}

#[tokio::test]
async fn quote_untypeable_textarea_is_intercepted() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'retweet'");
    driver.on_click_show("'retweet'", "retweetWithComment");
    driver.on_click_show("retweetWithComment", "tweetTextarea_0");
    // The textarea is found but something swallows the click.
    driver.fail_click("tweetTextarea_0");

    let request = ActionRequest {
        action_type: "x_quote".into(),
        target_url: Some("https://x.com/u/status/5".into()),
        target_external_id: None,
        action_params: text_params("worth a read"),
    };
    let result = execute_on_page(&driver, &request).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UI_INTERCEPTED));
    assert_eq!(result.message.as_deref(), Some("Cannot type quote text"));
    assert!(driver.typed.lock().is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// x_search_collect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn search_request(params: serde_json::Value) -> ActionRequest {
    ActionRequest {
        action_type: "x_search_collect".into(),
        target_url: Some("https://x.com/search?q=rust&src=typed_query&f=live".into()),
        target_external_id: None,
        action_params: params.as_object().cloned().unwrap_or_default(),
    }
}

fn article_entry(href: &str, verified: bool) -> serde_json::Value {
    serde_json::json!({"href": href, "verified": verified})
}

#[tokio::test]
async fn search_collect_dedupes_and_normalizes() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.script_eval(serde_json::json!([
        article_entry("/a/status/1?s=20", true),
        article_entry("/a/status/1", true),
        article_entry("/b/status/2", false),
        article_entry("no-permalink", false),
    ]));

    let result = execute_on_page(&driver, &search_request(serde_json::json!({"scroll_limit": 0}))).await;
    assert_eq!(result.status, ActionStatus::Succeeded);
    assert_eq!(result.metadata["collected"], 2);
    let candidates = result.metadata["candidates"].as_array().unwrap();
    assert_eq!(candidates[0]["tweet_id"], "1");
    assert_eq!(candidates[0]["url"], "https://x.com/a/status/1");
    assert_eq!(candidates[0]["is_verified"], true);
    assert_eq!(candidates[1]["tweet_id"], "2");
}

#[tokio::test]
async fn search_collect_scrolls_until_max_candidates() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.script_eval(serde_json::json!([
        article_entry("/a/status/1", true),
        article_entry("/a/status/2", true),
    ]));
    driver.script_eval(serde_json::json!([
        article_entry("/a/status/3", true),
        article_entry("/a/status/4", true),
    ]));

    let result = execute_on_page(
        &driver,
        &search_request(serde_json::json!({"max_candidates": 3, "scroll_limit": 5})),
    )
    .await;
    assert_eq!(result.metadata["collected"], 3);
    let scrolls = driver.scrolls.lock();
    assert_eq!(scrolls.len(), 1, "stopped scrolling once the cap was reached");
    assert!(scrolls.iter().all(|d| (900..=1_400).contains(d)));
}

#[tokio::test]
async fn search_collect_verified_dom_filter() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.script_eval(serde_json::json!([
        article_entry("/a/status/1", false),
        article_entry("/a/status/2", true),
    ]));

    let result = execute_on_page(
        &driver,
        &search_request(serde_json::json!({"verified_only_dom": true, "scroll_limit": 0})),
    )
    .await;
    assert_eq!(result.metadata["collected"], 1);
    assert_eq!(
        result.metadata["candidates"][0]["tweet_id"],
        "2"
    );
}

#[tokio::test]
async fn search_collect_without_results_is_skipped() {
    let driver = FakeDriver::logged_in();
    // No article token scripted → wait for results times out.
    let result = execute_on_page(&driver, &search_request(serde_json::json!({}))).await;
    assert_eq!(result.status, ActionStatus::Skipped);
    assert_eq!(result.metadata["collected"], 0);
    assert_eq!(result.metadata["candidates"], serde_json::json!([]));
}

#[tokio::test]
async fn search_collect_requires_login() {
    let driver = FakeDriver::new();
    let result = execute_on_page(&driver, &search_request(serde_json::json!({}))).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::AUTH_REQUIRED));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Batch semantics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn batch_aborts_remaining_after_first_failure() {
    let driver = FakeDriver::logged_in();
    // health_check passes; the like finds no article and fails; the last
    // action must not execute at all.
    let actions = vec![
        ActionRequest::new("health_check"),
        like_request(Some("https://x.com/u/status/1"), Some("1")),
        like_request(Some("https://x.com/u/status/2"), Some("2")),
    ];

    let results = run_batch(&driver, &actions).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, ActionStatus::Succeeded);
    assert_eq!(results[1].status, ActionStatus::Failed);
    assert_eq!(
        results[1].error_code.as_deref(),
        Some(codes::UI_SELECTOR_CHANGED)
    );
    assert_eq!(results[2].status, ActionStatus::Failed);
    assert_eq!(results[2].error_code.as_deref(), Some(codes::ABORTED));

    // Only the two attempted actions navigated.
    assert_eq!(driver.goto_urls.lock().len(), 2);
}

#[tokio::test]
async fn batch_skips_do_not_abort() {
    let driver = FakeDriver::logged_in();
    driver.show("article");
    driver.show("'unlike'");

    let actions = vec![
        like_request(Some("https://x.com/u/status/1"), None),
        like_request(Some("https://x.com/u/status/2"), None),
    ];
    let results = run_batch(&driver, &actions).await;
    assert!(results.iter().all(|r| r.status == ActionStatus::Skipped));
}

#[tokio::test]
async fn unsupported_action_type_fails() {
    let driver = FakeDriver::logged_in();
    let result = execute_on_page(&driver, &ActionRequest::new("x_moonwalk")).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::UNSUPPORTED_ACTION));
}

#[tokio::test]
async fn unsupported_platform_fails_whole_batch_without_launch() {
    let request = ExecuteBatchRequest {
        platform_key: "mastodon".into(),
        storage_state: serde_json::json!({}),
        bandwidth_mode: None,
        fingerprint_profile: None,
        actions: vec![ActionRequest::new("health_check"), ActionRequest::new("x_like")],
    };
    let results = execute_batch(&request, true).await;
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.error_code.as_deref() == Some(codes::UNSUPPORTED_PLATFORM)));
}
