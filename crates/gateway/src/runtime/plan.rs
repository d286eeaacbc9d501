//! Action planner — turns a strategy config into the deterministic list of
//! actions an account run will execute.
//!
//! Plans are keyed: every slot carries the idempotency key
//! `{workspace}:{account}:{action_type}:{stable_target}:v{strategy_version}`
//! (`{workspace}:{account}:health_check:{run_id}` for the probe), so
//! re-planning the same inputs converges on the same rows.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use orb_protocol::SearchCandidate;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plan types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub action_type: String,
    pub target_url: Option<String>,
    pub target_external_id: Option<String>,
    pub action_params: serde_json::Map<String, serde_json::Value>,
    pub idempotency_key: String,
}

/// What a strategy config asks for beyond the health probe.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyPlan {
    /// Fixed target list, executed in one batch after the health check.
    Direct(Vec<PlannedAction>),
    /// Two-phase search strategy: collect candidates, then act on a sample.
    Search {
        collect: PlannedAction,
        follow_up: FollowUpSpec,
    },
    /// Unrecognized config type — degrade to just the health check.
    HealthCheckOnly,
}

/// Parameters of the second pass of a search strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpSpec {
    pub action_type: &'static str,
    pub verified_only: bool,
    pub max_actions: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key & target helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn platform_idempotency_key(
    workspace_id: Uuid,
    account_id: Uuid,
    action_type: &str,
    stable_target: &str,
    strategy_version: i64,
) -> String {
    format!("{workspace_id}:{account_id}:{action_type}:{stable_target}:v{strategy_version}")
}

pub fn health_check_idempotency_key(
    workspace_id: Uuid,
    account_id: Uuid,
    run_id: Uuid,
) -> String {
    format!("{workspace_id}:{account_id}:health_check:{run_id}")
}

fn tweet_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/status/(\d+)").expect("static regex"))
}

/// Extract the numeric post id from a `/status/<digits>` URL segment.
pub fn extract_tweet_id(url: &str) -> Option<String> {
    tweet_id_regex()
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip query and fragment so equivalent links produce one key.
pub fn normalize_target_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment)
        .to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plan construction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn health_check_action(
    workspace_id: Uuid,
    account_id: Uuid,
    run_id: Uuid,
) -> PlannedAction {
    PlannedAction {
        action_type: "health_check".into(),
        target_url: None,
        target_external_id: None,
        action_params: serde_json::Map::new(),
        idempotency_key: health_check_idempotency_key(workspace_id, account_id, run_id),
    }
}

/// Build the platform part of the plan from `strategy.config`.
pub fn plan_strategy<R: Rng>(
    workspace_id: Uuid,
    account_id: Uuid,
    strategy_version: i64,
    platform_key: &str,
    config: &serde_json::Value,
    rng: &mut R,
) -> StrategyPlan {
    if platform_key.trim().to_ascii_lowercase() != "x" {
        return StrategyPlan::HealthCheckOnly;
    }

    let config_type = config
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if let Some(action_type) = direct_action_type(&config_type) {
        return StrategyPlan::Direct(direct_actions(
            workspace_id,
            account_id,
            strategy_version,
            action_type,
            config,
        ));
    }

    if let Some((action_type, verified_implied)) = search_action_type(&config_type) {
        let verified_only = verified_implied
            || config.get("verified_only").and_then(|v| v.as_bool()) == Some(true);
        let collect = search_collect_action(
            workspace_id,
            account_id,
            strategy_version,
            config,
            verified_only,
            rng,
        );
        let max_actions = clamped_int(config, "max_actions", 3, 1, 50) as usize;
        return StrategyPlan::Search {
            collect,
            follow_up: FollowUpSpec {
                action_type,
                verified_only,
                max_actions,
            },
        };
    }

    StrategyPlan::HealthCheckOnly
}

fn direct_action_type(config_type: &str) -> Option<&'static str> {
    match config_type {
        "x_like" | "like" => Some("x_like"),
        "x_repost" | "x_retweet" | "retweet" | "repost" => Some("x_repost"),
        _ => None,
    }
}

fn search_action_type(config_type: &str) -> Option<(&'static str, bool)> {
    match config_type {
        "x_search_like" => Some(("x_like", false)),
        "x_search_repost" => Some(("x_repost", false)),
        "x_verified_like" => Some(("x_like", true)),
        "x_verified_repost" => Some(("x_repost", true)),
        _ => None,
    }
}

fn direct_actions(
    workspace_id: Uuid,
    account_id: Uuid,
    strategy_version: i64,
    action_type: &str,
    config: &serde_json::Value,
) -> Vec<PlannedAction> {
    let targets = config
        .get("targets")
        .or_else(|| config.get("target_urls"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut actions = Vec::new();
    for item in &targets {
        let (url, explicit_id) = match item {
            serde_json::Value::String(url) => (url.clone(), None),
            serde_json::Value::Object(map) => {
                let Some(url) = map.get("url").and_then(|v| v.as_str()) else {
                    continue;
                };
                let id = map
                    .get("tweet_id")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                (url.to_string(), id)
            }
            _ => continue,
        };
        let url = url.trim().to_string();
        if url.is_empty() {
            continue;
        }

        let tweet_id = explicit_id.or_else(|| extract_tweet_id(&url));
        let stable_target = tweet_id
            .clone()
            .unwrap_or_else(|| normalize_target_url(&url));

        actions.push(PlannedAction {
            action_type: action_type.to_string(),
            target_url: Some(url),
            target_external_id: tweet_id,
            action_params: serde_json::Map::new(),
            idempotency_key: platform_idempotency_key(
                workspace_id,
                account_id,
                action_type,
                &stable_target,
                strategy_version,
            ),
        });
    }

    if let Some(max) = positive_int(config, "max_actions") {
        actions.truncate(max);
    }
    actions
}

fn search_collect_action<R: Rng>(
    workspace_id: Uuid,
    account_id: Uuid,
    strategy_version: i64,
    config: &serde_json::Value,
    verified_only: bool,
    rng: &mut R,
) -> PlannedAction {
    let mut query = config
        .get("query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| pick_keyword(config, rng))
        .unwrap_or_default();

    if verified_only && !query.contains("filter:verified") {
        query.push_str(" filter:verified");
        query = query.trim().to_string();
    }

    let mode = match config.get("search_mode").and_then(|v| v.as_str()) {
        Some("top") => "top",
        _ => "live",
    };
    let search_url = url::Url::parse_with_params(
        "https://x.com/search",
        [("q", query.as_str()), ("src", "typed_query"), ("f", mode)],
    )
    .map(String::from)
    .unwrap_or_else(|_| "https://x.com/search".to_string());

    let mut params = serde_json::Map::new();
    params.insert(
        "max_candidates".into(),
        clamped_int(config, "max_candidates", 20, 1, 200).into(),
    );
    params.insert(
        "scroll_limit".into(),
        clamped_int(config, "scroll_limit", 6, 0, 50).into(),
    );
    if config.get("verified_only_dom").and_then(|v| v.as_bool()) == Some(true) {
        params.insert("verified_only_dom".into(), true.into());
    }

    let stable_target = normalize_target_url(&search_url);
    PlannedAction {
        action_type: "x_search_collect".into(),
        target_url: Some(search_url),
        target_external_id: None,
        action_params: params,
        idempotency_key: platform_idempotency_key(
            workspace_id,
            account_id,
            "x_search_collect",
            &stable_target,
            strategy_version,
        ),
    }
}

/// Second pass of a search strategy: shuffle the collected candidates, keep
/// those passing the verified filter, and emit up to `max_actions` slots.
pub fn follow_up_actions<R: Rng>(
    workspace_id: Uuid,
    account_id: Uuid,
    strategy_version: i64,
    spec: &FollowUpSpec,
    mut candidates: Vec<SearchCandidate>,
    rng: &mut R,
) -> Vec<PlannedAction> {
    candidates.shuffle(rng);
    candidates
        .into_iter()
        .filter(|candidate| !spec.verified_only || candidate.is_verified)
        .take(spec.max_actions)
        .map(|candidate| {
            let stable_target = if candidate.tweet_id.is_empty() {
                normalize_target_url(&candidate.url)
            } else {
                candidate.tweet_id.clone()
            };
            PlannedAction {
                action_type: spec.action_type.to_string(),
                target_url: Some(candidate.url),
                target_external_id: (!candidate.tweet_id.is_empty())
                    .then_some(candidate.tweet_id),
                action_params: serde_json::Map::new(),
                idempotency_key: platform_idempotency_key(
                    workspace_id,
                    account_id,
                    spec.action_type,
                    &stable_target,
                    strategy_version,
                ),
            }
        })
        .collect()
}

/// Parse `metadata.candidates` out of a collect result.
pub fn candidates_from_metadata(
    metadata: &serde_json::Map<String, serde_json::Value>,
) -> Vec<SearchCandidate> {
    metadata
        .get("candidates")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn pick_keyword<R: Rng>(config: &serde_json::Value, rng: &mut R) -> Option<String> {
    let keywords: Vec<String> = config
        .get("keywords")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    keywords.choose(rng).cloned()
}

fn positive_int(config: &serde_json::Value, key: &str) -> Option<usize> {
    config
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
}

fn clamped_int(config: &serde_json::Value, key: &str, default: i64, min: i64, max: i64) -> i64 {
    config
        .get(key)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
        .clamp(min, max)
}
