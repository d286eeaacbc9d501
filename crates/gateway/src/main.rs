use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use orb_domain::config::{ClusterMode, Config, ConfigSeverity};
use orb_gateway::api;
use orb_gateway::cluster::{BrowserCluster, LocalBrowserCluster, RemoteBrowserCluster};
use orb_gateway::runtime::{cleanup, queue, tick};
use orb_gateway::state::AppState;
use orb_gateway::vault::CredentialVault;
use orb_storage::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("ORBITER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("orbiter.toml"));
    let config = Config::load(Some(&config_path)).context("loading configuration")?;
    run_server(Arc::new(config)).await
}

/// Structured JSON tracing with env-filter overrides.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orb_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("Orbiter control plane starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Store ────────────────────────────────────────────────────────
    let store = Store::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting database")?;
    tracing::info!(url = %config.database.url, "store ready (migrations applied)");

    // ── Credential vault ─────────────────────────────────────────────
    let vault = CredentialVault::from_env(&config.credentials.encryption_key_env)
        .context("reading credential encryption key")?;
    match &vault {
        Some(_) => tracing::info!("credential vault ready"),
        None => tracing::warn!(
            env_var = %config.credentials.encryption_key_env,
            "credential encryption key unset — run execution and login capture disabled"
        ),
    }

    // ── Browser cluster ──────────────────────────────────────────────
    let cluster: Arc<dyn BrowserCluster> = match config.browser_cluster.mode {
        ClusterMode::Local => {
            tracing::info!("browser cluster: in-process worker");
            Arc::new(LocalBrowserCluster::new(
                config.browser_cluster.novnc_public_url.clone(),
                config.browser_cluster.headless,
            ))
        }
        ClusterMode::Remote => {
            let base_url = config
                .browser_cluster
                .api_base_url
                .clone()
                .context("remote cluster mode requires BROWSER_NODE_API_BASE_URL")?;
            let token = std::env::var(&config.browser_cluster.internal_token_env)
                .unwrap_or_default();
            if token.is_empty() {
                tracing::warn!(
                    env_var = %config.browser_cluster.internal_token_env,
                    "internal token unset — browser node will reject calls"
                );
            }
            tracing::info!(base_url = %base_url, "browser cluster: remote node");
            Arc::new(
                RemoteBrowserCluster::new(
                    &base_url,
                    token,
                    Duration::from_secs(config.browser_cluster.request_timeout_secs),
                )
                .map_err(|e| anyhow::anyhow!("building browser node client: {e}"))?,
            )
        }
    };

    // ── API token (read once, hash for constant-time comparison) ─────
    let api_token_hash = match std::env::var(&config.server.api_token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!("API bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var = %config.server.api_token_env,
                "API bearer-token auth DISABLED"
            );
            None
        }
    };

    // ── Queue + workers ──────────────────────────────────────────────
    let (run_queue, queue_rx) = queue::RunQueue::new();
    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        cluster,
        vault: vault.map(Arc::new),
        queue: run_queue.clone(),
        api_token_hash,
    };
    queue::spawn_workers(state.clone(), queue_rx, config.scheduler.queue_workers);
    tracing::info!(workers = config.scheduler.queue_workers, "account-run workers ready");

    // ── Boot recovery: rows are the source of truth ──────────────────
    let pending = store.executable_account_run_ids().await?;
    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "re-enqueueing pending account runs");
        for id in pending {
            run_queue.enqueue(id);
        }
    }

    // ── Tick dispatcher ──────────────────────────────────────────────
    {
        let state = state.clone();
        let period = Duration::from_secs(config.scheduler.tick_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(error) = tick::tick(&state).await {
                    tracing::error!(error = %error, "tick dispatch failed");
                }
            }
        });
    }
    tracing::info!(
        period_secs = config.scheduler.tick_interval_secs,
        "tick dispatcher started"
    );

    // ── Artifact retention sweeper ───────────────────────────────────
    {
        let state = state.clone();
        let period = Duration::from_secs(config.artifacts.cleanup_interval_secs.max(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(error) = cleanup::sweep_artifacts(&state).await {
                    tracing::error!(error = %error, "artifact sweep failed");
                }
            }
        });
    }

    // ── Router ───────────────────────────────────────────────────────
    let max_concurrent = std::env::var("ORBITER_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    let app = api::router()
        .layer(build_cors_layer(&config.server.cors.allowed_origins))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "Orbiter listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
