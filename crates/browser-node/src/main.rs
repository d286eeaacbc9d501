use anyhow::Context;
use tracing_subscriber::EnvFilter;

use orb_browser_node::api::{self, NodeState};
use orb_browser_node::config::NodeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orb_browser_node=debug")),
        )
        .json()
        .init();

    let config = NodeConfig::from_env();
    if config.internal_token == "change-me" {
        tracing::warn!("BROWSER_NODE_INTERNAL_TOKEN is the default — set a real token");
    }

    let state = NodeState::new(&config);
    let app = api::router().with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, headless = config.headless, "browser node listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}
