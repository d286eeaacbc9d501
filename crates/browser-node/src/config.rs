//! Node configuration, read from the environment at startup.

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Shared internal bearer token expected in `x-internal-token`.
    pub internal_token: String,
    /// Public noVNC URL returned to login-session creators.
    pub novnc_public_url: Option<String>,
    /// Launch browsers headless. Interactive login wants a visible
    /// browser behind the VNC display.
    pub headless: bool,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("BROWSER_NODE_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: std::env::var("BROWSER_NODE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8200),
            internal_token: std::env::var("BROWSER_NODE_INTERNAL_TOKEN")
                .unwrap_or_else(|_| "change-me".into()),
            novnc_public_url: std::env::var("NOVNC_PUBLIC_URL").ok().filter(|v| !v.is_empty()),
            headless: std::env::var("BROWSER_NODE_HEADLESS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}
