use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Database
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL. Overridden by `DATABASE_URL`.
    #[serde(default = "d_url")]
    pub url: String,
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            max_connections: d_max_connections(),
        }
    }
}

fn d_url() -> String {
    "sqlite://orbiter.db".into()
}
fn d_max_connections() -> u32 {
    5
}
