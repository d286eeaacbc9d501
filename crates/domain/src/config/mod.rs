mod artifacts;
mod cluster;
mod credentials;
mod database;
mod scheduler;
mod server;

pub use artifacts::*;
pub use cluster::*;
pub use credentials::*;
pub use database::*;
pub use scheduler::*;
pub use server::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub browser_cluster: BrowserClusterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay the
    /// recognized environment variables on top.
    ///
    /// Missing file → defaults + env. A present-but-invalid file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {e}", p.display())))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay recognized environment variables.
    ///
    /// Secrets (`CREDENTIAL_ENCRYPTION_KEY`, internal tokens) are *not*
    /// stored here — binaries read them once at startup via the configured
    /// env-var names.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            if !v.is_empty() {
                self.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("ARTIFACTS_DIR") {
            if !v.is_empty() {
                self.artifacts.dir = v.into();
            }
        }
        if let Ok(v) = std::env::var("BROWSER_CLUSTER_MODE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "local" => self.browser_cluster.mode = ClusterMode::Local,
                "remote" => self.browser_cluster.mode = ClusterMode::Remote,
                "" => {}
                other => {
                    tracing::warn!(value = %other, "unrecognized BROWSER_CLUSTER_MODE, keeping configured mode");
                }
            }
        }
        if let Ok(v) = std::env::var("BROWSER_NODE_API_BASE_URL") {
            if !v.is_empty() {
                self.browser_cluster.api_base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("NOVNC_PUBLIC_URL") {
            if !v.is_empty() {
                self.browser_cluster.novnc_public_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("LOGIN_SESSION_AUTO_CAPTURE") {
            if let Some(flag) = parse_bool(&v) {
                self.credentials.auto_capture = flag;
            }
        }
    }

    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.database.url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "database.url".into(),
                message: "database URL must not be empty".into(),
            });
        }
        if self.browser_cluster.mode == ClusterMode::Remote
            && self.browser_cluster.api_base_url.is_none()
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "browser_cluster.api_base_url".into(),
                message: "remote cluster mode requires BROWSER_NODE_API_BASE_URL".into(),
            });
        }
        if self.scheduler.tick_interval_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "scheduler.tick_interval_secs".into(),
                message: "tick interval of 0 busy-loops; use 30".into(),
            });
        }

        issues
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}
