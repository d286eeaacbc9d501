//! Platform adapter registry.
//!
//! One adapter per supported social platform, consumed by both the control
//! plane (login URLs, health gating) and the worker (cookie predicates).
//! Only "x" ships today.

use crate::storage_state::StorageCookie;

pub trait PlatformAdapter: Send + Sync {
    fn platform_key(&self) -> &'static str;
    fn login_url(&self) -> &'static str;
    fn cookie_origin(&self) -> &'static str;
    /// Whether the given cookie set proves an authenticated session.
    fn is_logged_in(&self, cookies: &[StorageCookie]) -> bool;
}

struct XPlatform;

impl PlatformAdapter for XPlatform {
    fn platform_key(&self) -> &'static str {
        "x"
    }

    fn login_url(&self) -> &'static str {
        "https://x.com/i/flow/login"
    }

    fn cookie_origin(&self) -> &'static str {
        "https://x.com"
    }

    fn is_logged_in(&self, cookies: &[StorageCookie]) -> bool {
        cookies.iter().any(|c| c.name == "auth_token")
    }
}

static X: XPlatform = XPlatform;

/// Look up the adapter for a platform key. `None` for unknown platforms.
pub fn adapter_for(platform_key: &str) -> Option<&'static dyn PlatformAdapter> {
    match platform_key.trim().to_ascii_lowercase().as_str() {
        "x" => Some(&X),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str) -> StorageCookie {
        StorageCookie {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn x_adapter_resolves_case_insensitively() {
        assert!(adapter_for("x").is_some());
        assert!(adapter_for(" X ").is_some());
        assert!(adapter_for("mastodon").is_none());
    }

    #[test]
    fn x_logged_in_requires_auth_token_cookie() {
        let adapter = adapter_for("x").unwrap();
        assert!(!adapter.is_logged_in(&[cookie("ct0"), cookie("guest_id")]));
        assert!(adapter.is_logged_in(&[cookie("ct0"), cookie("auth_token")]));
    }

    #[test]
    fn x_urls() {
        let adapter = adapter_for("x").unwrap();
        assert_eq!(adapter.login_url(), "https://x.com/i/flow/login");
        assert_eq!(adapter.cookie_origin(), "https://x.com");
    }
}
