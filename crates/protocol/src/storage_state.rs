//! Storage-state shape captured at login and replayed before actions.
//!
//! The field names follow the conventional browser storage-state JSON
//! (camelCase) so blobs captured by other tooling stay readable. Unknown
//! fields are preserved round-trip only inside `origins`, which the control
//! plane treats as opaque.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StorageCookie>,
    /// Per-origin localStorage snapshots. Carried opaquely.
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds; -1 means session cookie.
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl StorageState {
    /// Lenient parse from the schemaless map the vault stores.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_playwright_style_json() {
        let raw = serde_json::json!({
            "cookies": [{
                "name": "auth_token",
                "value": "abc",
                "domain": ".x.com",
                "path": "/",
                "expires": 1999999999.0,
                "httpOnly": true,
                "secure": true,
                "sameSite": "None"
            }],
            "origins": [{"origin": "https://x.com", "localStorage": []}]
        });
        let state = StorageState::from_value(&raw);
        assert_eq!(state.cookies.len(), 1);
        assert_eq!(state.cookies[0].name, "auth_token");
        assert!(state.cookies[0].http_only);
        assert_eq!(state.origins.len(), 1);
    }

    #[test]
    fn malformed_value_degrades_to_empty() {
        let state = StorageState::from_value(&serde_json::json!("not a map"));
        assert!(state.cookies.is_empty());
        assert!(state.origins.is_empty());
    }

    #[test]
    fn cookie_serializes_camel_case() {
        let cookie = StorageCookie {
            name: "a".into(),
            http_only: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&cookie).unwrap();
        assert!(json.get("httpOnly").is_some());
        assert!(json.get("http_only").is_none());
    }
}
