//! Fingerprint profile: the curated subset of browser-context attributes an
//! account presents as its "device".
//!
//! Profiles arrive as schemaless maps stored on the social account. Only a
//! narrow whitelist of fields is honored, each individually type-checked and
//! dropped when malformed, so a corrupted map can never poison a launch.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FingerprintProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_touch: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Extract the whitelisted fields from a raw profile map.
///
/// Every field is validated independently; a field of the wrong shape is
/// dropped rather than failing the whole profile.
pub fn sanitize_fingerprint(raw: &serde_json::Value) -> FingerprintProfile {
    let Some(map) = raw.as_object() else {
        return FingerprintProfile::default();
    };

    let mut profile = FingerprintProfile::default();

    profile.user_agent = string_field(map, "user_agent");
    profile.locale = string_field(map, "locale");
    profile.timezone_id = string_field(map, "timezone_id");
    profile.color_scheme = string_field(map, "color_scheme");

    profile.viewport = map.get("viewport").and_then(|v| v.as_object()).and_then(|v| {
        let width = v.get("width").and_then(positive_u32)?;
        let height = v.get("height").and_then(positive_u32)?;
        Some(Viewport { width, height })
    });

    profile.device_scale_factor = map
        .get("device_scale_factor")
        .and_then(serde_json::Value::as_f64)
        .filter(|f| f.is_finite() && *f > 0.0);

    profile.is_mobile = map.get("is_mobile").and_then(serde_json::Value::as_bool);
    profile.has_touch = map.get("has_touch").and_then(serde_json::Value::as_bool);

    profile
}

fn string_field(
    map: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    map.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn positive_u32(value: &serde_json::Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|n| *n > 0 && *n <= u32::MAX as u64)
        .map(|n| n as u32)
}
