//! Fingerprint profile assignment.
//!
//! A small pool of plausible desktop devices; each new social account draws
//! one and keeps it for life so the platform always sees the same "device".

use rand::seq::SliceRandom;

fn desktop_profiles() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "user_agent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
            "viewport": {"width": 1920, "height": 1080},
            "locale": "en-US",
            "timezone_id": "America/New_York",
            "color_scheme": "light",
            "device_scale_factor": 1.0,
            "is_mobile": false,
            "has_touch": false
        }),
        serde_json::json!({
            "user_agent": "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
            "viewport": {"width": 1440, "height": 900},
            "locale": "en-US",
            "timezone_id": "America/Los_Angeles",
            "color_scheme": "light",
            "device_scale_factor": 2.0,
            "is_mobile": false,
            "has_touch": false
        }),
        serde_json::json!({
            "user_agent": "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
            "viewport": {"width": 1366, "height": 768},
            "locale": "en-US",
            "timezone_id": "Europe/London",
            "color_scheme": "light",
            "device_scale_factor": 1.0,
            "is_mobile": false,
            "has_touch": false
        }),
    ]
}

/// Draw a fingerprint profile for a new account on `platform_key`.
pub fn generate_fingerprint_profile(_platform_key: &str) -> serde_json::Value {
    let pool = desktop_profiles();
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}))
}
