//! Schedule planner — pure mapping from (frequency, spec, random config,
//! now) to the next fire time, plus the probabilistic skip gate.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use orb_storage::models::ScheduleFrequency;

/// Next fire time for a schedule, or `None` for manual schedules.
pub fn next_fire(
    frequency: ScheduleFrequency,
    spec: &serde_json::Value,
    random_config: &serde_json::Value,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match frequency {
        ScheduleFrequency::Manual => None,
        ScheduleFrequency::Interval => {
            let mut every_minutes =
                get_int(spec, &["every_minutes", "interval_minutes"], 60);
            if every_minutes <= 0 {
                every_minutes = 60;
            }
            Some(apply_random_offset(
                now + Duration::minutes(every_minutes),
                random_config,
            ))
        }
        ScheduleFrequency::Daily => {
            let (hour, minute) = parse_time_of_day(
                spec.get("time_of_day").and_then(|v| v.as_str()).unwrap_or(""),
            );
            let candidate = match now.date_naive().and_hms_opt(hour, minute, 0) {
                Some(naive) => naive.and_utc(),
                // Unreachable with clamped inputs; fall back to the
                // unknown-frequency behavior.
                None => return Some(apply_random_offset(now + Duration::hours(24), random_config)),
            };
            let candidate = if candidate <= now {
                candidate + Duration::days(1)
            } else {
                candidate
            };
            Some(apply_random_offset(candidate, random_config))
        }
    }
}

/// Probabilistic skip: parse `skip_probability` as a float and roll.
/// Unparseable or ≤ 0 → never skip; ≥ 1 → always skip.
pub fn should_skip(random_config: &serde_json::Value) -> bool {
    let prob = match random_config.get("skip_probability") {
        Some(raw) => parse_f64(raw),
        None => return false,
    };
    let Some(prob) = prob else { return false };
    if prob <= 0.0 {
        return false;
    }
    if prob >= 1.0 {
        return true;
    }
    rand::thread_rng().gen::<f64>() < prob
}

fn apply_random_offset(
    next_at: DateTime<Utc>,
    random_config: &serde_json::Value,
) -> DateTime<Utc> {
    let max_offset = get_int(
        random_config,
        &["offset_minutes_max", "random_offset_minutes_max"],
        0,
    );
    if max_offset <= 0 {
        return next_at;
    }
    let offset = rand::thread_rng().gen_range(0..=max_offset);
    next_at + Duration::minutes(offset)
}

/// First parseable integer among `keys`, else `default`.
fn get_int(source: &serde_json::Value, keys: &[&str], default: i64) -> i64 {
    for key in keys {
        let Some(value) = source.get(*key) else { continue };
        if let Some(n) = value.as_i64() {
            return n;
        }
        if let Some(f) = value.as_f64() {
            return f as i64;
        }
        if let Some(s) = value.as_str() {
            if let Ok(n) = s.trim().parse::<i64>() {
                return n;
            }
        }
    }
    default
}

fn parse_f64(value: &serde_json::Value) -> Option<f64> {
    if let Some(f) = value.as_f64() {
        return Some(f);
    }
    value.as_str().and_then(|s| s.trim().parse::<f64>().ok())
}

/// Parse `"HH:MM"`, clamping to valid ranges. Malformed input → 09:00.
fn parse_time_of_day(raw: &str) -> (u32, u32) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (9, 0);
    }
    let mut parts = raw.split(':');
    let (Some(hour_raw), Some(minute_raw)) = (parts.next(), parts.next()) else {
        return (9, 0);
    };
    let (Ok(hour), Ok(minute)) = (hour_raw.trim().parse::<i64>(), minute_raw.trim().parse::<i64>())
    else {
        return (9, 0);
    };
    (hour.clamp(0, 23) as u32, minute.clamp(0, 59) as u32)
}
