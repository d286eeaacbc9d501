use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler & queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick dispatcher period.
    #[serde(default = "d_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Login-session TTL.
    #[serde(default = "d_login_session_ttl_mins")]
    pub login_session_ttl_mins: i64,
    /// Auto-capture poll interval.
    #[serde(default = "d_capture_poll_interval_ms")]
    pub capture_poll_interval_ms: u64,
    /// Account-run queue worker count (global concurrency bound).
    #[serde(default = "d_queue_workers")]
    pub queue_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: d_tick_interval_secs(),
            login_session_ttl_mins: d_login_session_ttl_mins(),
            capture_poll_interval_ms: d_capture_poll_interval_ms(),
            queue_workers: d_queue_workers(),
        }
    }
}

fn d_tick_interval_secs() -> u64 {
    30
}
fn d_login_session_ttl_mins() -> i64 {
    30
}
fn d_capture_poll_interval_ms() -> u64 {
    3_000
}
fn d_queue_workers() -> usize {
    4
}
