//! Row types and status enums.
//!
//! Statuses are stored as snake_case TEXT. JSON columns are schemaless maps
//! owned by their producers (strategy config, schedule spec, action metadata).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AccountRunStatus {
    #[default]
    Queued,
    Running,
    RetryWaiting,
    Succeeded,
    Failed,
}

impl AccountRunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the executor may pick this account run up.
    /// `retry_waiting` is reserved; entry treats it exactly like `queued`.
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Queued | Self::RetryWaiting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ActionRowStatus {
    #[default]
    Queued,
    Running,
    Succeeded,
    Skipped,
    Failed,
}

impl ActionRowStatus {
    /// Completed actions are dropped from re-entrant execute batches.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    NeedsLogin,
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LoginSessionStatus {
    #[default]
    Created,
    Active,
    Capturing,
    Succeeded,
    Failed,
    Expired,
    Canceled,
}

impl LoginSessionStatus {
    /// Terminal states are absorbing; nothing transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Expired | Self::Canceled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    #[default]
    Manual,
    Interval,
    Daily,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SocialAccountRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub platform_key: String,
    pub handle: Option<String>,
    pub status: AccountStatus,
    pub labels: Json<serde_json::Value>,
    pub fingerprint_profile: Json<serde_json::Value>,
    pub last_health_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub social_account_id: Uuid,
    pub credential_type: String,
    pub encrypted_blob: Vec<u8>,
    pub key_version: i64,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The one credential type the executor consumes today.
pub const CREDENTIAL_TYPE_STORAGE_STATE: &str = "storage_state";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoginSessionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub social_account_id: Uuid,
    pub platform_key: String,
    pub status: LoginSessionStatus,
    pub remote_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StrategyRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub platform_key: String,
    /// Monotonic; bumped on every config update. Part of action
    /// idempotency keys so edited strategies re-execute.
    pub version: i64,
    pub config: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub strategy_id: Uuid,
    pub account_selector: Json<serde_json::Value>,
    pub frequency: ScheduleFrequency,
    pub schedule_spec: Json<serde_json::Value>,
    pub random_config: Json<serde_json::Value>,
    pub max_parallel: i64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub strategy_id: Uuid,
    pub triggered_by: Option<Uuid>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccountRunRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub run_id: Uuid,
    pub social_account_id: Uuid,
    pub status: AccountRunStatus,
    pub error_code: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub account_run_id: Uuid,
    pub action_type: String,
    pub platform_key: String,
    pub target_external_id: Option<String>,
    pub target_url: Option<String>,
    pub idempotency_key: String,
    pub status: ActionRowStatus,
    pub error_code: Option<String>,
    pub metadata: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ArtifactRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action_id: Uuid,
    pub artifact_type: String,
    /// Path relative to the artifacts root, workspace-sharded.
    pub storage_key: String,
    pub size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

pub const ARTIFACT_TYPE_SCREENSHOT: &str = "screenshot";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkspaceSubscriptionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub status: String,
    pub plan_key: String,
    pub seats: i64,
    pub max_social_accounts: Option<i64>,
    pub max_parallel_sessions: Option<i64>,
    pub automation_runtime_hours: Option<i64>,
    pub artifact_retention_days: Option<i64>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceSubscriptionRow {
    /// Read-only billing gate: `trial` and `active` subscriptions run.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let status = self.status.trim().to_ascii_lowercase();
        if status != "trial" && status != "active" {
            return false;
        }
        match self.current_period_end {
            Some(end) => end > now,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkspaceUsageMonthlyRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// First day of the UTC month.
    pub period_start: NaiveDate,
    pub automation_runtime_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// First-of-month bucket for a UTC instant.
pub fn month_period_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn retry_waiting_is_executable_like_queued() {
        assert!(AccountRunStatus::Queued.is_executable());
        assert!(AccountRunStatus::RetryWaiting.is_executable());
        assert!(!AccountRunStatus::Running.is_executable());
        assert!(!AccountRunStatus::Failed.is_executable());
    }

    #[test]
    fn done_actions_are_succeeded_or_skipped() {
        assert!(ActionRowStatus::Succeeded.is_done());
        assert!(ActionRowStatus::Skipped.is_done());
        assert!(!ActionRowStatus::Failed.is_done());
        assert!(!ActionRowStatus::Queued.is_done());
    }

    #[test]
    fn login_session_terminal_states() {
        for status in [
            LoginSessionStatus::Succeeded,
            LoginSessionStatus::Failed,
            LoginSessionStatus::Expired,
            LoginSessionStatus::Canceled,
        ] {
            assert!(status.is_terminal());
        }
        for status in [
            LoginSessionStatus::Created,
            LoginSessionStatus::Active,
            LoginSessionStatus::Capturing,
        ] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn month_period_start_truncates_to_first() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 13, 45, 0).unwrap();
        assert_eq!(
            month_period_start(at),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn subscription_gate() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let mut sub = WorkspaceSubscriptionRow {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            status: "active".into(),
            plan_key: "pro".into(),
            seats: 5,
            max_social_accounts: None,
            max_parallel_sessions: None,
            automation_runtime_hours: None,
            artifact_retention_days: None,
            current_period_start: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };
        assert!(sub.is_active(now));

        sub.status = "past_due".into();
        assert!(!sub.is_active(now));

        sub.status = "trial".into();
        sub.current_period_end = Some(now - chrono::Duration::days(1));
        assert!(!sub.is_active(now));
    }
}
