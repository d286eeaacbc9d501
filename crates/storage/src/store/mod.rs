//! `Store` — one connection pool, one method per state transition.
//!
//! Submodules group methods by concern; all share the single `Store`
//! struct so call sites see one surface.

mod accounts;
mod actions;
mod credentials;
mod runs;
mod schedules;

pub use actions::NewAction;
pub use schedules::{NewSchedule, ScheduleUpdate};

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::models::{WorkspaceRow, WorkspaceSubscriptionRow, WorkspaceUsageMonthlyRow};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) and migrate the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database on a single connection (shared by every caller
    /// of the pool), used by tests and ephemeral tooling.
    pub async fn connect_in_memory() -> sqlx::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── Workspaces ──────────────────────────────────────────────────

    pub async fn create_workspace(&self, name: &str) -> sqlx::Result<WorkspaceRow> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query_as::<_, WorkspaceRow>(
            "INSERT INTO workspaces (id, name, status, created_at, updated_at)
             VALUES (?, ?, 'active', ?, ?)
             RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_workspace(&self, id: Uuid) -> sqlx::Result<Option<WorkspaceRow>> {
        sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    // ── Subscriptions (read-only gates; billing lives elsewhere) ────

    pub async fn get_subscription(
        &self,
        workspace_id: Uuid,
    ) -> sqlx::Result<Option<WorkspaceSubscriptionRow>> {
        sqlx::query_as::<_, WorkspaceSubscriptionRow>(
            "SELECT * FROM workspace_subscriptions WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_subscription(
        &self,
        sub: &NewSubscription,
    ) -> sqlx::Result<WorkspaceSubscriptionRow> {
        let now = Utc::now();
        sqlx::query_as::<_, WorkspaceSubscriptionRow>(
            "INSERT INTO workspace_subscriptions
               (id, workspace_id, status, plan_key, seats, max_social_accounts,
                max_parallel_sessions, automation_runtime_hours, artifact_retention_days,
                current_period_start, current_period_end, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (workspace_id) DO UPDATE SET
               status = excluded.status,
               plan_key = excluded.plan_key,
               seats = excluded.seats,
               max_social_accounts = excluded.max_social_accounts,
               max_parallel_sessions = excluded.max_parallel_sessions,
               automation_runtime_hours = excluded.automation_runtime_hours,
               artifact_retention_days = excluded.artifact_retention_days,
               current_period_start = excluded.current_period_start,
               current_period_end = excluded.current_period_end,
               updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(sub.workspace_id)
        .bind(&sub.status)
        .bind(&sub.plan_key)
        .bind(sub.seats)
        .bind(sub.max_social_accounts)
        .bind(sub.max_parallel_sessions)
        .bind(sub.automation_runtime_hours)
        .bind(sub.artifact_retention_days)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    // ── Monthly usage ───────────────────────────────────────────────

    /// Atomically add runtime seconds to the month bucket. The arithmetic
    /// happens inside the upsert so concurrent completions never lose an
    /// increment.
    pub async fn add_runtime_seconds(
        &self,
        workspace_id: Uuid,
        period_start: NaiveDate,
        seconds: i64,
    ) -> sqlx::Result<()> {
        if seconds <= 0 {
            return Ok(());
        }
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO workspace_usage_monthly
               (id, workspace_id, period_start, automation_runtime_seconds, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (workspace_id, period_start) DO UPDATE SET
               automation_runtime_seconds =
                 workspace_usage_monthly.automation_runtime_seconds + excluded.automation_runtime_seconds,
               updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(period_start)
        .bind(seconds)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_usage(
        &self,
        workspace_id: Uuid,
        period_start: NaiveDate,
    ) -> sqlx::Result<Option<WorkspaceUsageMonthlyRow>> {
        sqlx::query_as::<_, WorkspaceUsageMonthlyRow>(
            "SELECT * FROM workspace_usage_monthly WHERE workspace_id = ? AND period_start = ?",
        )
        .bind(workspace_id)
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Parameters for seeding or updating a workspace subscription.
#[derive(Debug, Clone)]
pub struct NewSubscription {
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
}

impl NewSubscription {
    /// An unrestricted active subscription, handy for tests and seeding.
    pub fn active(workspace_id: Uuid) -> Self {
        Self {
            workspace_id,
            status: "active".into(),
            plan_key: "pro".into(),
            seats: 5,
            max_social_accounts: None,
            max_parallel_sessions: None,
            automation_runtime_hours: None,
            artifact_retention_days: None,
            current_period_start: None,
            current_period_end: None,
        }
    }
}
