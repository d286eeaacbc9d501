//! Strategies and schedules, including the due-claim used by the tick
//! dispatcher.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{ScheduleFrequency, ScheduleRow, StrategyRow};

use super::Store;

/// Parameters for creating a schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub workspace_id: Uuid,
    pub name: String,
    pub strategy_id: Uuid,
    pub enabled: bool,
    pub frequency: ScheduleFrequency,
    pub schedule_spec: serde_json::Value,
    pub random_config: serde_json::Value,
    pub account_selector: serde_json::Value,
    pub max_parallel: i64,
}

/// Partial schedule update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub frequency: Option<ScheduleFrequency>,
    pub schedule_spec: Option<serde_json::Value>,
    pub random_config: Option<serde_json::Value>,
    pub account_selector: Option<serde_json::Value>,
    pub max_parallel: Option<i64>,
}

impl Store {
    // ── Strategies ──────────────────────────────────────────────────

    pub async fn create_strategy(
        &self,
        workspace_id: Uuid,
        name: &str,
        platform_key: &str,
        config: serde_json::Value,
    ) -> sqlx::Result<StrategyRow> {
        let now = Utc::now();
        sqlx::query_as::<_, StrategyRow>(
            "INSERT INTO strategies
               (id, workspace_id, name, platform_key, version, config, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(name)
        .bind(platform_key)
        .bind(Json(config))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_strategy(&self, id: Uuid) -> sqlx::Result<Option<StrategyRow>> {
        sqlx::query_as::<_, StrategyRow>("SELECT * FROM strategies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_strategy_scoped(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<StrategyRow>> {
        sqlx::query_as::<_, StrategyRow>(
            "SELECT * FROM strategies WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_strategies(&self, workspace_id: Uuid) -> sqlx::Result<Vec<StrategyRow>> {
        sqlx::query_as::<_, StrategyRow>(
            "SELECT * FROM strategies WHERE workspace_id = ? ORDER BY created_at ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Replace the config and bump the version so new runs mint fresh
    /// idempotency keys.
    pub async fn update_strategy_config(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        config: serde_json::Value,
    ) -> sqlx::Result<Option<StrategyRow>> {
        sqlx::query_as::<_, StrategyRow>(
            "UPDATE strategies
             SET config = ?, version = version + 1, updated_at = ?
             WHERE workspace_id = ? AND id = ?
             RETURNING *",
        )
        .bind(Json(config))
        .bind(Utc::now())
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    // ── Schedules ───────────────────────────────────────────────────

    pub async fn create_schedule(&self, new: &NewSchedule) -> sqlx::Result<ScheduleRow> {
        let now = Utc::now();
        sqlx::query_as::<_, ScheduleRow>(
            "INSERT INTO schedules
               (id, workspace_id, name, enabled, strategy_id, account_selector,
                frequency, schedule_spec, random_config, max_parallel, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.workspace_id)
        .bind(&new.name)
        .bind(new.enabled)
        .bind(new.strategy_id)
        .bind(Json(new.account_selector.clone()))
        .bind(new.frequency)
        .bind(Json(new.schedule_spec.clone()))
        .bind(Json(new.random_config.clone()))
        .bind(new.max_parallel)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_schedule(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_schedules(&self, workspace_id: Uuid) -> sqlx::Result<Vec<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules WHERE workspace_id = ? ORDER BY created_at ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_schedule(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &ScheduleUpdate,
    ) -> sqlx::Result<Option<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            "UPDATE schedules SET
               name = COALESCE(?, name),
               enabled = COALESCE(?, enabled),
               frequency = COALESCE(?, frequency),
               schedule_spec = COALESCE(?, schedule_spec),
               random_config = COALESCE(?, random_config),
               account_selector = COALESCE(?, account_selector),
               max_parallel = COALESCE(?, max_parallel),
               updated_at = ?
             WHERE workspace_id = ? AND id = ?
             RETURNING *",
        )
        .bind(update.name.as_deref())
        .bind(update.enabled)
        .bind(update.frequency)
        .bind(update.schedule_spec.clone().map(Json))
        .bind(update.random_config.clone().map(Json))
        .bind(update.account_selector.clone().map(Json))
        .bind(update.max_parallel)
        .bind(Utc::now())
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Enabled, non-manual schedules that have never been planned.
    pub async fn schedules_missing_next_run(&self) -> sqlx::Result<Vec<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules
             WHERE enabled = 1 AND frequency != 'manual' AND next_run_at IS NULL
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn set_schedule_next_run(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE schedules SET next_run_at = ?, updated_at = ? WHERE id = ?")
            .bind(next_run_at)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Enabled, non-manual schedules whose fire time has passed.
    pub async fn due_schedules(&self, now: DateTime<Utc>) -> sqlx::Result<Vec<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules
             WHERE enabled = 1 AND frequency != 'manual'
               AND next_run_at IS NOT NULL AND next_run_at <= ?
             ORDER BY created_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    /// Claim a due schedule by advancing its fire time, conditioned on the
    /// observed `next_run_at`. Exactly one replica wins the claim; the
    /// losers see zero rows affected and move on.
    pub async fn claim_due_schedule(
        &self,
        id: Uuid,
        observed_next_run_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        new_next_run_at: Option<DateTime<Utc>>,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE schedules
             SET last_run_at = ?, next_run_at = ?, updated_at = ?
             WHERE id = ? AND next_run_at = ?",
        )
        .bind(last_run_at)
        .bind(new_next_run_at)
        .bind(Utc::now())
        .bind(id)
        .bind(observed_next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Back-pressure probe: any non-terminal run for this schedule blocks
    /// the next fire.
    pub async fn has_active_run(&self, schedule_id: Uuid) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM runs
             WHERE schedule_id = ? AND status IN ('queued', 'running')",
        )
        .bind(schedule_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (Store, Uuid, StrategyRow) {
        let store = Store::connect_in_memory().await.unwrap();
        let ws = store.create_workspace("acme").await.unwrap();
        let strategy = store
            .create_strategy(ws.id, "likes", "x", serde_json::json!({"type": "x_like"}))
            .await
            .unwrap();
        (store, ws.id, strategy)
    }

    fn schedule_params(ws: Uuid, strategy_id: Uuid) -> NewSchedule {
        NewSchedule {
            workspace_id: ws,
            name: "hourly".into(),
            strategy_id,
            enabled: true,
            frequency: ScheduleFrequency::Interval,
            schedule_spec: serde_json::json!({"every_minutes": 60}),
            random_config: serde_json::json!({}),
            account_selector: serde_json::json!({}),
            max_parallel: 1,
        }
    }

    #[tokio::test]
    async fn strategy_update_bumps_version() {
        let (store, ws, strategy) = seeded().await;
        assert_eq!(strategy.version, 1);
        let updated = store
            .update_strategy_config(ws, strategy.id, serde_json::json!({"type": "x_repost"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn missing_next_run_query_excludes_manual_and_disabled() {
        let (store, ws, strategy) = seeded().await;

        store.create_schedule(&schedule_params(ws, strategy.id)).await.unwrap();

        let mut manual = schedule_params(ws, strategy.id);
        manual.frequency = ScheduleFrequency::Manual;
        store.create_schedule(&manual).await.unwrap();

        let mut disabled = schedule_params(ws, strategy.id);
        disabled.enabled = false;
        store.create_schedule(&disabled).await.unwrap();

        let missing = store.schedules_missing_next_run().await.unwrap();
        assert_eq!(missing.len(), 1);
    }

    #[tokio::test]
    async fn claim_wins_once() {
        let (store, ws, strategy) = seeded().await;
        let schedule = store.create_schedule(&schedule_params(ws, strategy.id)).await.unwrap();
        let due_at = Utc::now() - Duration::minutes(1);
        store.set_schedule_next_run(schedule.id, Some(due_at)).await.unwrap();

        let now = Utc::now();
        let next = Some(now + Duration::hours(1));
        assert!(store
            .claim_due_schedule(schedule.id, due_at, now, next)
            .await
            .unwrap());
        // Second claimer observed the same stale next_run_at and loses.
        assert!(!store
            .claim_due_schedule(schedule.id, due_at, now, next)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn due_schedules_filters_by_deadline() {
        let (store, ws, strategy) = seeded().await;
        let schedule = store.create_schedule(&schedule_params(ws, strategy.id)).await.unwrap();
        let now = Utc::now();

        store
            .set_schedule_next_run(schedule.id, Some(now + Duration::hours(1)))
            .await
            .unwrap();
        assert!(store.due_schedules(now).await.unwrap().is_empty());

        store
            .set_schedule_next_run(schedule.id, Some(now - Duration::seconds(5)))
            .await
            .unwrap();
        assert_eq!(store.due_schedules(now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn schedule_partial_update() {
        let (store, ws, strategy) = seeded().await;
        let schedule = store.create_schedule(&schedule_params(ws, strategy.id)).await.unwrap();

        let updated = store
            .update_schedule(
                ws,
                schedule.id,
                &ScheduleUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.name, "hourly", "untouched fields survive");
    }
}
