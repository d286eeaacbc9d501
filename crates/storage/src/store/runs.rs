//! Runs and account runs: materialization, executor entry, terminal
//! rollup.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AccountRunRow, AccountRunStatus, RunRow, RunStatus};

use super::Store;

impl Store {
    /// Materialize a run plus one queued account-run per resolved account,
    /// in a single transaction.
    pub async fn create_run(
        &self,
        workspace_id: Uuid,
        schedule_id: Option<Uuid>,
        strategy_id: Uuid,
        triggered_by: Option<Uuid>,
        account_ids: &[Uuid],
    ) -> sqlx::Result<(RunRow, Vec<AccountRunRow>)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let run = sqlx::query_as::<_, RunRow>(
            "INSERT INTO runs
               (id, workspace_id, schedule_id, strategy_id, triggered_by, status, created_at)
             VALUES (?, ?, ?, ?, ?, 'queued', ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(schedule_id)
        .bind(strategy_id)
        .bind(triggered_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut account_runs = Vec::with_capacity(account_ids.len());
        for account_id in account_ids {
            let account_run = sqlx::query_as::<_, AccountRunRow>(
                "INSERT INTO account_runs
                   (id, workspace_id, run_id, social_account_id, status, created_at)
                 VALUES (?, ?, ?, ?, 'queued', ?)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(workspace_id)
            .bind(run.id)
            .bind(account_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            account_runs.push(account_run);
        }

        tx.commit().await?;
        Ok((run, account_runs))
    }

    pub async fn get_run(&self, id: Uuid) -> sqlx::Result<Option<RunRow>> {
        sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_run_scoped(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<RunRow>> {
        sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_runs(&self, workspace_id: Uuid) -> sqlx::Result<Vec<RunRow>> {
        sqlx::query_as::<_, RunRow>(
            "SELECT * FROM runs WHERE workspace_id = ? ORDER BY created_at DESC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_account_run(&self, id: Uuid) -> sqlx::Result<Option<AccountRunRow>> {
        sqlx::query_as::<_, AccountRunRow>("SELECT * FROM account_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn account_runs_for_run(&self, run_id: Uuid) -> sqlx::Result<Vec<AccountRunRow>> {
        sqlx::query_as::<_, AccountRunRow>(
            "SELECT * FROM account_runs WHERE run_id = ? ORDER BY created_at ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Executor entry guard: flip `queued`/`retry_waiting` → `running` and
    /// stamp `started_at`. Exactly one task receipt wins; duplicates see
    /// `false` and return silently.
    pub async fn try_start_account_run(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE account_runs SET status = 'running', started_at = ?
             WHERE id = ? AND status IN ('queued', 'retry_waiting')",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Promote a still-queued parent run to `running`.
    pub async fn mark_run_running(&self, run_id: Uuid, now: DateTime<Utc>) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE runs SET status = 'running', started_at = ?
             WHERE id = ? AND status = 'queued'",
        )
        .bind(now)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finish_account_run(
        &self,
        id: Uuid,
        status: AccountRunStatus,
        error_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE account_runs SET status = ?, error_code = ?, finished_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(error_code)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Roll the parent run up once every sibling is terminal: `failed` when
    /// any account-run failed, else `succeeded`. Returns the new status, or
    /// `None` while siblings are still in flight.
    pub async fn finalize_run_if_done(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<RunStatus>> {
        let mut tx = self.pool.begin().await?;

        let run = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(run) = run else {
            return Ok(None);
        };
        if run.status.is_terminal() {
            return Ok(None);
        }

        let statuses: Vec<AccountRunStatus> =
            sqlx::query_scalar("SELECT status FROM account_runs WHERE run_id = ?")
                .bind(run_id)
                .fetch_all(&mut *tx)
                .await?;

        if statuses.iter().any(|s| !s.is_terminal()) {
            return Ok(None);
        }

        let status = if statuses.iter().any(|s| *s == AccountRunStatus::Failed) {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        sqlx::query("UPDATE runs SET status = ?, finished_at = ? WHERE id = ?")
            .bind(status)
            .bind(now)
            .bind(run_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(status))
    }

    /// Account runs eligible for (re-)enqueueing at boot.
    pub async fn executable_account_run_ids(&self) -> sqlx::Result<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT id FROM account_runs
             WHERE status IN ('queued', 'retry_waiting')
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Store, Uuid, Uuid, Vec<Uuid>) {
        let store = Store::connect_in_memory().await.unwrap();
        let ws = store.create_workspace("acme").await.unwrap();
        let strategy = store
            .create_strategy(ws.id, "s", "x", serde_json::json!({}))
            .await
            .unwrap();
        let mut accounts = Vec::new();
        for handle in ["a", "b"] {
            let account = store
                .create_social_account(ws.id, "x", Some(handle), serde_json::json!({}))
                .await
                .unwrap();
            accounts.push(account.id);
        }
        (store, ws.id, strategy.id, accounts)
    }

    #[tokio::test]
    async fn create_run_materializes_account_runs() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (run, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(account_runs.len(), 2);
        assert!(account_runs
            .iter()
            .all(|ar| ar.status == AccountRunStatus::Queued));
    }

    #[tokio::test]
    async fn entry_guard_admits_once() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (_, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts[..1])
            .await
            .unwrap();
        let id = account_runs[0].id;
        let now = Utc::now();

        assert!(store.try_start_account_run(id, now).await.unwrap());
        assert!(!store.try_start_account_run(id, now).await.unwrap());

        let row = store.get_account_run(id).await.unwrap().unwrap();
        assert_eq!(row.status, AccountRunStatus::Running);
        assert!(row.started_at.is_some());
    }

    #[tokio::test]
    async fn rollup_waits_for_all_siblings() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (run, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts)
            .await
            .unwrap();
        let now = Utc::now();

        store
            .finish_account_run(account_runs[0].id, AccountRunStatus::Succeeded, None, now)
            .await
            .unwrap();
        assert_eq!(store.finalize_run_if_done(run.id, now).await.unwrap(), None);

        store
            .finish_account_run(account_runs[1].id, AccountRunStatus::Succeeded, None, now)
            .await
            .unwrap();
        assert_eq!(
            store.finalize_run_if_done(run.id, now).await.unwrap(),
            Some(RunStatus::Succeeded)
        );
        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn any_failed_sibling_fails_the_run() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (run, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts)
            .await
            .unwrap();
        let now = Utc::now();

        store
            .finish_account_run(account_runs[0].id, AccountRunStatus::Succeeded, None, now)
            .await
            .unwrap();
        store
            .finish_account_run(
                account_runs[1].id,
                AccountRunStatus::Failed,
                Some("AUTH_REQUIRED"),
                now,
            )
            .await
            .unwrap();

        assert_eq!(
            store.finalize_run_if_done(run.id, now).await.unwrap(),
            Some(RunStatus::Failed)
        );
        // Runs never carry an error code; only the boolean state rolls up.
        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn finalize_is_idempotent_on_terminal_runs() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (run, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts[..1])
            .await
            .unwrap();
        let now = Utc::now();
        store
            .finish_account_run(account_runs[0].id, AccountRunStatus::Succeeded, None, now)
            .await
            .unwrap();
        assert!(store.finalize_run_if_done(run.id, now).await.unwrap().is_some());
        assert!(store.finalize_run_if_done(run.id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recovery_lists_queued_and_retry_waiting() {
        let (store, ws, strategy, accounts) = seeded().await;
        let (_, account_runs) = store
            .create_run(ws, None, strategy, None, &accounts)
            .await
            .unwrap();
        let now = Utc::now();
        store.try_start_account_run(account_runs[0].id, now).await.unwrap();

        let ids = store.executable_account_run_ids().await.unwrap();
        assert_eq!(ids, vec![account_runs[1].id]);
    }
}
