//! Actions (idempotent materialization, result recording) and artifacts.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::models::{ActionRow, ActionRowStatus, ArtifactRow, ARTIFACT_TYPE_SCREENSHOT};

use super::Store;

/// A planned action slot to materialize.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub account_run_id: Uuid,
    pub action_type: String,
    pub platform_key: String,
    pub target_external_id: Option<String>,
    pub target_url: Option<String>,
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
}

impl Store {
    /// Resolve a plan slot to its action row. The `(workspace_id,
    /// idempotency_key)` unique index is the ordering point: the first
    /// writer inserts, every re-entry (including a concurrent one that
    /// loses the insert race) converges on the existing row.
    pub async fn find_or_create_action(
        &self,
        workspace_id: Uuid,
        new: &NewAction,
    ) -> sqlx::Result<ActionRow> {
        if let Some(existing) = self
            .get_action_by_key(workspace_id, &new.idempotency_key)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, ActionRow>(
            "INSERT INTO actions
               (id, workspace_id, account_run_id, action_type, platform_key,
                target_external_id, target_url, idempotency_key, status, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'queued', ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(new.account_run_id)
        .bind(&new.action_type)
        .bind(&new.platform_key)
        .bind(new.target_external_id.as_deref())
        .bind(new.target_url.as_deref())
        .bind(&new.idempotency_key)
        .bind(Json(new.metadata.clone()))
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost the race; the winner's row is authoritative.
                self.get_action_by_key(workspace_id, &new.idempotency_key)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
            Err(other) => Err(other),
        }
    }

    pub async fn get_action_by_key(
        &self,
        workspace_id: Uuid,
        idempotency_key: &str,
    ) -> sqlx::Result<Option<ActionRow>> {
        sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM actions WHERE workspace_id = ? AND idempotency_key = ?",
        )
        .bind(workspace_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_action(&self, workspace_id: Uuid, id: Uuid) -> sqlx::Result<Option<ActionRow>> {
        sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM actions WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn actions_for_account_run(
        &self,
        account_run_id: Uuid,
    ) -> sqlx::Result<Vec<ActionRow>> {
        sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM actions WHERE account_run_id = ? ORDER BY created_at ASC",
        )
        .bind(account_run_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Stamp a shared `started_at` on the batch about to be dispatched.
    pub async fn mark_actions_running(
        &self,
        ids: &[Uuid],
        started_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE actions SET status = 'running', started_at = ");
        builder.push_bind(started_at);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        builder.push(")");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn finish_action(
        &self,
        id: Uuid,
        status: ActionRowStatus,
        error_code: Option<&str>,
        metadata: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE actions SET status = ?, error_code = ?, metadata = ?, finished_at = ?
             WHERE id = ?",
        )
        .bind(status)
        .bind(error_code)
        .bind(Json(metadata))
        .bind(finished_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Artifacts ───────────────────────────────────────────────────

    pub async fn insert_screenshot_artifact(
        &self,
        workspace_id: Uuid,
        action_id: Uuid,
        storage_key: &str,
        size: i64,
    ) -> sqlx::Result<ArtifactRow> {
        sqlx::query_as::<_, ArtifactRow>(
            "INSERT INTO artifacts
               (id, workspace_id, action_id, artifact_type, storage_key, size, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(action_id)
        .bind(ARTIFACT_TYPE_SCREENSHOT)
        .bind(storage_key)
        .bind(size)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_artifact(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<ArtifactRow>> {
        sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Oldest-first page of artifacts past the retention cutoff, for the
    /// sweeper's batched deletes.
    pub async fn artifacts_older_than(
        &self,
        workspace_id: Uuid,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> sqlx::Result<Vec<ArtifactRow>> {
        sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts
             WHERE workspace_id = ? AND created_at < ?
             ORDER BY created_at ASC
             LIMIT ?",
        )
        .bind(workspace_id)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn delete_artifact(&self, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Workspaces that have a positive retention policy configured.
    pub async fn workspaces_with_retention(&self) -> sqlx::Result<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT workspace_id, artifact_retention_days FROM workspace_subscriptions
             WHERE artifact_retention_days IS NOT NULL AND artifact_retention_days > 0",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
