//! Credentials and login sessions.
//!
//! Login-session terminal states are enforced here: every transition is a
//! guarded UPDATE whose `WHERE status IN (...)` clause names the states it
//! may leave, so a terminal row can never be re-entered.

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::models::{
    CredentialRow, LoginSessionRow, LoginSessionStatus, CREDENTIAL_TYPE_STORAGE_STATE,
};

use super::Store;

impl Store {
    // ── Credentials ─────────────────────────────────────────────────

    /// Upsert the storage-state credential for an account, stamping
    /// `validated_at`. One row per `(social_account_id, credential_type)`.
    pub async fn upsert_storage_state_credential(
        &self,
        workspace_id: Uuid,
        social_account_id: Uuid,
        encrypted_blob: &[u8],
        key_version: i64,
    ) -> sqlx::Result<CredentialRow> {
        let now = Utc::now();
        sqlx::query_as::<_, CredentialRow>(
            "INSERT INTO credentials
               (id, workspace_id, social_account_id, credential_type, encrypted_blob,
                key_version, validated_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (social_account_id, credential_type) DO UPDATE SET
               encrypted_blob = excluded.encrypted_blob,
               key_version = excluded.key_version,
               validated_at = excluded.validated_at,
               updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(social_account_id)
        .bind(CREDENTIAL_TYPE_STORAGE_STATE)
        .bind(encrypted_blob)
        .bind(key_version)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_storage_state_credential(
        &self,
        workspace_id: Uuid,
        social_account_id: Uuid,
    ) -> sqlx::Result<Option<CredentialRow>> {
        sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM credentials
             WHERE workspace_id = ? AND social_account_id = ? AND credential_type = ?",
        )
        .bind(workspace_id)
        .bind(social_account_id)
        .bind(CREDENTIAL_TYPE_STORAGE_STATE)
        .fetch_optional(&self.pool)
        .await
    }

    // ── Login sessions ──────────────────────────────────────────────

    pub async fn create_login_session(
        &self,
        workspace_id: Uuid,
        social_account_id: Uuid,
        platform_key: &str,
        expires_at: DateTime<Utc>,
        created_by: Option<Uuid>,
    ) -> sqlx::Result<LoginSessionRow> {
        let now = Utc::now();
        sqlx::query_as::<_, LoginSessionRow>(
            "INSERT INTO login_sessions
               (id, workspace_id, social_account_id, platform_key, status,
                expires_at, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'created', ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(social_account_id)
        .bind(platform_key)
        .bind(expires_at)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_login_session(&self, id: Uuid) -> sqlx::Result<Option<LoginSessionRow>> {
        sqlx::query_as::<_, LoginSessionRow>("SELECT * FROM login_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_login_session_scoped(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<LoginSessionRow>> {
        sqlx::query_as::<_, LoginSessionRow>(
            "SELECT * FROM login_sessions WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_login_session_remote_url(
        &self,
        id: Uuid,
        remote_url: Option<&str>,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE login_sessions SET remote_url = ?, updated_at = ? WHERE id = ?")
            .bind(remote_url)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Guarded status transition. Returns `true` when the row moved, i.e.
    /// it was in one of `allowed_from`.
    pub async fn transition_login_session(
        &self,
        id: Uuid,
        to: LoginSessionStatus,
        allowed_from: &[LoginSessionStatus],
    ) -> sqlx::Result<bool> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE login_sessions SET status = ");
        builder.push_bind(to);
        builder.push(", updated_at = ");
        builder.push_bind(Utc::now());
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in allowed_from {
            separated.push_bind(*status);
        }
        builder.push(")");
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Apply TTL expiry: a `created`/`active` session past its deadline
    /// becomes `expired`. Returns `true` when this call expired it.
    pub async fn expire_login_session_if_due(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE login_sessions SET status = 'expired', updated_at = ?
             WHERE id = ? AND status IN ('created', 'active') AND expires_at <= ?",
        )
        .bind(now)
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
