//! Social accounts: creation, selector resolution, health flips.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::models::{AccountStatus, SocialAccountRow};

use super::Store;

impl Store {
    pub async fn create_social_account(
        &self,
        workspace_id: Uuid,
        platform_key: &str,
        handle: Option<&str>,
        fingerprint_profile: serde_json::Value,
    ) -> sqlx::Result<SocialAccountRow> {
        let now = Utc::now();
        sqlx::query_as::<_, SocialAccountRow>(
            "INSERT INTO social_accounts
               (id, workspace_id, platform_key, handle, status, labels,
                fingerprint_profile, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'needs_login', '{}', ?, ?, ?)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(platform_key)
        .bind(handle)
        .bind(Json(fingerprint_profile))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_social_account(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> sqlx::Result<Option<SocialAccountRow>> {
        sqlx::query_as::<_, SocialAccountRow>(
            "SELECT * FROM social_accounts WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_social_accounts(
        &self,
        workspace_id: Uuid,
    ) -> sqlx::Result<Vec<SocialAccountRow>> {
        sqlx::query_as::<_, SocialAccountRow>(
            "SELECT * FROM social_accounts WHERE workspace_id = ? ORDER BY created_at ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Resolve a schedule's `account_selector` map:
    /// explicit `ids` → those accounts (workspace-scoped);
    /// `all: true` → every account;
    /// default → all `healthy` accounts.
    pub async fn resolve_account_selector(
        &self,
        workspace_id: Uuid,
        selector: &serde_json::Value,
    ) -> sqlx::Result<Vec<SocialAccountRow>> {
        let ids: Vec<Uuid> = selector
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .filter_map(|raw| Uuid::parse_str(raw).ok())
                    .collect()
            })
            .unwrap_or_default();

        if !ids.is_empty() {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("SELECT * FROM social_accounts WHERE workspace_id = ");
            builder.push_bind(workspace_id);
            builder.push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for id in &ids {
                separated.push_bind(*id);
            }
            builder.push(") ORDER BY created_at ASC");
            return builder
                .build_query_as::<SocialAccountRow>()
                .fetch_all(&self.pool)
                .await;
        }

        if selector.get("all").and_then(|v| v.as_bool()) == Some(true) {
            return self.list_social_accounts(workspace_id).await;
        }

        sqlx::query_as::<_, SocialAccountRow>(
            "SELECT * FROM social_accounts
             WHERE workspace_id = ? AND status = 'healthy'
             ORDER BY created_at ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn set_account_status(
        &self,
        id: Uuid,
        status: AccountStatus,
        last_health_check_at: Option<DateTime<Utc>>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE social_accounts
             SET status = ?,
                 last_health_check_at = COALESCE(?, last_health_check_at),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(status)
        .bind(last_health_check_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Store, Uuid) {
        let store = Store::connect_in_memory().await.unwrap();
        let ws = store.create_workspace("acme").await.unwrap();
        (store, ws.id)
    }

    #[tokio::test]
    async fn new_accounts_need_login() {
        let (store, ws) = seeded().await;
        let account = store
            .create_social_account(ws, "x", Some("@acme"), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(account.status, AccountStatus::NeedsLogin);
        assert_eq!(account.handle.as_deref(), Some("@acme"));
    }

    #[tokio::test]
    async fn selector_default_picks_healthy_only() {
        let (store, ws) = seeded().await;
        let a = store
            .create_social_account(ws, "x", Some("a"), serde_json::json!({}))
            .await
            .unwrap();
        let _b = store
            .create_social_account(ws, "x", Some("b"), serde_json::json!({}))
            .await
            .unwrap();
        store
            .set_account_status(a.id, AccountStatus::Healthy, Some(Utc::now()))
            .await
            .unwrap();

        let resolved = store
            .resolve_account_selector(ws, &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, a.id);
    }

    #[tokio::test]
    async fn selector_all_picks_everything() {
        let (store, ws) = seeded().await;
        for handle in ["a", "b", "c"] {
            store
                .create_social_account(ws, "x", Some(handle), serde_json::json!({}))
                .await
                .unwrap();
        }
        let resolved = store
            .resolve_account_selector(ws, &serde_json::json!({"all": true}))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 3);
    }

    #[tokio::test]
    async fn selector_ids_scoped_to_workspace() {
        let (store, ws) = seeded().await;
        let other_ws = store.create_workspace("intruder").await.unwrap();
        let mine = store
            .create_social_account(ws, "x", Some("mine"), serde_json::json!({}))
            .await
            .unwrap();
        let theirs = store
            .create_social_account(other_ws.id, "x", Some("theirs"), serde_json::json!({}))
            .await
            .unwrap();

        let selector = serde_json::json!({
            "ids": [mine.id.to_string(), theirs.id.to_string(), "not-a-uuid"]
        });
        let resolved = store.resolve_account_selector(ws, &selector).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, mine.id);
    }

    #[tokio::test]
    async fn status_flip_stamps_health_check() {
        let (store, ws) = seeded().await;
        let account = store
            .create_social_account(ws, "x", None, serde_json::json!({}))
            .await
            .unwrap();
        let stamp = Utc::now();
        store
            .set_account_status(account.id, AccountStatus::Healthy, Some(stamp))
            .await
            .unwrap();
        let fetched = store.get_social_account(ws, account.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AccountStatus::Healthy);
        assert!(fetched.last_health_check_at.is_some());
    }
}
