//! Artifact retention sweeper.
//!
//! Every ~6 h, workspaces with a positive `artifact_retention_days` get
//! their expired screenshots deleted in batches of 200 — file first
//! (best-effort), then the row.

use chrono::{Duration, Utc};

use crate::state::AppState;

const SWEEP_BATCH: i64 = 200;

pub async fn sweep_artifacts(state: &AppState) -> sqlx::Result<u64> {
    let now = Utc::now();
    let mut deleted = 0u64;

    for (workspace_id, retention_days) in state.store.workspaces_with_retention().await? {
        let cutoff = now - Duration::days(retention_days);
        loop {
            let batch = state
                .store
                .artifacts_older_than(workspace_id, cutoff, SWEEP_BATCH)
                .await?;
            if batch.is_empty() {
                break;
            }
            for artifact in batch {
                let path = state.config.artifacts.dir.join(&artifact.storage_key);
                if let Err(error) = tokio::fs::remove_file(&path).await {
                    if error.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            artifact_id = %artifact.id,
                            path = %path.display(),
                            error = %error,
                            "artifact file removal failed"
                        );
                    }
                }
                state.store.delete_artifact(artifact.id).await?;
                deleted += 1;
            }
        }
    }

    if deleted > 0 {
        tracing::info!(deleted, "artifact retention sweep finished");
    }
    Ok(deleted)
}
