//! Tick dispatcher — evaluates due schedules every ~30 s, materializes
//! runs, and enqueues their account runs.
//!
//! Double-fire protection across replicas is a compare-and-set claim on
//! the observed `next_run_at`: the replica whose UPDATE matches wins the
//! fire, everyone else sees zero rows and moves on.

use chrono::Utc;

use orb_storage::models::ScheduleRow;

use crate::runtime::planner::{next_fire, should_skip};
use crate::state::AppState;

pub async fn tick(state: &AppState) -> sqlx::Result<()> {
    let store = &state.store;
    let now = Utc::now();

    // Freshly enabled schedules get their first fire time planned here.
    for schedule in store.schedules_missing_next_run().await? {
        let next = plan_next(&schedule);
        store.set_schedule_next_run(schedule.id, next).await?;
        tracing::debug!(schedule_id = %schedule.id, next_run_at = ?next, "planned first fire");
    }

    for schedule in store.due_schedules(now).await? {
        let Some(observed) = schedule.next_run_at else {
            continue;
        };

        // Back-pressure: a schedule with a non-terminal run does not
        // stack another one, and keeps its (stale) fire time so the next
        // tick re-evaluates.
        if store.has_active_run(schedule.id).await? {
            tracing::debug!(schedule_id = %schedule.id, "run in flight, skipping fire");
            continue;
        }

        let next = plan_next(&schedule);
        let strategy = store.get_strategy(schedule.strategy_id).await?;

        let Some(strategy) = strategy else {
            // Dangling strategy: stamp and advance so it doesn't spin.
            store
                .claim_due_schedule(schedule.id, observed, now, next)
                .await?;
            tracing::warn!(schedule_id = %schedule.id, "strategy missing, advancing schedule");
            continue;
        };

        if should_skip(&schedule.random_config.0) {
            store
                .claim_due_schedule(schedule.id, observed, now, next)
                .await?;
            tracing::info!(schedule_id = %schedule.id, "randomly skipped this fire");
            continue;
        }

        // Claim before materializing; a lost claim means another replica
        // owns this fire.
        if !store
            .claim_due_schedule(schedule.id, observed, now, next)
            .await?
        {
            continue;
        }

        let accounts = store
            .resolve_account_selector(schedule.workspace_id, &schedule.account_selector.0)
            .await?;
        let account_ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
        let (run, account_runs) = store
            .create_run(
                schedule.workspace_id,
                Some(schedule.id),
                strategy.id,
                None,
                &account_ids,
            )
            .await?;
        tracing::info!(
            schedule_id = %schedule.id,
            run_id = %run.id,
            accounts = account_runs.len(),
            "schedule fired"
        );

        for account_run in &account_runs {
            state.queue.enqueue(account_run.id);
        }
    }

    Ok(())
}

fn plan_next(schedule: &ScheduleRow) -> Option<chrono::DateTime<Utc>> {
    next_fire(
        schedule.frequency,
        &schedule.schedule_spec.0,
        &schedule.random_config.0,
        Utc::now(),
    )
}
