//! Account-run work queue.
//!
//! One queued id per AccountRun; a fixed pool of workers drains the
//! channel. Enqueueing is best-effort — the rows are the source of truth
//! and are re-enqueued at boot — and a per-run concurrency guard caps how
//! many AccountRuns of one Run execute at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::runtime::executor;
use crate::state::AppState;

/// Delay before retrying an id that found its run at the parallelism cap.
const REQUEUE_DELAY: Duration = Duration::from_millis(250);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct RunQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl RunQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Best-effort enqueue; a closed channel only logs (the row survives
    /// and boot recovery will pick it up).
    pub fn enqueue(&self, account_run_id: Uuid) {
        if self.tx.send(account_run_id).is_err() {
            tracing::warn!(
                account_run_id = %account_run_id,
                "run queue closed, dropping enqueue (row remains queued)"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-run concurrency guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tracks in-flight AccountRun counts per Run for parallelism caps.
pub struct ConcurrencyGuard {
    counts: Mutex<HashMap<Uuid, Arc<AtomicU32>>>,
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Try to acquire a slot for `run_id`. Returns `true` if under `max`.
    pub fn try_acquire(&self, run_id: Uuid, max: u32) -> bool {
        let counter = {
            let mut map = self.counts.lock();
            map.entry(run_id)
                .or_insert_with(|| Arc::new(AtomicU32::new(0)))
                .clone()
        };
        loop {
            let current = counter.load(Ordering::SeqCst);
            if current >= max {
                return false;
            }
            if counter
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release(&self, run_id: Uuid) {
        let counter = self.counts.lock().get(&run_id).cloned();
        if let Some(counter) = counter {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn in_flight(&self, run_id: Uuid) -> u32 {
        self.counts
            .lock()
            .get(&run_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Drop counters that reached zero so the map stays bounded.
    pub fn prune_idle(&self) {
        self.counts
            .lock()
            .retain(|_, counter| counter.load(Ordering::SeqCst) > 0);
    }
}

/// `min(schedule cap, subscription cap)`, floored at 1. `None` means the
/// dimension is unbounded.
pub fn effective_parallel_limit(
    schedule_max_parallel: Option<i64>,
    subscription_max_sessions: Option<i64>,
) -> u32 {
    let schedule_cap = schedule_max_parallel.filter(|n| *n > 0).unwrap_or(i64::MAX);
    let quota_cap = subscription_max_sessions
        .filter(|n| *n > 0)
        .unwrap_or(i64::MAX);
    let limit = schedule_cap.min(quota_cap);
    if limit == i64::MAX {
        u32::MAX
    } else {
        limit.clamp(1, u32::MAX as i64) as u32
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn spawn_workers(
    state: AppState,
    rx: mpsc::UnboundedReceiver<Uuid>,
    workers: usize,
) {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let guard = Arc::new(ConcurrencyGuard::new());
    for worker in 0..workers.max(1) {
        let state = state.clone();
        let rx = rx.clone();
        let guard = guard.clone();
        tokio::spawn(async move {
            worker_loop(state, rx, guard, worker).await;
        });
    }
}

async fn worker_loop(
    state: AppState,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Uuid>>>,
    guard: Arc<ConcurrencyGuard>,
    worker: usize,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(account_run_id) = next else {
            tracing::debug!(worker, "run queue closed, worker exiting");
            return;
        };

        let (run_id, limit) = match run_slot_for(&state, account_run_id).await {
            Ok(Some(slot)) => slot,
            Ok(None) => continue,
            Err(error) => {
                tracing::warn!(
                    worker,
                    account_run_id = %account_run_id,
                    error = %error,
                    "failed to resolve account run, dropping"
                );
                continue;
            }
        };

        if !guard.try_acquire(run_id, limit) {
            // At the cap; try again shortly without blocking this worker.
            let queue = state.queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(REQUEUE_DELAY).await;
                queue.enqueue(account_run_id);
            });
            continue;
        }

        if let Err(error) = executor::execute_account_run(&state, account_run_id).await {
            tracing::error!(
                worker,
                account_run_id = %account_run_id,
                error = %error,
                "account run execution errored"
            );
        }
        guard.release(run_id);
        guard.prune_idle();
    }
}

/// Resolve (run id, parallelism cap) for a queued account run. `None` when
/// the row vanished or is no longer executable.
async fn run_slot_for(
    state: &AppState,
    account_run_id: Uuid,
) -> sqlx::Result<Option<(Uuid, u32)>> {
    let Some(account_run) = state.store.get_account_run(account_run_id).await? else {
        return Ok(None);
    };
    if !account_run.status.is_executable() {
        return Ok(None);
    }
    let Some(run) = state.store.get_run(account_run.run_id).await? else {
        return Ok(None);
    };

    let schedule_cap = match run.schedule_id {
        Some(schedule_id) => state
            .store
            .get_schedule(run.workspace_id, schedule_id)
            .await?
            .map(|s| s.max_parallel),
        None => None,
    };
    let quota_cap = state
        .store
        .get_subscription(run.workspace_id)
        .await?
        .and_then(|s| s.max_parallel_sessions);

    Ok(Some((
        run.id,
        effective_parallel_limit(schedule_cap, quota_cap),
    )))
}
