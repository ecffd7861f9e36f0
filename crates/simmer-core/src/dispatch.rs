use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::executor::{RequestExecutor, BODY_BUFFER_BYTES};
use crate::measurement::Measurement;
use crate::util::{should_check_hash, time_to_wait};
use anyhow::Result;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A worker's walk over the destination list: starts at its own offset,
/// steps by `stride`, and wraps back to the offset rather than to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    offset: usize,
    stride: usize,
    pos: usize,
    len: usize,
}

impl Cursor {
    pub fn for_worker(worker: usize, workers: usize, targets: usize) -> Self {
        let targets = targets.max(1);
        let stride = if workers > targets { 1 } else { workers.max(1) };
        let offset = worker % targets;
        Self {
            offset,
            stride,
            pos: offset,
            len: targets,
        }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn advance(&mut self) {
        self.pos += self.stride;
        if self.pos >= self.len {
            self.pos = self.offset;
        }
    }
}

/// Leaves the wait-group when the worker task ends, however it ends.
struct WorkerGuard(Arc<Coordinator>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.worker_done();
    }
}

/// Spawns `cfg.concurrency` paced workers feeding `tx`. Every worker is
/// registered with the coordinator before this returns.
pub fn spawn_workers(
    cfg: &Arc<Config>,
    executor: &Arc<RequestExecutor>,
    coordinator: &Arc<Coordinator>,
    tx: &mpsc::Sender<Measurement>,
) -> Result<Vec<JoinHandle<()>>> {
    let period = time_to_wait(cfg.rate_per_worker)?;
    let workers = cfg.concurrency;
    let mut handles = Vec::with_capacity(workers);

    for worker in 0..workers {
        let cursor = Cursor::for_worker(worker, workers, cfg.targets.len());
        coordinator.worker_started();
        let guard = WorkerGuard(Arc::clone(coordinator));

        let cfg = Arc::clone(cfg);
        let executor = Arc::clone(executor);
        let coordinator = Arc::clone(coordinator);
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let _guard = guard;
            run_worker(worker, cursor, period, cfg, executor, coordinator, tx).await;
        }));
    }

    tracing::debug!(workers, period_ns = period.as_nanos() as u64, "workers spawned");
    Ok(handles)
}

async fn run_worker(
    worker: usize,
    mut cursor: Cursor,
    period: std::time::Duration,
    cfg: Arc<Config>,
    executor: Arc<RequestExecutor>,
    coordinator: Arc<Coordinator>,
    tx: mpsc::Sender<Measurement>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut rng = SmallRng::from_entropy();
    let mut body_buf = Vec::with_capacity(BODY_BUFFER_BYTES);
    let sampling = cfg.hash_sample_rate > 0.0;

    loop {
        ticker.tick().await;
        if coordinator.is_finished() {
            break;
        }

        let check_hash = sampling && should_check_hash(&mut rng, cfg.hash_sample_rate);
        let host = executor.pick_host(&mut rng);
        let req_id = coordinator.next_req_id();
        let target = &cfg.targets[cursor.current()];

        let m = executor
            .execute(target, req_id, host, check_hash, &mut body_buf)
            .await;
        cursor.advance();

        // awaits while the aggregator is behind
        if tx.send(m).await.is_err() {
            break;
        }
    }

    tracing::debug!(worker, "worker stopped");
}
