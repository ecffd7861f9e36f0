use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// State shared by reference between the workers and the aggregator: the
/// finished flag, the global request id counter and a wait-group of live
/// workers.
#[derive(Debug, Default)]
pub struct Coordinator {
    finished: AtomicBool,
    last_req_id: AtomicU64,
    live_workers: AtomicUsize,
    drained: Notify,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next request id, starting at 1. Ids are unique, not delivery-ordered.
    #[inline]
    pub fn next_req_id(&self) -> u64 {
        self.last_req_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Highest id handed out so far, i.e. requests issued.
    #[inline]
    pub fn issued(&self) -> u64 {
        self.last_req_id.load(Ordering::Relaxed)
    }

    /// Asks every worker to stop at its next tick.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn worker_done(&self) {
        if self.live_workers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Resolves once every started worker has called [`worker_done`](Self::worker_done).
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.live_workers() == 0 {
                return;
            }
            notified.await;
        }
    }
}
