pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod executor;
pub mod measurement;
pub mod report;
mod ring_buf;
pub mod stats;
pub mod telemetry;
pub mod trend;
pub mod util;

pub use aggregator::RunSummary;
pub use config::{Config, LatencyUnit};

use aggregator::Aggregator;
use anyhow::Result;
use coordinator::Coordinator;
use executor::RequestExecutor;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Workers hand measurements over one at a time; a full channel holds the
/// sender back until the aggregator catches up.
pub const MEASUREMENT_CHANNEL_CAP: usize = 1;

/// Runs a load test to completion: until an iteration or request cap is hit
/// or `interrupt` resolves. Interval lines and the lifetime summary go to
/// stdout; returns once every worker has stopped.
pub async fn run<F>(cfg: Config, interrupt: F) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    cfg.validate()?;
    telemetry::describe();

    let cfg = Arc::new(cfg);
    let executor = Arc::new(RequestExecutor::new(&cfg)?);
    let coordinator = Arc::new(Coordinator::new());
    let aggregator = Aggregator::new(Arc::clone(&cfg), Arc::clone(&coordinator))?;

    let (tx, rx) = mpsc::channel(MEASUREMENT_CHANNEL_CAP);
    let handles = dispatch::spawn_workers(&cfg, &executor, &coordinator, &tx)?;
    drop(tx);

    tracing::info!(
        workers = cfg.concurrency,
        rps = cfg.offered_rps(),
        targets = cfg.targets.len(),
        "load started"
    );

    let summary = aggregator.run(rx, interrupt).await;

    for h in handles {
        if let Err(e) = h.await {
            tracing::error!(error = %e, "worker task failed");
        }
    }
    summary
}
