use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::measurement::{Measurement, Outcome};
use crate::report::{self, IntervalReport};
use crate::stats::{hist_q, IntervalStats, LifetimeStats};
use crate::telemetry;
use crate::trend::TrendWindow;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// What a finished run leaves behind.
pub struct RunSummary {
    /// Reporting intervals completed.
    pub iterations: u64,
    pub last_report: Option<IntervalReport>,
    pub lifetime: LifetimeStats,
    /// Request ids handed out.
    pub issued: u64,
    /// Measurements that arrived after shutdown began.
    pub discarded: u64,
    pub interrupted: bool,
}

/// Single consumer of the measurement channel. Owns all counters and
/// histograms, so nothing here is shared.
pub struct Aggregator {
    cfg: Arc<Config>,
    coordinator: Arc<Coordinator>,
    interval: IntervalStats,
    lifetime: LifetimeStats,
    trend: TrendWindow,
    iteration: u64,
    last_report: Option<IntervalReport>,
}

impl Aggregator {
    pub fn new(cfg: Arc<Config>, coordinator: Arc<Coordinator>) -> Result<Self> {
        let unit = cfg.latency_unit;
        Ok(Self {
            cfg,
            coordinator,
            interval: IntervalStats::new(unit)?,
            lifetime: LifetimeStats::new(unit)?,
            trend: TrendWindow::default(),
            iteration: 0,
            last_report: None,
        })
    }

    pub fn on_measurement(&mut self, m: Measurement) {
        telemetry::record_request();
        match m.outcome {
            Outcome::Failed(e) => {
                tracing::warn!(req_id = m.req_id, error = %format!("{e:#}"), "request failed");
                self.interval.record_failure();
                self.lifetime.record_failure();
            }
            Outcome::Response(info) => {
                if info.is_good() {
                    telemetry::record_success(info.latency);
                }
                let latency = self.cfg.latency_unit.convert(info.latency);
                self.interval.record_response(&info, latency);
                self.lifetime.record_response(&info, latency);
            }
        }
    }

    /// Closes the current interval: builds its report, feeds p99 to the
    /// trend window and resets the interval counters.
    pub fn on_tick(&mut self, now: DateTime<Local>) -> IntervalReport {
        let s = &self.interval;
        let target = self.cfg.interval_target();
        let p99 = hist_q(&s.lat, 0.99);
        let trend = self
            .trend
            .observe(i64::try_from(p99).unwrap_or(i64::MAX));

        let report = IntervalReport {
            timestamp: now,
            iteration: self.iteration,
            good: s.good,
            bad: s.bad,
            failed: s.failed,
            target,
            percent: report::percent_of_goal(s.good + s.bad, target),
            interval: self.cfg.interval,
            min: s.min(),
            p50: hist_q(&s.lat, 0.50),
            p95: hist_q(&s.lat, 0.95),
            p99,
            p999: hist_q(&s.lat, 0.999),
            max: s.max(),
            failed_hash: s.failed_hash,
            trend,
        };

        tracing::debug!(
            iteration = self.iteration,
            requests = s.requests,
            bytes = s.bytes,
            "interval closed"
        );

        self.interval.reset();
        self.iteration += 1;
        self.last_report = Some(report.clone());
        report
    }

    /// Iteration cap reached, or more request ids issued than allowed.
    pub fn cap_reached(&self) -> bool {
        if self.cfg.iterations.is_some_and(|n| self.iteration >= n) {
            return true;
        }
        self.cfg
            .total_requests
            .is_some_and(|cap| self.coordinator.issued() > cap)
    }

    /// Reduces measurements until `interrupt` resolves, a cap is reached or
    /// every sender is gone, then shuts the run down.
    pub async fn run<F>(mut self, mut rx: mpsc::Receiver<Measurement>, interrupt: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let period = self.cfg.interval;
        let tick = sleep_until(Instant::now() + period);
        tokio::pin!(tick);
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;

                _ = &mut interrupt => {
                    tracing::info!("interrupted, shutting down");
                    interrupted = true;
                    break;
                }
                _ = &mut tick => {
                    let report = self.on_tick(Local::now());
                    println!("{report}");
                    if self.cap_reached() {
                        tracing::debug!(iteration = self.iteration, "cap reached");
                        break;
                    }
                    tick.as_mut().reset(Instant::now() + period);
                }
                m = rx.recv() => match m {
                    Some(m) => self.on_measurement(m),
                    None => {
                        tracing::warn!("all workers exited");
                        break;
                    }
                },
            }
        }

        self.finish(rx, interrupted).await
    }

    async fn finish(self, mut rx: mpsc::Receiver<Measurement>, interrupted: bool) -> Result<RunSummary> {
        self.coordinator.finish();

        if self.cfg.latency_summary {
            report::print_latency_summary(&self.lifetime, self.cfg.latency_unit);
        }
        let csv = match self.cfg.latency_csv.as_deref() {
            Some(path) => report::write_latency_csv(path, &self.lifetime.lat),
            None => Ok(()),
        };

        // workers blocked on send need a reader until the last one leaves
        let discarded = drain(&self.coordinator, &mut rx).await;
        tracing::debug!(discarded, "workers drained");
        csv?;

        Ok(RunSummary {
            iterations: self.iteration,
            last_report: self.last_report,
            lifetime: self.lifetime,
            issued: self.coordinator.issued(),
            discarded,
            interrupted,
        })
    }
}

async fn drain(coordinator: &Coordinator, rx: &mut mpsc::Receiver<Measurement>) -> u64 {
    let mut discarded = 0u64;
    loop {
        tokio::select! {
            biased;

            _ = coordinator.drained() => break,
            m = rx.recv() => match m {
                Some(_) => discarded += 1,
                None => break,
            },
        }
    }
    discarded
}
