use anyhow::{ensure, Result};
use bytes::Bytes;
use http::{HeaderMap, Method};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Granularity of every latency value the engine records and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyUnit {
    #[default]
    Millis,
    Micros,
    Nanos,
}

impl LatencyUnit {
    #[inline]
    pub fn nanos_per_unit(self) -> u64 {
        match self {
            LatencyUnit::Millis => 1_000_000,
            LatencyUnit::Micros => 1_000,
            LatencyUnit::Nanos => 1,
        }
    }

    /// Truncating conversion of a latency into this unit.
    #[inline]
    pub fn convert(self, latency: Duration) -> u64 {
        let ns = latency.as_nanos().min(u64::MAX as u128) as u64;
        ns / self.nanos_per_unit()
    }

    /// Number of units in 24 hours, the upper bound of the latency histograms.
    #[inline]
    pub fn units_per_day(self) -> u64 {
        24 * 3600 * 1_000_000_000 / self.nanos_per_unit()
    }
}

impl fmt::Display for LatencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatencyUnit::Millis => write!(f, "ms"),
            LatencyUnit::Micros => write!(f, "us"),
            LatencyUnit::Nanos => write!(f, "ns"),
        }
    }
}

/// Run configuration. Built once by the front end and shared read-only with
/// every worker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Requests per second issued by each worker.
    pub rate_per_worker: u64,
    /// Number of workers.
    pub concurrency: usize,
    pub targets: Vec<Url>,

    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Host header overrides; one is picked at random per request. Empty keeps the URL host.
    pub hosts: Vec<String>,

    pub timeout: Duration,
    pub interval: Duration,
    /// Stop after this many reporting intervals.
    pub iterations: Option<u64>,
    /// Stop once more than this many requests have been issued.
    pub total_requests: Option<u64>,

    pub latency_unit: LatencyUnit,

    /// Expected FNV-1a 64 hash of every response body.
    pub hash_value: u64,
    /// Probability that a response body is hashed and checked.
    pub hash_sample_rate: f64,

    pub no_reuse: bool,
    pub compress: bool,

    pub latency_summary: bool,
    pub latency_csv: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_per_worker: 1,
            concurrency: 1,
            targets: Vec::new(),
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            hosts: Vec::new(),
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            iterations: None,
            total_requests: None,
            latency_unit: LatencyUnit::Millis,
            hash_value: 0,
            hash_sample_rate: 0.0,
            no_reuse: false,
            compress: false,
            latency_summary: true,
            latency_csv: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.rate_per_worker >= 1, "qps must be at least 1");
        ensure!(
            self.rate_per_worker <= 1_000_000_000,
            "qps must be at most one request per nanosecond"
        );
        ensure!(self.concurrency >= 1, "concurrency must be at least 1");
        ensure!(!self.targets.is_empty(), "at least one target url is required");
        ensure!(!self.interval.is_zero(), "reporting interval must be positive");
        ensure!(!self.timeout.is_zero(), "request timeout must be positive");
        ensure!(
            !self.hash_sample_rate.is_nan(),
            "hash sample rate must be a number"
        );
        Ok(())
    }

    /// Offered load across all workers, in requests per second.
    #[inline]
    pub fn offered_rps(&self) -> u64 {
        self.rate_per_worker.saturating_mul(self.concurrency as u64)
    }

    /// Requests expected within one reporting interval at the offered rate.
    pub fn interval_target(&self) -> u64 {
        (self.offered_rps() as f64 * self.interval.as_secs_f64()) as u64
    }
}
