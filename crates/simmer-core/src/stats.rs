use crate::config::LatencyUnit;
use crate::measurement::RespInfo;
use anyhow::{Context, Result};
use hdrhistogram::Histogram;

/// Latency histogram covering 24 hours in `unit`, 3 significant digits.
pub fn latency_histogram(unit: LatencyUnit) -> Result<Histogram<u64>> {
    Histogram::new_with_bounds(1, unit.units_per_day(), 3)
        .with_context(|| format!("create latency histogram ({unit})"))
}

#[inline]
pub fn hist_q(hist: &Histogram<u64>, q: f64) -> u64 {
    if hist.len() == 0 {
        0
    } else {
        hist.value_at_quantile(q)
    }
}

// ---------------- per-interval ----------------

/// Counters and histogram for the current reporting interval.
pub struct IntervalStats {
    pub requests: u64,
    pub bytes: u64,
    pub good: u64,
    pub bad: u64,
    pub failed: u64,
    pub failed_hash: u64,

    min: u64,
    max: u64,

    pub lat: Histogram<u64>,
}

impl IntervalStats {
    pub fn new(unit: LatencyUnit) -> Result<Self> {
        Ok(Self {
            requests: 0,
            bytes: 0,
            good: 0,
            bad: 0,
            failed: 0,
            failed_hash: 0,
            min: u64::MAX,
            max: 0,
            lat: latency_histogram(unit)?,
        })
    }

    pub fn record_failure(&mut self) {
        self.requests += 1;
        self.failed += 1;
    }

    /// Records a response whose latency is already converted to the unit.
    pub fn record_response(&mut self, info: &RespInfo, latency: u64) {
        self.requests += 1;
        self.bytes += info.bytes;
        if info.failed_hash_check {
            self.failed_hash += 1;
        }
        if info.is_good() {
            self.good += 1;
        } else {
            self.bad += 1;
        }
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
        self.lat.saturating_record(latency);
    }

    /// Smallest latency seen, 0 when nothing was recorded.
    #[inline]
    pub fn min(&self) -> u64 {
        if self.min == u64::MAX {
            0
        } else {
            self.min
        }
    }

    #[inline]
    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn reset(&mut self) {
        self.requests = 0;
        self.bytes = 0;
        self.good = 0;
        self.bad = 0;
        self.failed = 0;
        self.failed_hash = 0;
        self.min = u64::MAX;
        self.max = 0;
        self.lat.reset();
    }
}

// ---------------- lifetime ----------------

/// Totals for the whole run; never reset.
pub struct LifetimeStats {
    pub requests: u64,
    pub bytes: u64,
    pub good: u64,
    pub bad: u64,
    pub failed: u64,
    pub failed_hash: u64,

    pub lat: Histogram<u64>,
}

impl LifetimeStats {
    pub fn new(unit: LatencyUnit) -> Result<Self> {
        Ok(Self {
            requests: 0,
            bytes: 0,
            good: 0,
            bad: 0,
            failed: 0,
            failed_hash: 0,
            lat: latency_histogram(unit)?,
        })
    }

    pub fn record_failure(&mut self) {
        self.requests += 1;
        self.failed += 1;
    }

    pub fn record_response(&mut self, info: &RespInfo, latency: u64) {
        self.requests += 1;
        self.bytes += info.bytes;
        if info.failed_hash_check {
            self.failed_hash += 1;
        }
        if info.is_good() {
            self.good += 1;
        } else {
            self.bad += 1;
        }
        self.lat.saturating_record(latency);
    }
}
