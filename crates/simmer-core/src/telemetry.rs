use std::time::Duration;

pub const REQUESTS: &str = "requests";
pub const SUCCESSES: &str = "successes";
pub const LATENCY_MS: &str = "latency_ms";
pub const LATENCY_US: &str = "latency_us";
pub const LATENCY_NS: &str = "latency_ns";

/// Registers descriptions with whatever recorder is installed. A no-op
/// without one.
pub fn describe() {
    metrics::describe_counter!(REQUESTS, "Number of requests");
    metrics::describe_counter!(SUCCESSES, "Number of successful requests");
    metrics::describe_histogram!(
        LATENCY_MS,
        metrics::Unit::Milliseconds,
        "Request latency of good responses"
    );
    metrics::describe_histogram!(
        LATENCY_US,
        metrics::Unit::Microseconds,
        "Request latency of good responses"
    );
    metrics::describe_histogram!(
        LATENCY_NS,
        metrics::Unit::Nanoseconds,
        "Request latency of good responses"
    );
}

#[inline]
pub fn record_request() {
    metrics::counter!(REQUESTS).increment(1);
}

/// Good response: bumps `successes` and records the latency in all three
/// histograms, each truncated to whole units.
pub fn record_success(latency: Duration) {
    let ns = latency.as_nanos().min(u64::MAX as u128) as u64;
    metrics::counter!(SUCCESSES).increment(1);
    metrics::histogram!(LATENCY_MS).record((ns / 1_000_000) as f64);
    metrics::histogram!(LATENCY_US).record((ns / 1_000) as f64);
    metrics::histogram!(LATENCY_NS).record(ns as f64);
}
