use crate::config::{Config, LatencyUnit};
use crate::stats::{hist_q, LifetimeStats};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat};
use hdrhistogram::Histogram;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// One printed line per reporting interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    pub timestamp: DateTime<Local>,
    pub iteration: u64,
    pub good: u64,
    pub bad: u64,
    pub failed: u64,
    /// Requests expected in one interval at the offered rate.
    pub target: u64,
    pub percent: u64,
    pub interval: Duration,
    pub min: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    pub failed_hash: u64,
    pub trend: &'static str,
}

impl fmt::Display for IntervalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:4} {:6}/{:1}/{:1} {} {:3}% {:?} {:3} [{:3} {:3} {:3} {:4} ] {:4} {:6} {}",
            rfc3339(&self.timestamp),
            self.iteration,
            self.good,
            self.bad,
            self.failed,
            self.target,
            self.percent,
            self.interval,
            self.min,
            self.p50,
            self.p95,
            self.p99,
            self.p999,
            self.max,
            self.failed_hash,
            self.trend,
        )
    }
}

#[inline]
pub fn rfc3339(ts: &DateTime<Local>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Share of the interval goal reached, truncated and capped at 100.
pub fn percent_of_goal(answered: u64, target: u64) -> u64 {
    if target == 0 {
        return if answered == 0 { 0 } else { 100 };
    }
    (answered.saturating_mul(100) / target).min(100)
}

pub fn banner(cfg: &Config) -> String {
    let rps = cfg.offered_rps();
    if cfg.targets.len() == 1 {
        format!(
            "# sending {} {} req/s with concurrency={} to {} ...",
            rps, cfg.method, cfg.concurrency, cfg.targets[0]
        )
    } else {
        let list: Vec<&str> = cfg.targets.iter().map(|u| u.as_str()).collect();
        format!(
            "# sending {} {} req/s with concurrency={} using url list [{}] ...",
            rps,
            cfg.method,
            cfg.concurrency,
            list.join(" ")
        )
    }
}

/// Column header, padded so the labels sit above the timestamp and interval
/// columns of [`IntervalReport`].
pub fn header(interval: Duration) -> String {
    let time_len = rfc3339(&Local::now()).len();
    let int_len = format!("{interval:?}").len();
    format!(
        "# {} iter   good/b/f t   goal% {} min [p50 p95 p99  p999]  max bhash change",
        " ".repeat(time_len.saturating_sub(2)),
        " ".repeat(int_len.saturating_sub(2)),
    )
}

// ---------------- lifetime summary ----------------

const SUMMARY_QUANTILES: [(&str, f64); 7] = [
    ("p50", 0.50),
    ("p75", 0.75),
    ("p90", 0.90),
    ("p95", 0.95),
    ("p99", 0.99),
    ("p999", 0.999),
    ("p9999", 0.9999),
];

/// Run totals, hash-check failures and the lifetime latency distribution.
pub fn write_latency_summary<W: Write>(
    w: &mut W,
    life: &LifetimeStats,
    unit: LatencyUnit,
) -> std::io::Result<()> {
    let hist = &life.lat;
    let min = if hist.len() == 0 { 0 } else { hist.min() };
    let max = if hist.len() == 0 { 0 } else { hist.max() };

    writeln!(
        w,
        "requests: {} good: {} bad: {} failed: {} bad hash: {}",
        life.requests, life.good, life.bad, life.failed, life.failed_hash
    )?;
    writeln!(w, "latency summary ({unit}):")?;
    writeln!(w, "  {:<6} {}", "min", min)?;
    for (label, q) in SUMMARY_QUANTILES {
        writeln!(w, "  {:<6} {}", label, hist_q(hist, q))?;
    }
    writeln!(w, "  {:<6} {}", "max", max)?;
    writeln!(w, "  {:<6} {}", "count", hist.len())?;
    Ok(())
}

pub fn print_latency_summary(life: &LifetimeStats, unit: LatencyUnit) {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    if let Err(e) = write_latency_summary(&mut lock, life, unit) {
        tracing::warn!(error = %e, "failed to print latency summary");
    }
}

// ---------------- csv ----------------

/// One row per recorded bucket:
/// `latency_from,latency_to,count,cumulative_percentile`.
pub fn write_latency_csv_rows<W: Write>(w: &mut W, hist: &Histogram<u64>) -> std::io::Result<()> {
    writeln!(w, "latency_from,latency_to,count,cumulative_percentile")?;
    for v in hist.iter_recorded() {
        let at = v.value_iterated_to();
        writeln!(
            w,
            "{},{},{},{:.6}",
            hist.lowest_equivalent(at),
            hist.highest_equivalent(at),
            v.count_at_value(),
            v.percentile(),
        )?;
    }
    Ok(())
}

pub fn write_latency_csv(path: &Path, hist: &Histogram<u64>) -> Result<()> {
    let f = std::fs::File::create(path)
        .with_context(|| format!("create latency csv: {}", path.display()))?;
    let mut w = BufWriter::new(f);
    write_latency_csv_rows(&mut w, hist)
        .and_then(|_| w.flush())
        .with_context(|| format!("write latency csv: {}", path.display()))?;
    tracing::info!(path = %path.display(), "latency csv written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::RespInfo;
    use crate::stats::latency_histogram;
    use chrono::TimeZone;
    use http::StatusCode;
    use reqwest::Url;

    fn sample_report() -> IntervalReport {
        IntervalReport {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            iteration: 3,
            good: 20,
            bad: 0,
            failed: 1,
            target: 20,
            percent: 100,
            interval: Duration::from_secs(10),
            min: 5,
            p50: 5,
            p95: 6,
            p99: 7,
            p999: 7,
            max: 9,
            failed_hash: 0,
            trend: "+",
        }
    }

    #[test]
    fn test_report_line_layout() {
        let r = sample_report();
        let line = r.to_string();
        let ts = rfc3339(&r.timestamp);
        assert_eq!(
            line,
            format!("{ts}    3     20/0/1 20 100% 10s   5 [  5   6   7    7 ]    9      0 +")
        );
    }

    #[test]
    fn test_header_aligns_with_line() {
        let h = header(Duration::from_secs(10));
        assert!(h.starts_with("# "));
        let line = IntervalReport {
            timestamp: Local::now(),
            ..sample_report()
        }
        .to_string();
        // "iter" ends where the right-aligned iteration column ends
        let iter_end = h.find("iter").unwrap() + 4;
        assert_eq!(&line[iter_end - 1..iter_end], "3");
    }

    #[test]
    fn test_percent_of_goal() {
        assert_eq!(percent_of_goal(0, 20), 0);
        assert_eq!(percent_of_goal(19, 20), 95);
        assert_eq!(percent_of_goal(20, 20), 100);
        assert_eq!(percent_of_goal(45, 20), 100);
        assert_eq!(percent_of_goal(1, 3), 33);
        assert_eq!(percent_of_goal(0, 0), 0);
        assert_eq!(percent_of_goal(5, 0), 100);
    }

    #[test]
    fn test_banner() {
        let cfg = Config {
            rate_per_worker: 10,
            concurrency: 2,
            targets: vec![Url::parse("http://localhost:8080/").unwrap()],
            ..Default::default()
        };
        assert_eq!(
            banner(&cfg),
            "# sending 20 POST req/s with concurrency=2 to http://localhost:8080/ ..."
        );

        let cfg = Config {
            targets: vec![
                Url::parse("http://a/").unwrap(),
                Url::parse("http://b/").unwrap(),
            ],
            method: http::Method::GET,
            ..cfg
        };
        assert_eq!(
            banner(&cfg),
            "# sending 20 GET req/s with concurrency=2 using url list [http://a/ http://b/] ..."
        );
    }

    #[test]
    fn test_summary_lists_every_quantile() {
        let mut life = LifetimeStats::new(LatencyUnit::Millis).unwrap();
        for v in [1u64, 2, 3, 4, 100] {
            life.lat.record(v).unwrap();
        }
        let mut out = Vec::new();
        write_latency_summary(&mut out, &life, LatencyUnit::Millis).unwrap();
        let text = String::from_utf8(out).unwrap();
        for label in ["min", "p50", "p75", "p90", "p95", "p99", "p999", "p9999", "max", "count"] {
            assert!(text.contains(&format!("  {label:<6} ")), "missing {label}: {text}");
        }
        assert!(text.contains("  min    1\n"));
        assert!(text.contains("  max    100\n"));
        assert!(text.contains("  count  5\n"));
    }

    #[test]
    fn test_summary_reports_totals_and_hash_failures() {
        let resp = |code: u16, failed_hash_check| RespInfo {
            status: StatusCode::from_u16(code).unwrap(),
            bytes: 5,
            latency: Duration::from_millis(3),
            failed_hash_check,
        };
        let mut life = LifetimeStats::new(LatencyUnit::Millis).unwrap();
        life.record_response(&resp(200, false), 3);
        life.record_response(&resp(200, true), 4);
        life.record_response(&resp(200, true), 5);
        life.record_response(&resp(503, false), 6);
        life.record_failure();

        let mut out = Vec::new();
        write_latency_summary(&mut out, &life, LatencyUnit::Millis).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("requests: 5 good: 3 bad: 1 failed: 1 bad hash: 2")
        );
        assert!(text.contains("  count  4\n"));
    }

    #[test]
    fn test_csv_rows() {
        let mut h = latency_histogram(LatencyUnit::Millis).unwrap();
        h.record_n(5, 3).unwrap();
        h.record(7).unwrap();

        let mut out = Vec::new();
        write_latency_csv_rows(&mut out, &h).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "latency_from,latency_to,count,cumulative_percentile");
        assert_eq!(lines[1], "5,5,3,75.000000");
        assert_eq!(lines[2], "7,7,1,100.000000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_to_unwritable_path_fails() {
        let h = latency_histogram(LatencyUnit::Millis).unwrap();
        let err = write_latency_csv(Path::new("/nonexistent-dir/x/latency.csv"), &h);
        assert!(err.is_err());
    }
}
