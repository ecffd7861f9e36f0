use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use reqwest::Url;
use simmer_core::{Config, LatencyUnit};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Closed-loop HTTP load generator")]
pub struct Args {
    /// Target url, or @file / @- for a newline-separated list of urls
    #[arg(value_name = "URL")]
    pub target: String,

    /// Requests per second sent by each worker
    #[arg(long, default_value_t = 1)]
    pub qps: u64,

    /// Number of workers
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Reporting intervals to run (0 for infinite)
    #[arg(long, default_value_t = 0)]
    pub iterations: u64,

    /// Host header overrides, comma separated; one is picked per request
    #[arg(long, default_value = "")]
    pub host: String,

    #[arg(long, default_value = "POST")]
    pub method: String,

    /// Reporting interval
    #[arg(long, default_value_t = 10_000)]
    pub interval_ms: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Don't reuse connections
    #[arg(long, default_value_t = false)]
    pub noreuse: bool,

    /// Ask for gzip-compressed responses
    #[arg(long, default_value_t = false)]
    pub compress: bool,

    /// Suppress the final latency summary
    #[arg(long, default_value_t = false)]
    pub no_latency_summary: bool,

    /// Write the lifetime latency histogram to this CSV file on exit
    #[arg(long, value_name = "PATH")]
    pub report_latencies_csv: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Unit::Ms)]
    pub latency_unit: Unit,

    /// Stop once this many requests were sent (0 for no cap)
    #[arg(long, default_value_t = 0)]
    pub total_requests: u64,

    /// Request headers, e.g. "Content-Type: application/json, X-Trace: 1"
    #[arg(long, default_value = "")]
    pub headers: String,

    /// Request body: literal text, @file or @- for stdin
    #[arg(long, default_value = "")]
    pub data: String,

    /// Serve Prometheus metrics on this address
    #[arg(long, value_name = "HOST:PORT")]
    pub metric_addr: Option<SocketAddr>,

    /// Expected FNV-1a 64 hash of response bodies
    #[arg(long, default_value_t = 0)]
    pub hash_value: u64,

    /// Share of responses whose body hash is checked, in [0.0, 1.0]
    #[arg(long, default_value_t = 0.0)]
    pub hash_sample_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Unit {
    Ms,
    Us,
    Ns,
}

impl From<Unit> for LatencyUnit {
    fn from(u: Unit) -> Self {
        match u {
            Unit::Ms => LatencyUnit::Millis,
            Unit::Us => LatencyUnit::Micros,
            Unit::Ns => LatencyUnit::Nanos,
        }
    }
}

impl Args {
    pub fn into_config(self) -> Result<Config> {
        let cfg = Config {
            rate_per_worker: self.qps,
            concurrency: self.concurrency,
            targets: load_targets(&self.target)?,
            method: Method::from_bytes(self.method.as_bytes())
                .with_context(|| format!("invalid method: {}", self.method))?,
            headers: parse_headers(&self.headers)?,
            body: load_payload(&self.data)?,
            hosts: parse_hosts(&self.host),
            timeout: Duration::from_millis(self.timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
            iterations: (self.iterations > 0).then_some(self.iterations),
            total_requests: (self.total_requests > 0).then_some(self.total_requests),
            latency_unit: self.latency_unit.into(),
            hash_value: self.hash_value,
            hash_sample_rate: self.hash_sample_rate,
            no_reuse: self.noreuse,
            compress: self.compress,
            latency_summary: !self.no_latency_summary,
            latency_csv: self.report_latencies_csv,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// `"K: V, K2: V2"` into a header map. Pairs without a name or a colon are
/// skipped; a repeated name keeps the last value.
pub fn parse_headers(text: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for pair in text.split(',') {
        let Some((name, value)) = pair.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header {name}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn parse_hosts(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// Literal text, or the contents of `@file` / `@-` (stdin).
fn read_source(arg: &str) -> Result<Option<Vec<u8>>> {
    let Some(path) = arg.strip_prefix('@') else {
        return Ok(None);
    };
    let mut buf = Vec::new();
    if path == "-" {
        std::io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("read stdin")?;
    } else {
        buf = std::fs::read(path).with_context(|| format!("read {path}"))?;
    }
    Ok(Some(buf))
}

pub fn load_payload(data: &str) -> Result<Bytes> {
    Ok(match read_source(data)? {
        Some(buf) => Bytes::from(buf),
        None => Bytes::copy_from_slice(data.as_bytes()),
    })
}

/// One url, or one per line from `@file` / `@-`. Blank lines are skipped;
/// every url needs a scheme and a host.
pub fn load_targets(target: &str) -> Result<Vec<Url>> {
    let text = match read_source(target)? {
        Some(buf) => String::from_utf8(buf).context("url list is not utf-8")?,
        None => target.to_string(),
    };

    let mut urls = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let url = Url::parse(line)
            .with_context(|| format!("invalid URL on line {}: '{line}'", i + 1))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("invalid URL on line {}: '{line}': unsupported scheme", i + 1);
        }
        if url.host_str().map_or(true, str::is_empty) {
            bail!("invalid URL on line {}: '{line}': missing host", i + 1);
        }
        urls.push(url);
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_single_header_pair() {
        let h = parse_headers("key1: value1").unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h["key1"], "value1");
    }

    #[test]
    fn test_multiple_header_pairs() {
        let h = parse_headers("key1: value1, key2: value2, key3: value3").unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h["key2"], "value2");
    }

    #[test]
    fn test_badly_formatted_header_string() {
        let h = parse_headers(" key1:value1,    key2: value2,key3:  value3 , ").unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h["key1"], "value1");
        assert_eq!(h["key2"], "value2");
        assert_eq!(h["key3"], "value3");
    }

    #[test]
    fn test_missing_header_name_or_no_headers() {
        assert!(parse_headers(" :value1").unwrap().is_empty());
        assert!(parse_headers(" ").unwrap().is_empty());
        assert!(parse_headers("").unwrap().is_empty());
    }

    #[test]
    fn test_header_name_with_space_is_rejected() {
        assert!(parse_headers("bad name: v").is_err());
    }

    #[test]
    fn test_hosts() {
        assert!(parse_hosts("").is_empty());
        assert_eq!(parse_hosts("a.example, b.example,"), vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_literal_target() {
        let urls = load_targets("http://localhost:4140/").unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "http://localhost:4140/");
    }

    #[test]
    fn test_bad_targets() {
        assert!(load_targets("localhost:4140").is_err());
        assert!(load_targets("/just/a/path").is_err());
        assert!(load_targets("http://").is_err());
    }

    #[test]
    fn test_target_list_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "http://a.example/one").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "https://b.example:8443/two").unwrap();

        let urls = load_targets(&format!("@{}", f.path().display())).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].port(), Some(8443));
    }

    #[test]
    fn test_payload_sources() {
        assert_eq!(load_payload("").unwrap(), Bytes::new());
        assert_eq!(load_payload("{\"a\":1}").unwrap(), Bytes::from_static(b"{\"a\":1}"));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"from file").unwrap();
        let body = load_payload(&format!("@{}", f.path().display())).unwrap();
        assert_eq!(body, Bytes::from_static(b"from file"));

        assert!(load_payload("@/nonexistent/payload").is_err());
    }

    #[test]
    fn test_into_config() {
        let args = Args::parse_from([
            "simmer",
            "http://localhost:4140/",
            "--qps",
            "10",
            "--concurrency",
            "3",
            "--method",
            "GET",
            "--interval-ms",
            "1000",
            "--latency-unit",
            "us",
            "--headers",
            "Content-Type: application/json",
            "--no-latency-summary",
        ]);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.rate_per_worker, 10);
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.method, Method::GET);
        assert_eq!(cfg.interval, Duration::from_secs(1));
        assert_eq!(cfg.latency_unit, LatencyUnit::Micros);
        assert_eq!(cfg.iterations, None);
        assert_eq!(cfg.total_requests, None);
        assert!(!cfg.latency_summary);
        assert_eq!(cfg.headers["content-type"], "application/json");
    }

    #[test]
    fn test_defaults() {
        let cfg = Args::parse_from(["simmer", "http://localhost/"])
            .into_config()
            .unwrap();
        assert_eq!(cfg.rate_per_worker, 1);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.method, Method::POST);
        assert_eq!(cfg.interval, Duration::from_secs(10));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.latency_unit, LatencyUnit::Millis);
        assert!(cfg.latency_summary);
    }

    #[test]
    fn test_zero_qps_is_rejected() {
        let args = Args::parse_from(["simmer", "http://localhost/", "--qps", "0"]);
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_unknown_latency_unit_is_rejected() {
        assert!(Args::try_parse_from(["simmer", "http://localhost/", "--latency-unit", "s"]).is_err());
    }
}
