use crate::config::Config;
use crate::measurement::{Measurement, RespInfo};
use anyhow::{Context, Result};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method};
use rand::Rng;
use reqwest::{Response, Url};
use std::time::{Duration, Instant};

/// Correlation header carrying the global request id.
pub const REQ_ID_HEADER: &str = "sc-req-id";

/// Initial size of each worker's body buffer. Only bodies that get hashed are
/// read into it; the discard path drops reqwest's chunks as they arrive.
pub const BODY_BUFFER_BYTES: usize = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// FNV-1a 64 of `data`.
pub fn fnv1a64(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub fn build_client(cfg: &Config) -> Result<reqwest::Client> {
    let idle_per_host = if cfg.no_reuse { 0 } else { cfg.concurrency };
    reqwest::Client::builder()
        .timeout(cfg.timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(idle_per_host)
        .tcp_nodelay(true)
        .gzip(cfg.compress)
        .danger_accept_invalid_certs(true)
        .build()
        .context("build http client")
}

/// Issues single requests and turns each into a [`Measurement`].
pub struct RequestExecutor {
    client: reqwest::Client,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    hosts: Vec<HeaderValue>,
    hash_value: u64,
    no_reuse: bool,
}

impl RequestExecutor {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = build_client(cfg)?;
        Self::with_client(cfg, client)
    }

    pub fn with_client(cfg: &Config, client: reqwest::Client) -> Result<Self> {
        let hosts = cfg
            .hosts
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| HeaderValue::from_str(h).with_context(|| format!("invalid host override: {h}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client,
            method: cfg.method.clone(),
            headers: cfg.headers.clone(),
            body: cfg.body.clone(),
            hosts,
            hash_value: cfg.hash_value,
            no_reuse: cfg.no_reuse,
        })
    }

    /// Random Host override for the next request, if any are configured.
    pub fn pick_host<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&HeaderValue> {
        if self.hosts.is_empty() {
            None
        } else {
            Some(&self.hosts[rng.gen_range(0..self.hosts.len())])
        }
    }

    /// Sends one request to `target`. Never fails: transport errors become a
    /// failed measurement.
    pub async fn execute(
        &self,
        target: &Url,
        req_id: u64,
        host: Option<&HeaderValue>,
        check_hash: bool,
        body_buf: &mut Vec<u8>,
    ) -> Measurement {
        match self
            .try_execute(target, req_id, host, check_hash, body_buf)
            .await
        {
            Ok(info) => Measurement::response(req_id, info),
            Err(e) => Measurement::failed(req_id, e),
        }
    }

    async fn try_execute(
        &self,
        target: &Url,
        req_id: u64,
        host: Option<&HeaderValue>,
        check_hash: bool,
        body_buf: &mut Vec<u8>,
    ) -> Result<RespInfo> {
        let mut req = self
            .client
            .request(self.method.clone(), target.clone())
            .header(REQ_ID_HEADER, req_id)
            .headers(self.headers.clone());
        if let Some(host) = host {
            req = req.header(header::HOST, host.clone());
        }
        if self.no_reuse {
            req = req.header(header::CONNECTION, HeaderValue::from_static("close"));
        }
        if !self.body.is_empty() {
            req = req.body(self.body.clone());
        }

        let t0 = Instant::now();
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} {}", self.method, target))?;
        // send() resolves once the response head is in: time to first byte
        let latency = t0.elapsed();
        let status = resp.status();

        if check_hash {
            read_body(resp, body_buf).await?;
            Ok(RespInfo {
                status,
                bytes: body_buf.len() as u64,
                latency,
                failed_hash_check: fnv1a64(body_buf) != self.hash_value,
            })
        } else {
            let bytes = drain_body(resp).await?;
            Ok(RespInfo {
                status,
                bytes,
                latency,
                failed_hash_check: false,
            })
        }
    }
}

/// Streams the body and drops every chunk, returning the byte count.
async fn drain_body(mut resp: Response) -> Result<u64> {
    let mut n = 0u64;
    while let Some(chunk) = resp.chunk().await.context("read body")? {
        n += chunk.len() as u64;
    }
    Ok(n)
}

/// Reads the whole body into `buf`, reusing its allocation.
async fn read_body(mut resp: Response, buf: &mut Vec<u8>) -> Result<()> {
    buf.clear();
    while let Some(chunk) = resp.chunk().await.context("read body")? {
        buf.extend_from_slice(&chunk);
    }
    Ok(())
}
