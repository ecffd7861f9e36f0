use http::StatusCode;
use std::time::Duration;

/// What came back for one request that reached the server.
#[derive(Debug, Clone, Copy)]
pub struct RespInfo {
    pub status: StatusCode,
    /// Body bytes received.
    pub bytes: u64,
    /// Time to first byte.
    pub latency: Duration,
    pub failed_hash_check: bool,
}

impl RespInfo {
    /// 2xx through 4xx count as good responses: the server answered on purpose.
    #[inline]
    pub fn is_good(&self) -> bool {
        (200..500).contains(&self.status.as_u16())
    }
}

#[derive(Debug)]
pub enum Outcome {
    Response(RespInfo),
    Failed(anyhow::Error),
}

/// One request, produced by a worker and consumed once by the aggregator.
#[derive(Debug)]
pub struct Measurement {
    pub req_id: u64,
    pub outcome: Outcome,
}

impl Measurement {
    pub fn response(req_id: u64, info: RespInfo) -> Self {
        Self {
            req_id,
            outcome: Outcome::Response(info),
        }
    }

    pub fn failed(req_id: u64, err: anyhow::Error) -> Self {
        Self {
            req_id,
            outcome: Outcome::Failed(err),
        }
    }
}
