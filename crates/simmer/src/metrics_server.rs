use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use simmer_core::telemetry::{LATENCY_MS, LATENCY_NS, LATENCY_US};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

const BUCKETS: usize = 50;

/// `count` buckets starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(count);
    let mut b = start;
    for _ in 0..count {
        out.push(b);
        b *= factor;
    }
    out
}

/// Installs the global Prometheus recorder and serves it on `GET /metrics`.
pub async fn spawn(addr: SocketAddr) -> Result<()> {
    let prom = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(LATENCY_MS.to_string()),
            &exponential_buckets(0.5, 1.3, BUCKETS),
        )?
        .set_buckets_for_metric(
            Matcher::Full(LATENCY_US.to_string()),
            &exponential_buckets(1.0, 1.35, BUCKETS),
        )?
        .set_buckets_for_metric(
            Matcher::Full(LATENCY_NS.to_string()),
            &exponential_buckets(1.0, 1.5, BUCKETS),
        )?
        .install_recorder()
        .context("install prometheus recorder")?;

    let app = Router::new()
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(prom);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind metrics listener on {addr}"))?;
    tracing::info!("metrics on http://{addr}/metrics");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

async fn metrics(State(prom): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, prom.render())
}
