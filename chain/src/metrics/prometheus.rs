//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed consensus metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Consensus-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and can be updated from
/// consensus / transport code as a node runs.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Current chain height (the head block's index).
    pub chain_height: Gauge,
    /// Number of transactions currently waiting in the mempool.
    pub mempool_size: Gauge,
    /// Time spent forging a candidate block, in seconds.
    pub block_forge_seconds: Histogram,
    /// Total number of blocks this node has forged.
    pub blocks_forged: IntCounter,
    /// Total number of reorganizations this node has performed.
    pub reorgs_total: IntCounter,
    /// Total number of votes this node has cast.
    pub votes_cast: IntCounter,
    /// Total number of sync rounds this node has initiated.
    pub sync_rounds_total: IntCounter,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let chain_height = Gauge::with_opts(Opts::new("chain_height", "Current chain height (head block index)"))?;
        registry.register(Box::new(chain_height.clone()))?;

        let mempool_size = Gauge::with_opts(Opts::new("mempool_size", "Number of transactions waiting in the mempool"))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let block_forge_seconds = Histogram::with_opts(
            HistogramOpts::new("block_forge_seconds", "Time spent assembling a candidate block, in seconds")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(block_forge_seconds.clone()))?;

        let blocks_forged = IntCounter::with_opts(Opts::new("blocks_forged_total", "Total blocks forged by this node"))?;
        registry.register(Box::new(blocks_forged.clone()))?;

        let reorgs_total = IntCounter::with_opts(Opts::new("reorgs_total", "Total chain reorganizations performed"))?;
        registry.register(Box::new(reorgs_total.clone()))?;

        let votes_cast = IntCounter::with_opts(Opts::new("votes_cast_total", "Total votes cast by this node"))?;
        registry.register(Box::new(votes_cast.clone()))?;

        let sync_rounds_total = IntCounter::with_opts(Opts::new("sync_rounds_total", "Total sync rounds initiated"))?;
        registry.register(Box::new(sync_rounds_total.clone()))?;

        Ok(Self {
            chain_height,
            mempool_size,
            block_forge_seconds,
            blocks_forged,
            reorgs_total,
            votes_cast,
            sync_rounds_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the consensus metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self { registry, consensus })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.chain_height.set(42.0);
        metrics.mempool_size.set(3.0);
        metrics.block_forge_seconds.observe(0.002);
        metrics.blocks_forged.inc();
        metrics.reorgs_total.inc();
        metrics.votes_cast.inc();
        metrics.sync_rounds_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.chain_height.set(7.0);
        let text = registry.gather_text();
        assert!(text.contains("chain_height"));
    }
}
