//! Prometheus instrumentation for the ChainIndex engine (§6): three
//! gauges/counter labeled by `indexer_name`, served over an `axum`
//! router alongside a liveness probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ACTIVE_WORKERS: GaugeVec = GaugeVec::new(
        Opts::new(
            "indexer_active_workers",
            "Number of worker tasks currently running for an indexer"
        ),
        &["indexer_name"]
    )
    .unwrap();
    pub static ref LATEST_INDEXED_HEIGHT: GaugeVec = GaugeVec::new(
        Opts::new(
            "indexer_latest_indexed_height",
            "Height of the most recently persisted block for an indexer"
        ),
        &["indexer_name"]
    )
    .unwrap();
    pub static ref FAILED_BLOCKS: CounterVec = CounterVec::new(
        Opts::new(
            "indexer_failed_blocks",
            "Blocks dropped after exhausting max_attempts, by indexer"
        ),
        &["indexer_name"]
    )
    .unwrap();
}

/// Registers all three series with [`REGISTRY`]. Idempotent to call more
/// than once only in tests that spin up their own registry; production
/// startup calls this exactly once.
pub fn init() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(ACTIVE_WORKERS.clone()))?;
    REGISTRY.register(Box::new(LATEST_INDEXED_HEIGHT.clone()))?;
    REGISTRY.register(Box::new(FAILED_BLOCKS.clone()))?;
    Ok(())
}

pub fn set_active_workers(indexer_name: &str, count: i64) {
    ACTIVE_WORKERS
        .with_label_values(&[indexer_name])
        .set(count as f64);
}

pub fn set_latest_indexed_height(indexer_name: &str, height: u64) {
    LATEST_INDEXED_HEIGHT
        .with_label_values(&[indexer_name])
        .set(height as f64);
}

pub fn increment_failed_blocks(indexer_name: &str) {
    FAILED_BLOCKS.with_label_values(&[indexer_name]).inc();
}

pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer).expect("prometheus encoding never fails on a well-formed registry");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid utf-8")
}

/// Flips to `true` once the process has reached the point of starting
/// indexers (§6), which is what `/healthz` reports on.
#[derive(Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

async fn metrics_handler() -> impl IntoResponse {
    ([("content-type", "text/plain; version=0.0.4")], gather())
}

async fn healthz_handler(State(liveness): State<Liveness>) -> impl IntoResponse {
    if liveness.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::OK, "starting")
    }
}

/// Builds the `GET /metrics` + `GET /healthz` router bound on
/// `monitoring.port`.
pub fn router(liveness: Liveness) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(liveness)
}
