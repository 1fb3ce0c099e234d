//! Prometheus metrics and the metrics/probe HTTP server.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_FAILURE: &str = "failure";
pub const RESULT_DELETE_SUCCESS: &str = "delete_success";
pub const RESULT_DELETE_FAILURE: &str = "delete_failure";

/// Controller metrics
#[derive(Debug, Clone)]
pub struct Metrics {
    /// NetworkInfo reconcile outcomes by result
    pub reconcile_total: IntCounterVec,
    /// GC VPC deletions by result (deleted, failed)
    pub gc_vpcs_total: IntCounterVec,
    /// NetworkInfos re-enqueued by the drift detector
    pub drift_requeues_total: IntCounter,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new("networkinfo_reconcile_total", "NetworkInfo reconciliation results"),
            &["result"],
        )?;
        let gc_vpcs_total = IntCounterVec::new(
            Opts::new("networkinfo_gc_vpcs_total", "Orphan VPCs handled by garbage collection"),
            &["result"],
        )?;
        let drift_requeues_total = IntCounter::new(
            "networkinfo_drift_requeues_total",
            "NetworkInfos re-enqueued after pre-created VPC drift",
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(gc_vpcs_total.clone()))?;
        registry.register(Box::new(drift_requeues_total.clone()))?;

        Ok(Self {
            reconcile_total,
            gc_vpcs_total,
            drift_requeues_total,
            registry,
        })
    }

    pub fn record_reconcile(&self, result: &str) {
        self.reconcile_total.with_label_values(&[result]).inc();
    }

    pub fn reconcile_count(&self, result: &str) -> u64 {
        self.reconcile_total.with_label_values(&[result]).get()
    }

    /// Text exposition of every registered metric
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// State shared with the HTTP handlers
#[derive(Debug)]
pub struct ServerState {
    metrics: Arc<Metrics>,
    ready: AtomicBool,
}

impl ServerState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            ready: AtomicBool::new(false),
        }
    }

    /// Mark startup (registry load, VPC store load) as complete
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        info!("Controller marked as ready");
    }
}

/// Router serving `/metrics`, `/healthz` and `/readyz`
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the metrics/probe server until it fails
pub async fn serve(state: Arc<ServerState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    axum::serve(listener, router(state)).await
}

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> String {
    state.metrics.gather()
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<ServerState>>) -> StatusCode {
    if state.ready.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
