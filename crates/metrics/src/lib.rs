//! Metrics and tracing setup for the fanout client.
//!
//! Provides a global [`ClientMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<ClientMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static ClientMetrics {
    METRICS.get_or_init(ClientMetrics::new)
}

/// All Prometheus metrics for a fanout client.
pub struct ClientMetrics {
    pub registry: Registry,

    // ── Operation counters ──
    pub operations_by_type: IntCounterVec,
    pub operations_succeeded: IntCounter,
    pub operations_failed: IntCounter,

    // ── Per-replica request counters ──
    pub requests_sent: IntCounter,
    pub responses_ok: IntCounter,
    pub responses_failed: IntCounter,

    // ── Adaptive hedging ──
    pub past_due: IntCounter,

    // ── Latency ──
    pub operation_latency_secs: HistogramVec,
    pub request_latency_secs: HistogramVec,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for operation/request latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

impl ClientMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let operations_by_type = IntCounterVec::new(
            Opts::new(
                "fanout_operations_by_type_total",
                "Operations started, by type",
            ),
            &["op_type"],
        )
        .expect("operations_by_type counter vec");
        let operations_succeeded = IntCounter::with_opts(Opts::new(
            "fanout_operations_succeeded_total",
            "Operations that reached their success target",
        ))
        .expect("operations_succeeded counter");
        let operations_failed = IntCounter::with_opts(Opts::new(
            "fanout_operations_failed_total",
            "Operations that became unreachable before the success target",
        ))
        .expect("operations_failed counter");

        let requests_sent = IntCounter::with_opts(Opts::new(
            "fanout_requests_sent_total",
            "Per-replica requests dispatched",
        ))
        .expect("requests_sent counter");
        let responses_ok = IntCounter::with_opts(Opts::new(
            "fanout_responses_ok_total",
            "Per-replica requests acked",
        ))
        .expect("responses_ok counter");
        let responses_failed = IntCounter::with_opts(Opts::new(
            "fanout_responses_failed_total",
            "Per-replica requests failed or timed out",
        ))
        .expect("responses_failed counter");

        let past_due = IntCounter::with_opts(Opts::new(
            "fanout_past_due_total",
            "In-flight requests flagged past the latency quantile",
        ))
        .expect("past_due counter");

        let operation_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "fanout_operation_latency_seconds",
                "End-to-end operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op_type"],
        )
        .expect("operation_latency_secs histogram");
        let request_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "fanout_request_latency_seconds",
                "Per-replica request latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["dc_class"],
        )
        .expect("request_latency_secs histogram");

        // Register all metrics
        registry
            .register(Box::new(operations_by_type.clone()))
            .expect("register operations_by_type");
        registry
            .register(Box::new(operations_succeeded.clone()))
            .expect("register operations_succeeded");
        registry
            .register(Box::new(operations_failed.clone()))
            .expect("register operations_failed");
        registry
            .register(Box::new(requests_sent.clone()))
            .expect("register requests_sent");
        registry
            .register(Box::new(responses_ok.clone()))
            .expect("register responses_ok");
        registry
            .register(Box::new(responses_failed.clone()))
            .expect("register responses_failed");
        registry
            .register(Box::new(past_due.clone()))
            .expect("register past_due");
        registry
            .register(Box::new(operation_latency_secs.clone()))
            .expect("register operation_latency_secs");
        registry
            .register(Box::new(request_latency_secs.clone()))
            .expect("register request_latency_secs");

        Self {
            registry,
            operations_by_type,
            operations_succeeded,
            operations_failed,
            requests_sent,
            responses_ok,
            responses_failed,
            past_due,
            operation_latency_secs,
            request_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: start an operation latency timer. Returns a guard that records
/// elapsed time on drop.
pub fn start_operation_timer(op_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .operation_latency_secs
        .with_label_values(&[op_type])
        .start_timer()
}

/// Helper: record one per-replica request latency.
///
/// `dc_class` is `"local"` or `"cross_colo"`.
pub fn observe_request_latency(dc_class: &str, seconds: f64) {
    metrics()
        .request_latency_secs
        .with_label_values(&[dc_class])
        .observe(seconds);
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
