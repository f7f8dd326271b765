//! Local Prometheus registry for the ingestion service.
//!
//! Mirrors `dashflow-langserve::metrics`'s `OnceLock<Metrics>` pattern, but
//! registers to a registry owned by this crate rather than a shared
//! observability singleton, since that crate is not part of this workspace's
//! dependency stack.

use std::sync::OnceLock;

use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

pub struct IngestMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub chunks_created_total: IntCounterVec,
}

impl IngestMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("rag_ingest_requests_total", "Ingestion requests by route and outcome"),
            &["route", "outcome"],
        )
        .expect("metric registration");
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "rag_ingest_request_duration_seconds",
                "Ingestion request latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["route"],
        )
        .expect("metric registration");
        let chunks_created_total = IntCounterVec::new(
            prometheus::Opts::new("rag_ingest_chunks_created_total", "Chunks created by collection"),
            &["collection"],
        )
        .expect("metric registration");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(chunks_created_total.clone()))
            .expect("metric registration");

        Self {
            registry,
            requests_total,
            request_duration_seconds,
            chunks_created_total,
        }
    }
}

static METRICS: OnceLock<IngestMetrics> = OnceLock::new();

/// Returns the process-wide metrics instance, initializing it on first use.
pub fn metrics() -> &'static IngestMetrics {
    METRICS.get_or_init(IngestMetrics::new)
}

/// Encodes the current metric values as Prometheus text exposition format.
pub fn gather() -> Result<String, prometheus::Error> {
    let metrics = metrics();
    let families = metrics.registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("non-utf8 metrics output: {e}")))
}
