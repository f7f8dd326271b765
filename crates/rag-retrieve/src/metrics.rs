//! Local Prometheus registry for the retrieval service, mirroring
//! `rag-ingest::metrics`'s `OnceLock<Metrics>` pattern.

use std::sync::OnceLock;

use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

pub struct RetrieveMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub stage_skipped_total: IntCounterVec,
}

impl RetrieveMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("rag_retrieve_requests_total", "Retrieval requests by route and outcome"),
            &["route", "outcome"],
        )
        .expect("metric registration");
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "rag_retrieve_request_duration_seconds",
                "Retrieval request latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["route"],
        )
        .expect("metric registration");
        let stage_skipped_total = IntCounterVec::new(
            prometheus::Opts::new(
                "rag_retrieve_stage_skipped_total",
                "Optional stages (rerank, compress) skipped after an upstream error",
            ),
            &["stage"],
        )
        .expect("metric registration");

        registry.register(Box::new(requests_total.clone())).expect("metric registration");
        registry.register(Box::new(request_duration_seconds.clone())).expect("metric registration");
        registry.register(Box::new(stage_skipped_total.clone())).expect("metric registration");

        Self { registry, requests_total, request_duration_seconds, stage_skipped_total }
    }
}

static METRICS: OnceLock<RetrieveMetrics> = OnceLock::new();

/// Returns the process-wide metrics instance, initializing it on first use.
pub fn metrics() -> &'static RetrieveMetrics {
    METRICS.get_or_init(RetrieveMetrics::new)
}

/// Encodes the current metric values as Prometheus text exposition format.
pub fn gather() -> Result<String, prometheus::Error> {
    let metrics = metrics();
    let families = metrics.registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("non-utf8 metrics output: {e}")))
}
