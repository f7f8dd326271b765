//! Axum HTTP surface for the retrieval service: `/v1/retrieve` (batched or
//! SSE-streamed), `/v1/analyze`, `/v1/search`, `/v1/stats`, `/health`, and
//! `/metrics`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use rag_core::PipelineError;
use rag_intent::AnalyzeRequest;
use rag_search::SearchRequest as SearchLibRequest;
use serde::Deserialize;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

use crate::orchestrator::RetrieveOrchestrator;
use crate::types::{RetrieveRequest, RetrieveResponse, StatsResponse};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: std::sync::Arc<RetrieveOrchestrator>,
    pub query_logger: std::sync::Arc<rag_intent::logging::QueryLogger>,
    pub http: reqwest::Client,
    pub health_check_timeout: std::time::Duration,
    pub rerank_service_url: Option<String>,
    pub compress_service_url: Option<String>,
    pub log_window_hours_default: u32,
}

/// Rejects requests from source addresses outside the loopback/private
/// ranges `rag_core::net_policy` allows.
async fn enforce_net_policy(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> impl IntoResponse {
    if !rag_core::net_policy::is_allowed(addr.ip()) {
        tracing::warn!(client = %addr, "rejected request from disallowed source address");
        return PipelineError::Forbidden(format!("source address {} is not permitted", addr.ip())).into_response();
    }
    next.run(request).await
}

pub fn build_router(state: AppState, allowed_origins: Vec<String>) -> Router {
    let cors = if allowed_origins.is_empty() {
        tracing::info!("no CORS origins configured; CORS headers will not be added");
        CorsLayer::new()
    } else {
        let origins: Vec<_> = allowed_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .route("/v1/retrieve", axum::routing::post(retrieve_handler))
        .route("/v1/analyze", axum::routing::post(analyze_handler))
        .route("/v1/search", axum::routing::post(search_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(middleware::from_fn(enforce_net_policy))
        .with_state(state)
}

#[tracing::instrument(skip(state, request), fields(collection = %request.collection_name))]
async fn retrieve_handler(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> axum::response::Response {
    if request.stream {
        stream_retrieve(state, request).await.into_response()
    } else {
        batched_retrieve(state, request).await.into_response()
    }
}

async fn batched_retrieve(
    state: AppState,
    request: RetrieveRequest,
) -> Result<Json<RetrieveResponse>, PipelineError> {
    let start = Instant::now();
    let result = state.orchestrator.retrieve(request).await;

    let outcome = if result.is_ok() { "success" } else { "error" };
    crate::metrics::metrics().requests_total.with_label_values(&["retrieve", outcome]).inc();
    crate::metrics::metrics()
        .request_duration_seconds
        .with_label_values(&["retrieve"])
        .observe(start.elapsed().as_secs_f64());

    result.map(Json)
}

/// Streams the answer as OpenAI-compatible delta chunks over SSE. Reuses
/// [`RetrieveOrchestrator::prepare`] for intent/search/rerank/compress, then
/// streams answer generation directly rather than calling `retrieve()`, so
/// the expensive upstream work is never duplicated against the batched path
/// (spec.md §6: streaming responses omit citations and the full envelope).
async fn stream_retrieve(
    state: AppState,
    request: RetrieveRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let orchestrator = state.orchestrator.clone();
    let model_override = request.model.clone();
    let temperature = request.temperature;
    let query = request.query.clone();

    let sse_stream = async_stream::stream! {
        let start = Instant::now();
        let prepared = match orchestrator.prepare(&request).await {
            Ok(p) => p,
            Err(e) => {
                crate::metrics::metrics().requests_total.with_label_values(&["retrieve_stream", "error"]).inc();
                if let Ok(event) = Event::default().event("error").json_data(serde_json::json!({"error": e.to_string()})) {
                    yield Ok(event);
                }
                return;
            }
        };

        if prepared.context_chunks.is_empty() {
            let data = serde_json::json!({"delta": "I could not find any relevant information to answer this question."});
            if let Ok(event) = Event::default().event("data").json_data(data) {
                yield Ok(event);
            }
            if let Ok(event) = Event::default().event("end").json_data(serde_json::json!({})) {
                yield Ok(event);
            }
            return;
        }

        let (model, system_prompt, max_tokens) =
            crate::orchestrator::resolve_answer_params(&prepared.classification, &model_override, orchestrator.registry());

        let mut stream = match crate::answer::generate_stream(
            orchestrator.gateway().clone(),
            &model,
            &system_prompt,
            &query,
            &prepared.context_chunks,
            max_tokens,
            temperature,
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                crate::metrics::metrics().requests_total.with_label_values(&["retrieve_stream", "error"]).inc();
                if let Ok(event) = Event::default().event("error").json_data(serde_json::json!({"error": e.to_string()})) {
                    yield Ok(event);
                }
                return;
            }
        };

        let mut had_error = false;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(delta) => {
                    if let Ok(event) = Event::default().event("data").json_data(serde_json::json!({"delta": delta})) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    had_error = true;
                    if let Ok(event) = Event::default().event("error").json_data(serde_json::json!({"error": e.to_string()})) {
                        yield Ok(event);
                    }
                    break;
                }
            }
        }

        let outcome = if had_error { "error" } else { "success" };
        crate::metrics::metrics().requests_total.with_label_values(&["retrieve_stream", outcome]).inc();
        crate::metrics::metrics().request_duration_seconds.with_label_values(&["retrieve_stream"]).observe(start.elapsed().as_secs_f64());

        if let Ok(event) = Event::default().event("end").json_data(serde_json::json!({})) {
            yield Ok(event);
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<rag_intent::ClassificationResult>, PipelineError> {
    let result = state.orchestrator.classifier().classify(&request).await;
    result.map(Json).map_err(Into::into)
}

async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchLibRequest>,
) -> Result<Json<rag_search::SearchResponse>, PipelineError> {
    let orchestrator = &state.orchestrator;
    let response = rag_search::search(
        orchestrator.embedder().as_ref(),
        orchestrator.store().as_ref(),
        orchestrator.embedding_model(),
        &request,
    )
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    #[serde(default)]
    hours: Option<u32>,
}

async fn stats_handler(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> Json<StatsResponse> {
    let hours = query.hours.unwrap_or(state.log_window_hours_default);
    let since = chrono::Utc::now() - chrono::Duration::hours(hours as i64);
    let rejected_count = state.query_logger.read_recent(state.query_logger.rejected_path(), since).len();
    let low_confidence_count = state.query_logger.read_recent(state.query_logger.low_confidence_path(), since).len();
    let matcher_stats = state.orchestrator.classifier().stats();
    Json(StatsResponse {
        window_hours: hours,
        rejected_count,
        low_confidence_count,
        total_queries: matcher_stats.total_queries,
        pattern_hits: matcher_stats.pattern_hits,
        llm_fallbacks: matcher_stats.llm_fallbacks,
        multi_intent_queries: matcher_stats.multi_intent_queries,
        conflict_resolutions: matcher_stats.conflict_resolutions,
        avg_confidence: matcher_stats.avg_confidence,
        pattern_hit_rate: matcher_stats.pattern_hit_rate,
        llm_fallback_rate: matcher_stats.llm_fallback_rate,
        multi_intent_rate: matcher_stats.multi_intent_rate,
    })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = crate::health::aggregate_health(
        &state.http,
        state.orchestrator.registry(),
        state.rerank_service_url.as_deref(),
        state.compress_service_url.as_deref(),
        state.health_check_timeout,
    )
    .await;
    if healthy {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "one or more dependencies are unhealthy")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    match crate::metrics::gather() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to gather metrics: {e}")),
    }
}
