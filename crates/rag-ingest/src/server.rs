//! Axum HTTP surface for the ingestion service: `/v1/ingest`, collection and
//! document management, `/health`, and `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use rag_core::PipelineError;
use serde::Deserialize;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

use crate::orchestrator::IngestOrchestrator;
use crate::types::{
    CreateCollectionRequest, CreateCollectionResponse, DeleteResponse, IngestRequest, IngestResponse,
    UpdateDocumentRequest, UpdateDocumentResponse,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IngestOrchestrator>,
    pub store: Arc<dyn rag_vectorstore::VectorStore>,
    pub http: reqwest::Client,
    pub health_check_timeout: std::time::Duration,
}

/// Rejects requests from source addresses outside the loopback/private
/// ranges `rag_core::net_policy` allows. Applied as an outermost layer so
/// rejected connections never reach a handler.
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
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/v1/ingest", post(ingest_handler))
        .route("/v1/collections", post(create_collection_handler))
        .route("/v1/collections/:name", delete(delete_collection_handler))
        .route("/v1/documents/:id", put(update_document_handler))
        .route("/v1/documents/:id", delete(delete_document_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(middleware::from_fn(enforce_net_policy))
        .with_state(state)
}

#[tracing::instrument(skip(state, request), fields(document_id = %request.document_id))]
async fn ingest_handler(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, PipelineError> {
    let start = Instant::now();
    let collection = request.collection_name.clone();
    let result = state.orchestrator.ingest(request).await;

    let outcome = if result.is_ok() { "success" } else { "error" };
    crate::metrics::metrics()
        .requests_total
        .with_label_values(&["ingest", outcome])
        .inc();
    crate::metrics::metrics()
        .request_duration_seconds
        .with_label_values(&["ingest"])
        .observe(start.elapsed().as_secs_f64());
    if let Ok(response) = &result {
        crate::metrics::metrics()
            .chunks_created_total
            .with_label_values(&[&collection])
            .inc_by(u64::from(response.chunks_created));
    }

    result.map(Json)
}

async fn create_collection_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<Json<CreateCollectionResponse>, PipelineError> {
    let description = rag_vectorstore::generate_collection_description(
        request.dimension,
        request.metadata_model_used.as_deref(),
        request.embedding_model_used.as_deref(),
    );
    let outcome = state
        .store
        .ensure_collection(&request.name, request.dimension, &description)
        .await?;
    Ok(Json(CreateCollectionResponse {
        name: request.name,
        created: matches!(outcome, rag_vectorstore::EnsureOutcome::Created),
    }))
}

async fn delete_collection_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, PipelineError> {
    state.store.drop_collection(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct DocumentQuery {
    collection_name: String,
    tenant_id: Option<String>,
}

async fn update_document_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<UpdateDocumentResponse>, PipelineError> {
    let filter = format!("document_id == \"{document_id}\"");
    let chunks_deleted = state
        .store
        .delete_by_filter(&request.collection_name, &filter, request.tenant_id.as_deref())
        .await? as u32;

    let ingest_request = IngestRequest {
        text: request.text,
        document_id: document_id.clone(),
        collection_name: request.collection_name,
        tenant_id: request.tenant_id,
        chunking_method: request.chunking_method,
        max_chunk_size: request.max_chunk_size,
        chunk_overlap: request.chunk_overlap,
        separators: request.separators,
        markdown_headers: request.markdown_headers,
        encoding: None,
        generate_metadata: request.generate_metadata,
        keywords_count: request.keywords_count,
        topics_count: request.topics_count,
        questions_count: request.questions_count,
        summary_length: request.summary_length,
        generate_embeddings: true,
        embedding_model: request.embedding_model,
        storage_mode: crate::types::StorageMode::Existing,
    };
    let response = state.orchestrator.ingest(ingest_request).await?;

    Ok(Json(UpdateDocumentResponse {
        document_id,
        chunks_deleted,
        chunks_inserted: response.chunks_inserted,
    }))
}

async fn delete_document_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DeleteResponse>, PipelineError> {
    let filter = format!("document_id == \"{document_id}\"");
    let deleted = state
        .store
        .delete_by_filter(&query.collection_name, &filter, query.tenant_id.as_deref())
        .await? as u32;
    Ok(Json(DeleteResponse { deleted }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = crate::health::aggregate_health(&state.http, state.orchestrator.registry(), state.health_check_timeout).await;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_policy_rejects_public_address() {
        let addr: std::net::IpAddr = "8.8.8.8".parse().unwrap();
        assert!(!rag_core::net_policy::is_allowed(addr));
    }

    #[test]
    fn net_policy_allows_loopback() {
        let addr: std::net::IpAddr = "127.0.0.1".parse().unwrap();
        assert!(rag_core::net_policy::is_allowed(addr));
    }
}
