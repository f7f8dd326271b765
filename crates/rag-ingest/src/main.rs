//! Entry point for the ingestion service: loads configuration, builds the
//! Model & Service Registry (C1), the LLM Gateway (C2), the Vector Store
//! Adapter (C5), and the Ingestion Orchestrator (C6), then serves
//! `/v1/ingest` and friends over HTTP.

use std::sync::Arc;

use rag_core::{HnswParams, LlmGateway, Registry, Task};
use rag_ingest::config::Config;
use rag_ingest::{build_router, AppState, IngestOrchestrator};
use rag_metadata::MetadataExtractor;
use rag_vectorstore::{HttpVectorStore, HttpVectorStoreConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "rag-ingest failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(environment = ?config.environment, bind_addr = %config.bind_addr, "starting rag-ingest");

    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(40)
        .timeout(config.request_timeout)
        .build()?;

    let registry = Arc::new(Registry::build(config.environment, config.registry_config.clone()).map_err(|e| anyhow::anyhow!(e))?);

    rag_ingest::health::wait_for_dependency(&http, "llm_gateway", registry.service_url("llm_gateway").unwrap()).await?;
    rag_ingest::health::wait_for_dependency(&http, "vector_store", registry.service_url("vector_store").unwrap()).await?;

    let gateway = Arc::new(LlmGateway::new(
        http.clone(),
        registry.clone(),
        config.provider_api_keys.clone(),
        config.cache_ttl,
        config.cache_max_size,
    ));

    let metadata_model = registry
        .model_for_task(Task::MetadataExtraction)
        .ok_or_else(|| anyhow::anyhow!("no model configured for metadata extraction"))?
        .to_string();
    let metadata_extractor = Arc::new(MetadataExtractor::new(
        gateway.clone(),
        metadata_model,
        config.cache_ttl,
        config.cache_max_size,
    ));

    let embedder = Arc::new(rag_core::HttpEmbedder::new(
        http.clone(),
        registry.clone(),
        std::time::Duration::from_secs(30),
    ));

    let store_config = HttpVectorStoreConfig {
        base_url: registry.service_url("vector_store").unwrap().to_string(),
        hnsw: HnswParams::default(),
        request_timeout: config.request_timeout,
        flush_after_insert: true,
    };
    let store: Arc<dyn rag_vectorstore::VectorStore> = Arc::new(HttpVectorStore::new(http.clone(), store_config));

    let orchestrator = Arc::new(IngestOrchestrator::new(
        embedder,
        store.clone(),
        registry.clone(),
        metadata_extractor,
        config.gateway_concurrency,
        config.ingest_concurrency,
    ));

    let state = AppState {
        orchestrator,
        store,
        http: http.clone(),
        health_check_timeout: config.health_check_timeout,
    };

    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .map(|v| v.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let app = build_router(state, allowed_origins);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "rag-ingest listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
    Ok(())
}
