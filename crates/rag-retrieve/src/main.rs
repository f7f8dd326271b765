//! Entry point for the retrieval service: loads configuration, builds the
//! Model & Service Registry (C1), the LLM Gateway (C2), the Intent
//! Classifier (C8), and the Retrieval Orchestrator (C9), then serves
//! `/v1/retrieve` and friends over HTTP.

use std::sync::Arc;

use rag_core::{HnswParams, HttpEmbedder, LlmGateway, Registry};
use rag_intent::{IntentClassifier, PatternLearner, PatternLibrary, QueryLogger};
use rag_retrieve::config::Config;
use rag_retrieve::{build_router, AppState, RetrieveOrchestrator};
use rag_vectorstore::{HttpVectorStore, HttpVectorStoreConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "rag-retrieve failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(environment = ?config.environment, bind_addr = %config.bind_addr, "starting rag-retrieve");

    let http = reqwest::Client::builder().pool_max_idle_per_host(40).timeout(config.request_timeout).build()?;

    let registry =
        Arc::new(Registry::build(config.environment, config.registry_config.clone()).map_err(|e| anyhow::anyhow!(e))?);

    rag_retrieve::health::wait_for_dependency(&http, "llm_gateway", registry.service_url("llm_gateway").unwrap())
        .await?;
    rag_retrieve::health::wait_for_dependency(&http, "vector_store", registry.service_url("vector_store").unwrap())
        .await?;
    rag_retrieve::health::wait_for_dependency(&http, "embedder", registry.service_url("embedder").unwrap()).await?;
    if let Some(url) = &config.rerank_service_url {
        rag_retrieve::health::wait_for_dependency(&http, "reranker", url).await?;
    }
    if let Some(url) = &config.compress_service_url {
        rag_retrieve::health::wait_for_dependency(&http, "compressor", url).await?;
    }

    let gateway = Arc::new(LlmGateway::new(
        http.clone(),
        registry.clone(),
        config.provider_api_keys.clone(),
        config.cache_ttl,
        config.cache_max_size,
    ));

    let embedder: Arc<dyn rag_core::Embedder> =
        Arc::new(HttpEmbedder::new(http.clone(), registry.clone(), std::time::Duration::from_secs(30)));

    let store_config = HttpVectorStoreConfig {
        base_url: registry.service_url("vector_store").unwrap().to_string(),
        hnsw: HnswParams::default(),
        request_timeout: config.request_timeout,
        flush_after_insert: false,
    };
    let store: Arc<dyn rag_vectorstore::VectorStore> = Arc::new(HttpVectorStore::new(http.clone(), store_config));

    if let Some(parent) = config.pattern_library_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !config.pattern_library_path.exists() {
        std::fs::write(&config.pattern_library_path, r#"{"patterns": {}}"#)?;
    }
    let library = PatternLibrary::load(&config.pattern_library_path)?;
    let library_for_reload = Arc::new(PatternLibrary::load(&config.pattern_library_path)?);

    std::fs::create_dir_all(&config.query_log_dir)?;
    let query_logger = Arc::new(QueryLogger::new(&config.query_log_dir, config.log_retention_days));
    query_logger.cleanup_expired().ok();

    let learner = Arc::new(PatternLearner::new(
        library_for_reload,
        gateway.clone(),
        config.meta_model.clone(),
        config.query_log_dir.join("learning_queue.jsonl"),
        config.learning_batch_size,
        config.learning_auto_approve_threshold,
        config.learning_enabled,
    ));

    let classifier = Arc::new(IntentClassifier::new(
        &library,
        gateway.clone(),
        registry.clone(),
        learner,
        QueryLogger::new(&config.query_log_dir, config.log_retention_days),
    ));

    let reranker: Option<Arc<dyn rag_retrieve::reranker::Reranker>> = config
        .rerank_service_url
        .clone()
        .map(|url| Arc::new(rag_retrieve::reranker::HttpReranker::new(http.clone(), url, config.rerank_timeout)) as _);

    let compressor: Option<Arc<dyn rag_retrieve::compressor::Compressor>> =
        config.compress_service_url.clone().map(|url| {
            Arc::new(rag_retrieve::compressor::HttpCompressor::new(
                http.clone(),
                url,
                config.compress_model.clone(),
                config.compress_max_tokens_per_chunk,
                config.compress_timeout,
            )) as _
        });

    let orchestrator = Arc::new(RetrieveOrchestrator::new(
        classifier,
        embedder,
        config.embedding_model.clone(),
        store,
        registry.clone(),
        gateway,
        reranker,
        compressor,
        config.retrieve_concurrency,
    ));

    let state = AppState {
        orchestrator,
        query_logger,
        http: http.clone(),
        health_check_timeout: config.health_check_timeout,
        rerank_service_url: config.rerank_service_url.clone(),
        compress_service_url: config.compress_service_url.clone(),
        log_window_hours_default: 24,
    };

    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .map(|v| v.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let app = build_router(state, allowed_origins);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "rag-retrieve listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
    Ok(())
}
