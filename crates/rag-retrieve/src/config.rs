//! Environment-variable driven configuration for the retrieval service.
//!
//! Env var names and defaults are grounded on `Retrieval/v1.0.0/config.py`
//! (`RERANK_SERVICE_URL`, `COMPRESS_SERVICE_URL`, `MAX_CONCURRENT_RETRIEVALS`,
//! the per-stage timeouts and enable flags). Follows
//! `rag_ingest::config::Config::load()`'s collect-all-errors convention.

use std::collections::HashMap;
use std::time::Duration;

use rag_core::{Environment, ModelInfo, PipelineError, RegistryConfig, Result, ServiceEndpoint, Task};

/// Top-level configuration for the `rag-retrieve` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub registry_config: RegistryConfig,
    pub environment: Environment,
    pub provider_api_keys: HashMap<String, String>,
    pub embedding_model: String,
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    pub gateway_concurrency: usize,
    pub retrieve_concurrency: usize,
    pub health_check_timeout: Duration,
    pub request_timeout: Duration,

    pub rerank_service_url: Option<String>,
    pub compress_service_url: Option<String>,
    pub rerank_timeout: Duration,
    pub compress_timeout: Duration,
    pub compress_model: String,
    pub compress_max_tokens_per_chunk: u32,

    pub pattern_library_path: std::path::PathBuf,
    pub query_log_dir: std::path::PathBuf,
    pub log_retention_days: i64,
    pub learning_batch_size: usize,
    pub learning_auto_approve_threshold: f32,
    pub learning_enabled: bool,
    pub meta_model: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        let mut errors = Vec::new();

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:8076");

        let environment = match env_or("PIPELINE_ENV", "dev").parse::<Environment>() {
            Ok(e) => e,
            Err(e) => {
                errors.push(e.to_string());
                Environment::Dev
            }
        };

        let llm_gateway_url = require_env("LLM_GATEWAY_URL", &mut errors);
        let vector_store_url = require_env("VECTOR_STORE_URL", &mut errors);
        let embedder_url = require_env("EMBEDDER_URL", &mut errors);
        let embedding_model = require_env("EMBEDDING_MODEL", &mut errors);

        let intent_model = require_env("INTENT_MODEL", &mut errors);
        let answer_model_simple = require_env("ANSWER_MODEL_SIMPLE", &mut errors);
        let answer_model_complex = require_env("ANSWER_MODEL_COMPLEX", &mut errors);

        let task_models =
            build_task_models(intent_model.clone(), answer_model_simple.clone(), answer_model_complex.clone());
        let models = build_models(intent_model, answer_model_simple, answer_model_complex);
        let provider_api_keys = build_provider_keys();

        let cache_ttl_seconds = parse_env_or("CACHE_TTL_SECONDS", 3600, &mut errors);
        let cache_max_size = parse_env_or("CACHE_MAX_SIZE", 5000, &mut errors);
        let gateway_concurrency = parse_env_or("GATEWAY_CONCURRENCY", 20, &mut errors);
        let retrieve_concurrency = parse_env_or("MAX_CONCURRENT_RETRIEVALS", 20, &mut errors);
        let health_check_timeout_secs: u64 = parse_env_or("HEALTH_CHECK_TIMEOUT_SECONDS", 2, &mut errors);
        let request_timeout_secs: u64 = parse_env_or("REQUEST_TIMEOUT_SECONDS", 90, &mut errors);

        let rerank_service_url = std::env::var("RERANK_SERVICE_URL").ok();
        let compress_service_url = std::env::var("COMPRESS_SERVICE_URL").ok();
        let rerank_timeout_secs: u64 = parse_env_or("RERANK_TIMEOUT", 20, &mut errors);
        let compress_timeout_secs: u64 = parse_env_or("COMPRESS_TIMEOUT", 60, &mut errors);
        let compress_model = env_or("COMPRESSION_MODEL", "7B-fast");
        let compress_max_tokens_per_chunk = parse_env_or("COMPRESS_MAX_TOKENS_PER_CHUNK", 200, &mut errors);

        let pattern_library_path =
            std::path::PathBuf::from(env_or("PATTERN_LIBRARY_PATH", "./data/pattern_library.json"));
        let query_log_dir = std::path::PathBuf::from(env_or("QUERY_LOG_DIR", "./data"));
        let log_retention_days = parse_env_or("LOG_RETENTION_DAYS", 7, &mut errors);
        let learning_batch_size = parse_env_or("LEARNING_BATCH_SIZE", 20, &mut errors);
        let learning_auto_approve_threshold = parse_env_or("LEARNING_AUTO_APPROVE_THRESHOLD", 0.95, &mut errors);
        let learning_enabled = env_or("PATTERN_LEARNING_ENABLED", "true") == "true";
        let meta_model = std::env::var("PATTERN_LEARNING_MODEL").unwrap_or_else(|_| intent_model.clone());

        if !errors.is_empty() {
            return Err(PipelineError::Internal(format!("rag-retrieve configuration errors: {}", errors.join("; "))));
        }

        let registry_config = RegistryConfig {
            task_models,
            models,
            services: vec![
                ServiceEndpoint { name: "llm_gateway".to_string(), base_url: llm_gateway_url },
                ServiceEndpoint { name: "vector_store".to_string(), base_url: vector_store_url },
                ServiceEndpoint { name: "embedder".to_string(), base_url: embedder_url },
            ],
        };

        Ok(Self {
            bind_addr,
            registry_config,
            environment,
            provider_api_keys,
            embedding_model,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            cache_max_size,
            gateway_concurrency,
            retrieve_concurrency,
            health_check_timeout: Duration::from_secs(health_check_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            rerank_service_url,
            compress_service_url,
            rerank_timeout: Duration::from_secs(rerank_timeout_secs),
            compress_timeout: Duration::from_secs(compress_timeout_secs),
            compress_model,
            compress_max_tokens_per_chunk,
            pattern_library_path,
            query_log_dir,
            log_retention_days,
            learning_batch_size,
            learning_auto_approve_threshold,
            learning_enabled,
            meta_model,
        })
    }
}

/// Builds the five required `task_models` entries. `MetadataExtraction` and
/// `Compression` are filler entries the registry requires but this service
/// never resolves through it: metadata extraction is ingestion-only, and
/// compression runs through the separate compressor service (its model is
/// `compress_model`, not a registry task). Both fall back to the intent
/// model so they always resolve to a known id.
fn build_task_models(intent_model: String, answer_simple: String, answer_complex: String) -> HashMap<Task, String> {
    let mut map = HashMap::new();
    map.insert(Task::AnswerGenerationSimple, answer_simple);
    map.insert(Task::AnswerGenerationComplex, answer_complex);
    map.insert(Task::MetadataExtraction, intent_model.clone());
    map.insert(Task::Compression, intent_model.clone());
    map.insert(Task::IntentDetection, intent_model);
    map
}

fn build_models(intent_model: String, answer_simple: String, answer_complex: String) -> Vec<ModelInfo> {
    let mut seen = std::collections::HashSet::new();
    let mut models = Vec::new();
    for (env_name, model_id) in [
        ("INTENT_MODEL", intent_model),
        ("ANSWER_MODEL_SIMPLE", answer_simple),
        ("ANSWER_MODEL_COMPLEX", answer_complex),
    ] {
        if model_id.is_empty() || !seen.insert(model_id.clone()) {
            continue;
        }
        let provider_env = format!("{env_name}_PROVIDER");
        models.push(ModelInfo {
            model_id,
            provider: env_or(&provider_env, "nebius"),
            embedding_dimension: None,
            price_per_million_input_tokens: 0.0,
            price_per_million_output_tokens: 0.0,
            emits_reasoning_tags: std::env::var(format!("{env_name}_EMITS_REASONING_TAGS"))
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            reasoning_strip_pattern: std::env::var(format!("{env_name}_REASONING_STRIP_PATTERN")).ok(),
        });
    }
    models
}

fn build_provider_keys() -> HashMap<String, String> {
    let mut keys = HashMap::new();
    if let Ok(key) = std::env::var("LLM_GATEWAY_API_KEY") {
        for env_name in ["INTENT_MODEL_PROVIDER", "ANSWER_MODEL_SIMPLE_PROVIDER", "ANSWER_MODEL_COMPLEX_PROVIDER"] {
            keys.insert(env_or(env_name, "nebius"), key.clone());
        }
    }
    keys
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn require_env(name: &str, errors: &mut Vec<String>) -> String {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            errors.push(format!("{name} is required"));
            String::new()
        }
    }
}

fn parse_env_or<T>(name: &str, default: T, errors: &mut Vec<String>) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(e) => {
                errors.push(format!("{name}: {e}"));
                default
            }
        },
        Err(_) => default,
    }
}
