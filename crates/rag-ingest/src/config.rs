//! Environment-variable driven configuration for the ingestion service.
//!
//! Follows `rag_core::config::SharedConfig::load()`'s collect-all-errors
//! convention: every missing or malformed variable is reported together
//! instead of failing on the first one encountered.

use std::collections::HashMap;
use std::time::Duration;

use rag_core::{Environment, ModelInfo, PipelineError, RegistryConfig, Result, ServiceEndpoint, Task};

/// Top-level configuration for the `rag-ingest` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub registry_config: RegistryConfig,
    pub environment: Environment,
    pub provider_api_keys: HashMap<String, String>,
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    pub gateway_concurrency: usize,
    pub embeddings_concurrency: usize,
    pub ingest_concurrency: usize,
    pub health_check_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        let mut errors = Vec::new();

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:8071");

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

        let task_models = build_task_models("METADATA_MODEL", &mut errors);
        let models = build_models(&mut errors);
        let provider_api_keys = build_provider_keys();

        let cache_ttl_seconds = parse_env_or("CACHE_TTL_SECONDS", 3600, &mut errors);
        let cache_max_size = parse_env_or("CACHE_MAX_SIZE", 5000, &mut errors);
        let gateway_concurrency = parse_env_or("GATEWAY_CONCURRENCY", 20, &mut errors);
        let embeddings_concurrency = parse_env_or("EMBEDDINGS_CONCURRENCY", 50, &mut errors);
        let ingest_concurrency = parse_env_or("INGEST_CONCURRENCY", 10, &mut errors);
        let health_check_timeout_secs: u64 = parse_env_or("HEALTH_CHECK_TIMEOUT_SECONDS", 2, &mut errors);
        let request_timeout_secs: u64 = parse_env_or("REQUEST_TIMEOUT_SECONDS", 60, &mut errors);

        if !errors.is_empty() {
            return Err(PipelineError::Internal(format!(
                "rag-ingest configuration errors: {}",
                errors.join("; ")
            )));
        }

        let registry_config = RegistryConfig {
            task_models,
            models,
            services: vec![
                ServiceEndpoint {
                    name: "llm_gateway".to_string(),
                    base_url: llm_gateway_url,
                },
                ServiceEndpoint {
                    name: "vector_store".to_string(),
                    base_url: vector_store_url,
                },
                ServiceEndpoint {
                    name: "embedder".to_string(),
                    base_url: embedder_url,
                },
            ],
        };

        Ok(Self {
            bind_addr,
            registry_config,
            environment,
            provider_api_keys,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            cache_max_size,
            gateway_concurrency,
            embeddings_concurrency,
            ingest_concurrency,
            health_check_timeout: Duration::from_secs(health_check_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

/// Builds the five required `task_models` entries, all pointing at the
/// metadata-extraction model id since ingestion only ever calls the
/// gateway for metadata extraction. Answer/intent models are irrelevant
/// here but the registry requires all five to be present.
fn build_task_models(metadata_env: &str, errors: &mut Vec<String>) -> HashMap<Task, String> {
    let model_id = require_env(metadata_env, errors);
    let mut map = HashMap::new();
    map.insert(Task::MetadataExtraction, model_id.clone());
    map.insert(Task::IntentDetection, model_id.clone());
    map.insert(Task::AnswerGenerationSimple, model_id.clone());
    map.insert(Task::AnswerGenerationComplex, model_id.clone());
    map.insert(Task::Compression, model_id);
    map
}

fn build_models(errors: &mut Vec<String>) -> Vec<ModelInfo> {
    let model_id = require_env("METADATA_MODEL", errors);
    let provider = env_or("METADATA_MODEL_PROVIDER", "nebius");
    let price_in = parse_env_or("METADATA_MODEL_PRICE_INPUT_USD_PER_MILLION", 0.1, errors);
    let price_out = parse_env_or("METADATA_MODEL_PRICE_OUTPUT_USD_PER_MILLION", 0.3, errors);

    vec![ModelInfo {
        model_id,
        provider,
        embedding_dimension: None,
        price_per_million_input_tokens: price_in,
        price_per_million_output_tokens: price_out,
        emits_reasoning_tags: std::env::var("METADATA_MODEL_EMITS_REASONING_TAGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
        reasoning_strip_pattern: std::env::var("METADATA_MODEL_REASONING_STRIP_PATTERN").ok(),
    }]
}

fn build_provider_keys() -> HashMap<String, String> {
    let mut keys = HashMap::new();
    if let Ok(key) = std::env::var("LLM_GATEWAY_API_KEY") {
        let provider = env_or("METADATA_MODEL_PROVIDER", "nebius");
        keys.insert(provider, key);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_vars_are_enumerated_together() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("LLM_GATEWAY_URL");
        std::env::remove_var("VECTOR_STORE_URL");
        std::env::remove_var("EMBEDDER_URL");
        std::env::remove_var("METADATA_MODEL");
        let err = Config::load().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("LLM_GATEWAY_URL"));
        assert!(message.contains("VECTOR_STORE_URL"));
        assert!(message.contains("EMBEDDER_URL"));
        assert!(message.contains("METADATA_MODEL"));
    }

    #[test]
    fn loads_with_all_required_vars_set() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("LLM_GATEWAY_URL", "http://localhost:8075");
        std::env::set_var("VECTOR_STORE_URL", "http://localhost:19530");
        std::env::set_var("EMBEDDER_URL", "http://localhost:8070");
        std::env::set_var("METADATA_MODEL", "fast-model");

        let cfg = Config::load().unwrap();
        assert_eq!(cfg.registry_config.services.len(), 3);
        assert_eq!(cfg.ingest_concurrency, 10);

        std::env::remove_var("LLM_GATEWAY_URL");
        std::env::remove_var("VECTOR_STORE_URL");
        std::env::remove_var("EMBEDDER_URL");
        std::env::remove_var("METADATA_MODEL");
    }
}
