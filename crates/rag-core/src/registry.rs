//! Model & Service Registry (C1): environment-aware resolution of model ids
//! and service endpoints. Registry lookup is O(1) and pure; construction
//! fails loudly and enumerates every missing entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Deployment environment tag selected once at process startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl std::str::FromStr for Environment {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" => Ok(Environment::Prod),
            other => Err(PipelineError::InvalidArgument(format!(
                "PIPELINE_ENV must be one of dev|staging|prod, got {other}"
            ))),
        }
    }
}

/// The four logical tasks the registry resolves to a concrete model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    IntentDetection,
    AnswerGenerationSimple,
    AnswerGenerationComplex,
    MetadataExtraction,
    Compression,
}

/// Per-model metadata the registry exposes alongside the model id.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub model_id: String,
    pub provider: String,
    /// Dense embedding dimension, only meaningful for embedding models.
    pub embedding_dimension: Option<u32>,
    pub price_per_million_input_tokens: f64,
    pub price_per_million_output_tokens: f64,
    pub emits_reasoning_tags: bool,
    /// Regex matching reasoning spans to strip, e.g. `(?is)<think>.*?</think>`.
    pub reasoning_strip_pattern: Option<String>,
}

/// A single named downstream service (base URL only; the registry does not
/// know about paths).
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub name: String,
    pub base_url: String,
}

/// Environment-aware resolution of model ids and service endpoints. Built
/// once at startup from [`RegistryConfig`] and shared read-only thereafter.
#[derive(Debug, Clone)]
pub struct Registry {
    environment: Environment,
    task_models: HashMap<Task, String>,
    models: HashMap<String, ModelInfo>,
    services: HashMap<String, ServiceEndpoint>,
}

/// Raw configuration the registry is built from; mirrors what would be
/// loaded from environment variables or a config file per environment.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub task_models: HashMap<Task, String>,
    pub models: Vec<ModelInfo>,
    pub services: Vec<ServiceEndpoint>,
}

const REQUIRED_TASKS: [Task; 5] = [
    Task::IntentDetection,
    Task::AnswerGenerationSimple,
    Task::AnswerGenerationComplex,
    Task::MetadataExtraction,
    Task::Compression,
];

const REQUIRED_SERVICES: [&str; 3] = ["llm_gateway", "vector_store", "embedder"];

impl Registry {
    /// Build the registry, failing loudly with every missing required entry
    /// enumerated in a single error rather than one at a time.
    pub fn build(environment: Environment, config: RegistryConfig) -> Result<Self> {
        let mut missing = Vec::new();

        for task in REQUIRED_TASKS {
            if !config.task_models.contains_key(&task) {
                missing.push(format!("task_models[{task:?}]"));
            }
        }

        let services: HashMap<String, ServiceEndpoint> = config
            .services
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        for required in REQUIRED_SERVICES {
            if !services.contains_key(required) {
                missing.push(format!("services[{required}]"));
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::Internal(format!(
                "registry missing required entries for environment {environment:?}: {}",
                missing.join(", ")
            )));
        }

        let models: HashMap<String, ModelInfo> = config
            .models
            .into_iter()
            .map(|m| (m.model_id.clone(), m))
            .collect();

        for (task, model_id) in &config.task_models {
            if !models.contains_key(model_id) {
                return Err(PipelineError::Internal(format!(
                    "task {task:?} resolves to unknown model id {model_id}"
                )));
            }
        }

        Ok(Self {
            environment,
            task_models: config.task_models,
            models,
            services,
        })
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Resolve a logical task to its concrete model id. Pure, O(1).
    #[must_use]
    pub fn model_for_task(&self, task: Task) -> Option<&str> {
        self.task_models.get(&task).map(String::as_str)
    }

    /// Look up per-model metadata by model id.
    #[must_use]
    pub fn model_info(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.get(model_id)
    }

    /// Derive the provider for a model id (used by the LLM gateway to route
    /// requests to provider-native endpoints).
    #[must_use]
    pub fn provider_for_model(&self, model_id: &str) -> Option<&str> {
        self.models.get(model_id).map(|m| m.provider.as_str())
    }

    /// Resolve a named downstream service's base URL.
    #[must_use]
    pub fn service_url(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(|s| s.base_url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RegistryConfig {
        let mut task_models = HashMap::new();
        task_models.insert(Task::IntentDetection, "fast-model".to_string());
        task_models.insert(Task::AnswerGenerationSimple, "fast-model".to_string());
        task_models.insert(Task::AnswerGenerationComplex, "reasoning-model".to_string());
        task_models.insert(Task::MetadataExtraction, "fast-model".to_string());
        task_models.insert(Task::Compression, "fast-model".to_string());

        RegistryConfig {
            task_models,
            models: vec![
                ModelInfo {
                    model_id: "fast-model".to_string(),
                    provider: "nebius".to_string(),
                    embedding_dimension: None,
                    price_per_million_input_tokens: 0.1,
                    price_per_million_output_tokens: 0.2,
                    emits_reasoning_tags: false,
                    reasoning_strip_pattern: None,
                },
                ModelInfo {
                    model_id: "reasoning-model".to_string(),
                    provider: "sambanova".to_string(),
                    embedding_dimension: None,
                    price_per_million_input_tokens: 0.5,
                    price_per_million_output_tokens: 1.5,
                    emits_reasoning_tags: true,
                    reasoning_strip_pattern: Some("(?is)<think>.*?</think>".to_string()),
                },
            ],
            services: vec![
                ServiceEndpoint {
                    name: "llm_gateway".to_string(),
                    base_url: "http://localhost:8075".to_string(),
                },
                ServiceEndpoint {
                    name: "vector_store".to_string(),
                    base_url: "http://localhost:19530".to_string(),
                },
                ServiceEndpoint {
                    name: "embedder".to_string(),
                    base_url: "http://localhost:8070".to_string(),
                },
            ],
        }
    }

    #[test]
    fn builds_successfully_with_all_required_entries() {
        let registry = Registry::build(Environment::Dev, sample_config()).unwrap();
        assert_eq!(registry.model_for_task(Task::IntentDetection), Some("fast-model"));
    }

    #[test]
    fn missing_task_fails_loudly_and_enumerates() {
        let mut config = sample_config();
        config.task_models.remove(&Task::Compression);
        let err = Registry::build(Environment::Dev, config).unwrap_err();
        assert!(err.to_string().contains("Compression"));
    }

    #[test]
    fn missing_service_fails_loudly() {
        let mut config = sample_config();
        config.services.retain(|s| s.name != "embedder");
        let err = Registry::build(Environment::Dev, config).unwrap_err();
        assert!(err.to_string().contains("embedder"));
    }

    #[test]
    fn unknown_task_model_id_fails() {
        let mut config = sample_config();
        config
            .task_models
            .insert(Task::Compression, "nonexistent-model".to_string());
        let err = Registry::build(Environment::Dev, config).unwrap_err();
        assert!(err.to_string().contains("nonexistent-model"));
    }

    #[test]
    fn provider_for_model_resolves() {
        let registry = Registry::build(Environment::Dev, sample_config()).unwrap();
        assert_eq!(registry.provider_for_model("reasoning-model"), Some("sambanova"));
    }

    #[test]
    fn service_url_resolves() {
        let registry = Registry::build(Environment::Dev, sample_config()).unwrap();
        assert_eq!(registry.service_url("llm_gateway"), Some("http://localhost:8075"));
    }

    #[test]
    fn environment_from_str_accepts_known_values() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
    }

    #[test]
    fn environment_from_str_rejects_unknown() {
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn model_info_exposes_reasoning_strip_pattern() {
        let registry = Registry::build(Environment::Dev, sample_config()).unwrap();
        let info = registry.model_info("reasoning-model").unwrap();
        assert!(info.emits_reasoning_tags);
        assert!(info.reasoning_strip_pattern.is_some());
    }
}
