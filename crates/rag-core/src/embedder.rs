//! Thin HTTP client for the external embedding service. Embedding model
//! inference itself is out of scope (spec.md §1); this wraps the documented
//! request/response shape with a timeout and the embeddings semaphore.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::registry::Registry;

/// Batched embedding request/response transport.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts` using `model`, returning one dense vector per input in
    /// the same order. Batches of more than 100 texts are the caller's
    /// responsibility to split (ingestion orchestrator enforces this).
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// HTTP-backed [`Embedder`] calling the registry-resolved `embedder` service.
pub struct HttpEmbedder {
    http: reqwest::Client,
    registry: std::sync::Arc<Registry>,
    timeout: Duration,
}

impl HttpEmbedder {
    #[must_use]
    pub fn new(http: reqwest::Client, registry: std::sync::Arc<Registry>, timeout: Duration) -> Self {
        Self { http, registry, timeout }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let base_url = self
            .registry
            .service_url("embedder")
            .ok_or_else(|| PipelineError::Internal("embedder service url not configured".to_string()))?;

        let resp = self
            .http
            .post(format!("{base_url}/v1/embeddings"))
            .timeout(self.timeout)
            .json(&EmbedRequest { model, input: texts })
            .send()
            .await?;

        if resp.status().is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::InvalidArgument(text));
        }
        if resp.status().is_server_error() {
            return Err(PipelineError::UpstreamError(format!(
                "embedder returned {}",
                resp.status()
            )));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::ParseError(format!("could not parse embedder response: {e}")))?;

        if body.embeddings.len() != texts.len() {
            return Err(PipelineError::UpstreamError(format!(
                "embedder returned {} vectors for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Environment, ModelInfo, RegistryConfig, ServiceEndpoint, Task};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry_for(url: &str) -> std::sync::Arc<Registry> {
        let mut task_models = HashMap::new();
        task_models.insert(Task::IntentDetection, "m".to_string());
        task_models.insert(Task::AnswerGenerationSimple, "m".to_string());
        task_models.insert(Task::AnswerGenerationComplex, "m".to_string());
        task_models.insert(Task::MetadataExtraction, "m".to_string());
        task_models.insert(Task::Compression, "m".to_string());
        let config = RegistryConfig {
            task_models,
            models: vec![ModelInfo {
                model_id: "m".to_string(),
                provider: "nebius".to_string(),
                embedding_dimension: Some(8),
                price_per_million_input_tokens: 0.0,
                price_per_million_output_tokens: 0.0,
                emits_reasoning_tags: false,
                reasoning_strip_pattern: None,
            }],
            services: vec![
                ServiceEndpoint { name: "llm_gateway".to_string(), base_url: "http://localhost:8075".to_string() },
                ServiceEndpoint { name: "vector_store".to_string(), base_url: "http://localhost:19530".to_string() },
                ServiceEndpoint { name: "embedder".to_string(), base_url: url.to_string() },
            ],
        };
        std::sync::Arc::new(Registry::build(Environment::Dev, config).unwrap())
    }

    #[tokio::test]
    async fn embed_returns_vectors_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(reqwest::Client::new(), registry_for(&server.uri()), Duration::from_secs(5));
        let result = embedder
            .embed("embed-model", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let server = MockServer::start().await;
        let embedder = HttpEmbedder::new(reqwest::Client::new(), registry_for(&server.uri()), Duration::from_secs(5));
        let result = embedder.embed("embed-model", &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn mismatched_vector_count_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(reqwest::Client::new(), registry_for(&server.uri()), Duration::from_secs(5));
        let err = embedder
            .embed("embed-model", &["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamError(_)));
    }
}
