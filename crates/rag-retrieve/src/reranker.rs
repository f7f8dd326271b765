//! Thin HTTP client for the external reranking service. Reranking model
//! inference itself is out of scope (spec.md §1); this wraps the documented
//! chunk-reranking request/response shape (`reranking_api.py`'s
//! `RerankChunksRequest`/`RerankChunksResponse`).

use std::time::Duration;

use async_trait::async_trait;
use rag_core::{PipelineError, Result};
use serde::{Deserialize, Serialize};

use crate::types::ContextChunk;

/// Reranks a set of candidate chunks against a query, returning the top `top_k`
/// sorted by descending relevance.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, chunks: Vec<ContextChunk>, top_k: u32) -> Result<Vec<ContextChunk>>;
}

/// HTTP-backed [`Reranker`] calling a registry-independent reranker URL
/// (rerank/compress are optional stages, not `Registry::REQUIRED_SERVICES`).
pub struct HttpReranker {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpReranker {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self { http, base_url, timeout }
    }
}

#[derive(Debug, Serialize)]
struct ChunkInput<'a> {
    chunk_id: &'a str,
    text: &'a str,
    document_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RerankChunksRequest<'a> {
    query: &'a str,
    chunks: Vec<ChunkInput<'a>>,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct RerankChunk {
    chunk_id: String,
    text: String,
    relevance_score: f32,
    document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RerankChunksResponse {
    reranked_chunks: Vec<RerankChunk>,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, chunks: Vec<ContextChunk>, top_k: u32) -> Result<Vec<ContextChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let by_id: std::collections::HashMap<&str, &ContextChunk> =
            chunks.iter().map(|c| (c.chunk_id.as_str(), c)).collect();

        let body = RerankChunksRequest {
            query,
            chunks: chunks
                .iter()
                .map(|c| ChunkInput { chunk_id: &c.chunk_id, text: &c.text, document_id: &c.document_id })
                .collect(),
            top_k,
        };

        let resp = self
            .http
            .post(format!("{}/v1/rerank", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        if resp.status().is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::InvalidArgument(text));
        }
        if resp.status().is_server_error() {
            return Err(PipelineError::UpstreamError(format!("reranker returned {}", resp.status())));
        }

        let parsed: RerankChunksResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::ParseError(format!("could not parse reranker response: {e}")))?;

        let reranked = parsed
            .reranked_chunks
            .into_iter()
            .filter_map(|r| {
                let original = by_id.get(r.chunk_id.as_str())?;
                Some(ContextChunk {
                    chunk_id: r.chunk_id,
                    document_id: r.document_id.unwrap_or_else(|| original.document_id.clone()),
                    chunk_index: original.chunk_index,
                    text: r.text,
                    score: r.relevance_score,
                    topics: original.topics.clone(),
                    keywords: original.keywords.clone(),
                    questions: original.questions.clone(),
                    summary: original.summary.clone(),
                })
            })
            .collect();

        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_chunk(id: &str, text: &str) -> ContextChunk {
        ContextChunk {
            chunk_id: id.to_string(),
            document_id: "doc-1".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score: 0.5,
            topics: String::new(),
            keywords: String::new(),
            questions: String::new(),
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn rerank_returns_server_order_with_scores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "reranked_chunks": [
                    {"chunk_id": "b", "text": "Machine learning basics", "relevance_score": 0.95, "document_id": "doc-1"},
                    {"chunk_id": "a", "text": "Unrelated text", "relevance_score": 0.2, "document_id": "doc-1"}
                ],
                "num_input_chunks": 2,
                "reranking_time_ms": 12.0
            })))
            .mount(&server)
            .await;

        let reranker = HttpReranker::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5));
        let chunks = vec![sample_chunk("a", "Unrelated text"), sample_chunk("b", "Machine learning basics")];
        let result = reranker.rerank("what is ML", chunks, 2).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].chunk_id, "b");
        assert!((result[0].score - 0.95).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let server = MockServer::start().await;
        let reranker = HttpReranker::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5));
        let result = reranker.rerank("q", Vec::new(), 3).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn server_error_maps_to_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/v1/rerank")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let reranker = HttpReranker::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5));
        let err = reranker.rerank("q", vec![sample_chunk("a", "x")], 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamError(_)));
    }
}
