//! Thin HTTP client for the external context-compression service. Summarizing
//! model inference itself is out of scope (spec.md §1); this wraps the
//! documented request/response shape (`compression_api.py`'s
//! `CompressionRequest`/`CompressionResponse`).

use std::time::Duration;

use async_trait::async_trait;
use rag_core::{PipelineError, Result};
use serde::{Deserialize, Serialize};

use crate::types::ContextChunk;

/// Shortens a set of chunks relative to `query`, dropping any chunk whose
/// relevance score falls below `score_threshold`.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        query: &str,
        chunks: Vec<ContextChunk>,
        compression_ratio: f32,
        score_threshold: f32,
    ) -> Result<Vec<ContextChunk>>;
}

/// HTTP-backed [`Compressor`] calling a registry-independent compressor URL.
pub struct HttpCompressor {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens_per_chunk: u32,
    timeout: Duration,
}

impl HttpCompressor {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, model: String, max_tokens_per_chunk: u32, timeout: Duration) -> Self {
        Self { http, base_url, model, max_tokens_per_chunk, timeout }
    }
}

#[derive(Debug, Serialize)]
struct ChunkInput<'a> {
    id: &'a str,
    text: &'a str,
    document_id: &'a str,
    summary: &'a str,
    keywords: &'a str,
    relevance_score: f32,
}

#[derive(Debug, Serialize)]
struct CompressionRequest<'a> {
    chunks: Vec<ChunkInput<'a>>,
    question: &'a str,
    compression_ratio: f32,
    max_tokens_per_chunk: u32,
    model: &'a str,
    score_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct CompressedChunk {
    id: String,
    compressed_text: String,
}

#[derive(Debug, Deserialize)]
struct CompressionResponse {
    compressed_chunks: Vec<CompressedChunk>,
}

#[async_trait]
impl Compressor for HttpCompressor {
    async fn compress(
        &self,
        query: &str,
        chunks: Vec<ContextChunk>,
        compression_ratio: f32,
        score_threshold: f32,
    ) -> Result<Vec<ContextChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let by_id: std::collections::HashMap<&str, &ContextChunk> =
            chunks.iter().map(|c| (c.chunk_id.as_str(), c)).collect();

        let body = CompressionRequest {
            chunks: chunks
                .iter()
                .map(|c| ChunkInput {
                    id: &c.chunk_id,
                    text: &c.text,
                    document_id: &c.document_id,
                    summary: &c.summary,
                    keywords: &c.keywords,
                    relevance_score: c.score,
                })
                .collect(),
            question: query,
            compression_ratio,
            max_tokens_per_chunk: self.max_tokens_per_chunk,
            model: &self.model,
            score_threshold,
        };

        let resp = self
            .http
            .post(format!("{}/v1/compress", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        if resp.status().is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::InvalidArgument(text));
        }
        if resp.status().is_server_error() {
            return Err(PipelineError::UpstreamError(format!("compressor returned {}", resp.status())));
        }

        let parsed: CompressionResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::ParseError(format!("could not parse compressor response: {e}")))?;

        let compressed = parsed
            .compressed_chunks
            .into_iter()
            .filter_map(|c| {
                let original = by_id.get(c.id.as_str())?;
                Some(ContextChunk { text: c.compressed_text, ..(*original).clone() })
            })
            .collect();

        Ok(compressed)
    }
}
