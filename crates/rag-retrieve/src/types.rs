//! Request/response bodies for the retrieval HTTP surface, matching the
//! `/v1/retrieve`, `/v1/analyze`, `/v1/search`, and `/v1/stats` field names.

use serde::{Deserialize, Serialize};

use rag_intent::ResponseStyle;

fn default_true() -> bool {
    true
}

fn default_search_top_k() -> u32 {
    10
}

fn default_rerank_top_k() -> u32 {
    3
}

fn default_max_context_chunks() -> u32 {
    5
}

fn default_compression_ratio() -> f32 {
    0.5
}

fn default_score_threshold() -> f32 {
    0.3
}

fn default_response_format() -> String {
    "markdown".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

/// `POST /v1/retrieve` request body (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    pub collection_name: String,
    pub tenant_id: Option<String>,
    #[serde(default = "default_search_top_k")]
    pub search_top_k: u32,
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: u32,
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: u32,
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_true")]
    pub use_metadata_boost: bool,
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
    #[serde(default)]
    pub enable_compression: bool,
    #[serde(default)]
    pub enable_citations: bool,
    #[serde(default)]
    pub stream: bool,
    pub response_style: Option<ResponseStyle>,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// A single chunk of retrieved text carried through rerank/compress into the
/// answer-generation prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ContextChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub score: f32,
    pub topics: String,
    pub keywords: String,
    pub questions: String,
    pub summary: String,
}

/// A citation surfaced alongside the generated answer.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source_id: u32,
    pub chunk_id: String,
    pub document_id: String,
    pub text_snippet: String,
}

/// Per-stage timing, matching the ingestion response's `StageReport` shape.
/// `intent` and `search` run concurrently; the reported critical-path
/// contribution is `max(intent.duration_ms, search.duration_ms)`, not their
/// sum (spec.md §4.9).
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub duration_ms: u64,
    pub model: Option<String>,
    pub items: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrieveStages {
    pub intent: StageReport,
    pub search: StageReport,
    pub rerank: Option<StageReport>,
    pub compress: Option<StageReport>,
    pub answer: StageReport,
}

/// `POST /v1/retrieve` response body (spec.md §6), used for the non-streaming
/// path. The streaming path (`stream: true`) instead returns
/// `text/event-stream` with OpenAI-compatible delta chunks.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub success: bool,
    pub query: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub context_chunks: Vec<ContextChunk>,
    pub stages: RetrieveStages,
    pub total_time_ms: u64,
    pub search_results_count: u32,
    pub reranked_count: u32,
    pub compressed_count: u32,
    pub context_count: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `GET /v1/stats?hours=N` response: trailing-window log counts plus the
/// live pattern-matcher counters (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub window_hours: u32,
    pub rejected_count: usize,
    pub low_confidence_count: usize,
    pub total_queries: u64,
    pub pattern_hits: u64,
    pub llm_fallbacks: u64,
    pub multi_intent_queries: u64,
    pub conflict_resolutions: u64,
    pub avg_confidence: f64,
    pub pattern_hit_rate: f64,
    pub llm_fallback_rate: f64,
    pub multi_intent_rate: f64,
}
