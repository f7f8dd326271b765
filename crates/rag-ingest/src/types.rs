//! Request/response bodies for the ingestion HTTP surface, matching the
//! `/v1/ingest` field names exactly.

use serde::{Deserialize, Serialize};

use rag_text_splitters::ChunkingMethod;

/// Where (if anywhere) freshly ingested chunks should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Chunk and extract metadata/embeddings but do not persist.
    None,
    /// Create the collection if absent, then insert.
    NewCollection,
    /// Insert into a collection that must already exist.
    Existing,
}

fn default_true() -> bool {
    true
}

fn default_keywords_count() -> u32 {
    8
}

fn default_topics_count() -> u32 {
    4
}

fn default_questions_count() -> u32 {
    3
}

fn default_summary_length() -> u32 {
    2
}

/// `POST /v1/ingest` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    pub document_id: String,
    pub collection_name: String,
    pub tenant_id: Option<String>,
    #[serde(default = "default_chunking_method")]
    pub chunking_method: ChunkingMethod,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    pub separators: Option<Vec<String>>,
    pub markdown_headers: Option<Vec<u8>>,
    pub encoding: Option<String>,
    #[serde(default = "default_true")]
    pub generate_metadata: bool,
    #[serde(default = "default_keywords_count")]
    pub keywords_count: u32,
    #[serde(default = "default_topics_count")]
    pub topics_count: u32,
    #[serde(default = "default_questions_count")]
    pub questions_count: u32,
    #[serde(default = "default_summary_length")]
    pub summary_length: u32,
    #[serde(default = "default_true")]
    pub generate_embeddings: bool,
    pub embedding_model: String,
    pub storage_mode: StorageMode,
}

fn default_chunking_method() -> ChunkingMethod {
    ChunkingMethod::Recursive
}

fn default_max_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

/// Per-stage timing and model-id bookkeeping for an ingest response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStages {
    pub chunking: StageReport,
    pub metadata: StageReport,
    pub embeddings: StageReport,
    pub storage: StageReport,
}

/// A single pipeline stage's duration and, where applicable, the model it
/// called and how many items it touched and failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub duration_ms: u64,
    pub model: Option<String>,
    pub items: u32,
    pub failed: u32,
}

/// `POST /v1/ingest` response body.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub document_id: String,
    pub collection_name: String,
    pub chunks_created: u32,
    pub chunks_inserted: u32,
    pub processing_time_ms: u64,
    pub stages: IngestStages,
}

/// `POST /v1/collections` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub dimension: u32,
    pub metadata_model_used: Option<String>,
    pub embedding_model_used: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCollectionResponse {
    pub name: String,
    pub created: bool,
}

/// `PUT /v1/documents/{id}` request body: a full re-chunk-and-replace.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDocumentRequest {
    pub text: String,
    pub collection_name: String,
    pub tenant_id: Option<String>,
    #[serde(default = "default_chunking_method")]
    pub chunking_method: ChunkingMethod,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    pub separators: Option<Vec<String>>,
    pub markdown_headers: Option<Vec<u8>>,
    #[serde(default = "default_true")]
    pub generate_metadata: bool,
    #[serde(default = "default_keywords_count")]
    pub keywords_count: u32,
    #[serde(default = "default_topics_count")]
    pub topics_count: u32,
    #[serde(default = "default_questions_count")]
    pub questions_count: u32,
    #[serde(default = "default_summary_length")]
    pub summary_length: u32,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateDocumentResponse {
    pub document_id: String,
    pub chunks_deleted: u32,
    pub chunks_inserted: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub deleted: u32,
}
