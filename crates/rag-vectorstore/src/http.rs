//! HTTP-backed [`VectorStore`] implementation. Speaks a plain JSON
//! CRUD+search contract to the external vector engine; the engine itself
//! (schema storage, ANN index, persistence) is out of scope (spec.md §1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rag_core::{Chunk, HnswParams, MetadataFields, PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::schema::{generate_collection_description, TENANT_PARTITION_COUNT};
use crate::store::{scope_to_tenant, ChunkUpdate, EnsureOutcome, SearchHit, VectorStore};

/// HTTP adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpVectorStoreConfig {
    pub base_url: String,
    pub hnsw: HnswParams,
    pub request_timeout: Duration,
    /// Flush after insert, trading write latency for immediate search
    /// visibility. Defaults to `true`, matching the source's `flush=True`.
    pub flush_after_insert: bool,
}

impl Default for HttpVectorStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:19530".to_string(),
            hnsw: HnswParams::default(),
            request_timeout: Duration::from_secs(30),
            flush_after_insert: true,
        }
    }
}

/// Thin HTTP client over the vector engine's CRUD+search API.
pub struct HttpVectorStore {
    http: reqwest::Client,
    config: HttpVectorStoreConfig,
    /// Collections known to exist this process, avoiding a round trip on
    /// every insert's `EnsureCollection` call. Best-effort: a collection
    /// created by another process is still discovered via the existence
    /// check on first use here.
    known_collections: Arc<tokio::sync::RwLock<HashMap<String, u32>>>,
}

impl HttpVectorStore {
    #[must_use]
    pub fn new(http: reqwest::Client, config: HttpVectorStoreConfig) -> Self {
        Self {
            http,
            config,
            known_collections: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn existing_dimension(&self, name: &str) -> Result<Option<u32>> {
        if let Some(dim) = self.known_collections.read().await.get(name).copied() {
            return Ok(Some(dim));
        }
        let resp = self
            .http
            .get(self.url(&format!("/collections/{name}")))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "collection lookup failed with status {}",
                resp.status()
            )));
        }
        let body: CollectionDescribe = resp.json().await.map_err(|e| {
            PipelineError::ParseError(format!("could not parse collection describe response: {e}"))
        })?;
        self.known_collections.write().await.insert(name.to_string(), body.dimension);
        Ok(Some(body.dimension))
    }

    async fn query_rows(&self, name: &str, filter: &str) -> Result<Vec<ChunkRow>> {
        let resp = self
            .http
            .post(self.url(&format!("/collections/{name}/query")))
            .timeout(self.config.request_timeout)
            .json(&json!({ "filter": filter, "output_fields": ALL_OUTPUT_FIELDS }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "query failed with status {}",
                resp.status()
            )));
        }
        let body: QueryResponse = resp.json().await.map_err(|e| {
            PipelineError::ParseError(format!("could not parse query response: {e}"))
        })?;
        Ok(body.rows)
    }
}

const ALL_OUTPUT_FIELDS: &[&str] = &[
    "id", "document_id", "chunk_index", "text", "tenant_id", "created_at", "updated_at",
    "char_count", "token_count", "keywords", "topics", "questions", "summary",
    "semantic_keywords", "entity_relationships", "attributes",
];

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn ensure_collection(&self, name: &str, dimension: u32, description: &str) -> Result<EnsureOutcome> {
        if let Some(existing_dim) = self.existing_dimension(name).await? {
            if existing_dim != dimension {
                return Err(PipelineError::InvalidArgument(format!(
                    "collection {name} already exists with dimension {existing_dim}, requested {dimension}"
                )));
            }
            return Ok(EnsureOutcome::AlreadyExists);
        }

        let resp = self
            .http
            .post(self.url("/collections"))
            .timeout(self.config.request_timeout)
            .json(&json!({
                "name": name,
                "dimension": dimension,
                "description": description,
                "partition_key": "tenant_id",
                "partition_count": TENANT_PARTITION_COUNT,
                "metric_type": "IP",
                "index": {
                    "type": "HNSW",
                    "m": self.config.hnsw.m,
                    "ef_construction": self.config.hnsw.ef_construction,
                },
                "scalar_index_fields": ["document_id"],
            }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Ok(EnsureOutcome::AlreadyExists);
        }
        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "collection creation failed with status {}",
                resp.status()
            )));
        }

        self.known_collections.write().await.insert(name.to_string(), dimension);
        tracing::info!(collection = name, dimension, "collection created");
        Ok(EnsureOutcome::Created)
    }

    async fn insert(&self, name: &str, chunks: &[Chunk], auto_create: bool) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let dimension = chunks
            .iter()
            .find(|c| !c.dense_vector.is_empty())
            .map_or(0, |c| c.dense_vector.len() as u32);

        if auto_create {
            let description = generate_collection_description(dimension, None, None);
            self.ensure_collection(name, dimension, &description).await?;
        }

        let columns = column_orient(chunks, dimension);

        let resp = self
            .http
            .post(self.url(&format!("/collections/{name}/insert")))
            .timeout(self.config.request_timeout)
            .json(&json!({ "fields": columns, "flush": self.config.flush_after_insert }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "insert failed with status {}",
                resp.status()
            )));
        }

        Ok(chunks.len())
    }

    async fn delete_by_filter(&self, name: &str, expr: &str, tenant_id: Option<&str>) -> Result<usize> {
        let scoped = scope_to_tenant(expr, tenant_id);
        let matching = self.query_rows(name, &scoped).await?;
        if matching.is_empty() {
            return Ok(0);
        }

        let resp = self
            .http
            .post(self.url(&format!("/collections/{name}/delete")))
            .timeout(self.config.request_timeout)
            .json(&json!({ "filter": scoped }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "delete failed with status {}",
                resp.status()
            )));
        }

        Ok(matching.len())
    }

    async fn update(&self, name: &str, filter: &str, updates: &ChunkUpdate, tenant_id: Option<&str>) -> Result<usize> {
        let scoped = scope_to_tenant(filter, tenant_id);
        let rows = self.query_rows(name, &scoped).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mutated: Vec<Chunk> = rows
            .into_iter()
            .map(|row| apply_update(row, updates, now))
            .collect();

        let resp = self
            .http
            .post(self.url(&format!("/collections/{name}/delete")))
            .timeout(self.config.request_timeout)
            .json(&json!({ "filter": scoped }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "update's delete phase failed with status {}",
                resp.status()
            )));
        }

        self.insert(name, &mutated, false).await
    }

    async fn search(
        &self,
        name: &str,
        dense_query: &[f32],
        filter_expr: Option<&str>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let scoped = scope_to_tenant(filter_expr.unwrap_or(""), tenant_id);
        let resp = self
            .http
            .post(self.url(&format!("/collections/{name}/search")))
            .timeout(self.config.request_timeout)
            .json(&json!({
                "vector": dense_query,
                "filter": scoped,
                "limit": limit,
                "output_fields": ALL_OUTPUT_FIELDS,
                "metric_type": "IP",
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::UpstreamError(format!(
                "search failed with status {}",
                resp.status()
            )));
        }

        let body: SearchResponse = resp.json().await.map_err(|e| {
            PipelineError::ParseError(format!("could not parse search response: {e}"))
        })?;

        Ok(body.hits.into_iter().map(SearchHit::from).collect())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/collections/{name}")))
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::UpstreamError(format!(
                "drop collection failed with status {}",
                resp.status()
            )));
        }
        self.known_collections.write().await.remove(name);
        Ok(())
    }
}

/// Column-orient `chunks` into one `Vec<Value>` per schema field, filling
/// defaults for a zero vector, empty strings, and `0` integers when a field
/// is missing (it never is, given [`Chunk`]'s required fields, but the
/// defaulting mirrors `operations.py::insert`'s defensive column builder).
fn column_orient(chunks: &[Chunk], dimension: u32) -> HashMap<&'static str, serde_json::Value> {
    let mut columns: HashMap<&'static str, serde_json::Value> = HashMap::new();
    columns.insert("id", json!(chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>()));
    columns.insert("document_id", json!(chunks.iter().map(|c| c.document_id.clone()).collect::<Vec<_>>()));
    columns.insert("chunk_index", json!(chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>()));
    columns.insert("text", json!(chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>()));
    columns.insert("tenant_id", json!(chunks.iter().map(|c| c.tenant_id.clone()).collect::<Vec<_>>()));
    columns.insert("created_at", json!(chunks.iter().map(|c| c.created_at.to_rfc3339()).collect::<Vec<_>>()));
    columns.insert("updated_at", json!(chunks.iter().map(|c| c.updated_at.to_rfc3339()).collect::<Vec<_>>()));
    columns.insert("char_count", json!(chunks.iter().map(|c| c.char_count).collect::<Vec<_>>()));
    columns.insert("token_count", json!(chunks.iter().map(|c| c.token_count).collect::<Vec<_>>()));
    columns.insert(
        "dense_vector",
        json!(chunks
            .iter()
            .map(|c| if c.dense_vector.is_empty() {
                vec![0.0_f32; dimension as usize]
            } else {
                c.dense_vector.clone()
            })
            .collect::<Vec<_>>()),
    );
    columns.insert("keywords", json!(chunks.iter().map(|c| c.metadata.keywords.clone()).collect::<Vec<_>>()));
    columns.insert("topics", json!(chunks.iter().map(|c| c.metadata.topics.clone()).collect::<Vec<_>>()));
    columns.insert("questions", json!(chunks.iter().map(|c| c.metadata.questions.clone()).collect::<Vec<_>>()));
    columns.insert("summary", json!(chunks.iter().map(|c| c.metadata.summary.clone()).collect::<Vec<_>>()));
    columns.insert(
        "semantic_keywords",
        json!(chunks.iter().map(|c| c.metadata.semantic_keywords.clone()).collect::<Vec<_>>()),
    );
    columns.insert(
        "entity_relationships",
        json!(chunks.iter().map(|c| c.metadata.entity_relationships.clone()).collect::<Vec<_>>()),
    );
    columns.insert("attributes", json!(chunks.iter().map(|c| c.metadata.attributes.clone()).collect::<Vec<_>>()));
    columns
}

fn apply_update(row: ChunkRow, updates: &ChunkUpdate, now: chrono::DateTime<Utc>) -> Chunk {
    let text = updates.text.clone().unwrap_or(row.text);
    Chunk {
        id: row.id,
        document_id: row.document_id,
        chunk_index: row.chunk_index,
        tenant_id: row.tenant_id,
        char_count: text.chars().count() as u32,
        token_count: row.token_count,
        text,
        created_at: row.created_at,
        updated_at: now,
        dense_vector: updates.dense_vector.clone().unwrap_or_default(),
        metadata: MetadataFields {
            keywords: updates.keywords.clone().unwrap_or(row.keywords),
            topics: updates.topics.clone().unwrap_or(row.topics),
            questions: updates.questions.clone().unwrap_or(row.questions),
            summary: updates.summary.clone().unwrap_or(row.summary),
            semantic_keywords: updates.semantic_keywords.clone().unwrap_or(row.semantic_keywords),
            entity_relationships: updates.entity_relationships.clone().unwrap_or(row.entity_relationships),
            attributes: updates.attributes.clone().unwrap_or(row.attributes),
        },
    }
}

#[derive(Debug, Deserialize)]
struct CollectionDescribe {
    dimension: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    rows: Vec<ChunkRow>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ChunkRow {
    id: String,
    document_id: String,
    chunk_index: u32,
    text: String,
    tenant_id: String,
    created_at: chrono::DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: chrono::DateTime<Utc>,
    #[serde(default)]
    token_count: u32,
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    topics: String,
    #[serde(default)]
    questions: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    semantic_keywords: String,
    #[serde(default)]
    entity_relationships: String,
    #[serde(default)]
    attributes: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    id: String,
    document_id: String,
    chunk_index: u32,
    text: String,
    score: f32,
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    topics: String,
    #[serde(default)]
    questions: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    semantic_keywords: String,
    #[serde(default)]
    entity_relationships: String,
    #[serde(default)]
    attributes: String,
}

impl From<RawHit> for SearchHit {
    fn from(h: RawHit) -> Self {
        SearchHit {
            chunk_id: h.id,
            document_id: h.document_id,
            chunk_index: h.chunk_index,
            text: h.text,
            score: h.score,
            keywords: h.keywords,
            topics: h.topics,
            questions: h.questions,
            summary: h.summary,
            semantic_keywords: h.semantic_keywords,
            entity_relationships: h.entity_relationships,
            attributes: h.attributes,
        }
    }
}
