//! Ingestion Orchestrator (C6): chunk → (metadata ∥ embed) → assemble →
//! insert, with per-stage timing and retry on transient transport errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rag_core::{retry_with_backoff, Chunk, Embedder, LlmGateway, MetadataFields, PipelineError, Registry, Result, RetryPolicy, Task};
use rag_metadata::{extract_batch, ExtractionCounts, MetadataExtractor};
use rag_text_splitters::{ChunkConfig, ChunkRequest};
use rag_vectorstore::VectorStore;
use tokio::sync::Semaphore;

use crate::types::{IngestRequest, IngestResponse, IngestStages, StageReport, StorageMode};

const MAX_TEXT_LENGTH: usize = 5_000_000;
const EMBEDDING_BATCH_SIZE: usize = 100;

pub struct IngestOrchestrator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    registry: Arc<Registry>,
    metadata_extractor: Arc<MetadataExtractor>,
    metadata_semaphore: Arc<Semaphore>,
    ingest_semaphore: Arc<Semaphore>,
}

impl IngestOrchestrator {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        registry: Arc<Registry>,
        metadata_extractor: Arc<MetadataExtractor>,
        metadata_concurrency: usize,
        ingest_concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            registry,
            metadata_extractor,
            metadata_semaphore: Arc::new(Semaphore::new(metadata_concurrency)),
            ingest_semaphore: Arc::new(Semaphore::new(ingest_concurrency)),
        }
    }

    /// Borrow the gateway's registry, used by the `/v1/ingest` handler's
    /// dependency-health checks.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        let _permit = self
            .ingest_semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::Internal(format!("ingest semaphore closed: {e}")))?;

        validate(&request)?;

        let start = Instant::now();
        let mut stages = IngestStages::default();

        // --- Chunk (C3) ---
        let chunk_start = Instant::now();
        let chunk_request = ChunkRequest {
            method: request.chunking_method,
            config: ChunkConfig {
                max_chunk_size: request.max_chunk_size,
                chunk_overlap: request.chunk_overlap,
            },
            separators: request.separators.clone(),
            markdown_headers: request.markdown_headers.clone(),
            tokenizer: "cl100k_base".to_string(),
        };
        let texts = rag_text_splitters::chunk(&request.text, &chunk_request).map_err(PipelineError::from)?;
        stages.chunking = StageReport {
            duration_ms: elapsed_ms(chunk_start),
            model: None,
            items: texts.len() as u32,
            failed: 0,
        };

        if texts.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "document produced zero chunks after chunking and post-filtering".to_string(),
            ));
        }

        // --- Fan-out: metadata ∥ embeddings ---
        let metadata_model = self
            .registry
            .model_for_task(Task::MetadataExtraction)
            .ok_or_else(|| PipelineError::Internal("no model configured for metadata extraction".to_string()))?
            .to_string();

        let metadata_fut = async {
            if !request.generate_metadata {
                return (Vec::<MetadataFields>::new(), 0u32, Duration::default());
            }
            let start = Instant::now();
            let counts = ExtractionCounts {
                keywords_count: request.keywords_count,
                topics_count: request.topics_count,
                questions_count: request.questions_count,
                summary_length: request.summary_length,
            };
            let result = extract_batch(
                self.metadata_extractor.clone(),
                self.metadata_semaphore.clone(),
                &texts,
                &counts,
                "ingest",
            )
            .await;
            (
                result.items.into_iter().map(|item| item.metadata).collect(),
                result.failed as u32,
                start.elapsed(),
            )
        };

        let embedding_fut = async {
            if !request.generate_embeddings {
                return Ok((Vec::<Vec<f32>>::new(), Duration::default()));
            }
            let start = Instant::now();
            let vectors = self.embed_in_batches(&request.embedding_model, &texts).await?;
            Ok::<_, PipelineError>((vectors, start.elapsed()))
        };

        let (metadata_outcome, embedding_outcome) = tokio::join!(metadata_fut, embedding_fut);
        let (metadata_fields, metadata_failed, metadata_duration) = metadata_outcome;
        let (dense_vectors, embedding_duration) = embedding_outcome?;

        stages.metadata = StageReport {
            duration_ms: metadata_duration.as_millis() as u64,
            model: request.generate_metadata.then(|| metadata_model.clone()),
            items: texts.len() as u32,
            failed: metadata_failed,
        };
        stages.embeddings = StageReport {
            duration_ms: embedding_duration.as_millis() as u64,
            model: request.generate_embeddings.then(|| request.embedding_model.clone()),
            items: dense_vectors.len() as u32,
            failed: 0,
        };

        // --- Assemble ---
        let tenant_id = request.tenant_id.clone().unwrap_or_default();
        let now = chrono::Utc::now();
        let mut chunks = Vec::with_capacity(texts.len());
        for (idx, text) in texts.iter().enumerate() {
            let metadata = metadata_fields.get(idx).cloned().unwrap_or_else(MetadataFields::empty);
            let dense_vector = dense_vectors.get(idx).cloned().unwrap_or_default();
            chunks.push(Chunk {
                id: Chunk::conventional_id(&request.document_id, idx as u32),
                document_id: request.document_id.clone(),
                chunk_index: idx as u32,
                tenant_id: tenant_id.clone(),
                text: text.clone(),
                char_count: text.chars().count() as u32,
                token_count: 0,
                created_at: now,
                updated_at: now,
                dense_vector,
                metadata,
            });
        }

        if chunks.is_empty() {
            return Err(PipelineError::Internal("all chunks were skipped during assembly".to_string()));
        }

        // --- Insert (C5) ---
        let storage_start = Instant::now();
        let chunks_inserted = self
            .store_chunks(
                &request,
                &chunks,
                request.generate_metadata.then(|| metadata_model.as_str()),
                request.generate_embeddings.then(|| request.embedding_model.as_str()),
            )
            .await?;
        stages.storage = StageReport {
            duration_ms: elapsed_ms(storage_start),
            model: None,
            items: chunks_inserted,
            failed: 0,
        };

        tracing::info!(
            document_id = %request.document_id,
            collection = %request.collection_name,
            chunks_created = chunks.len(),
            chunks_inserted,
            total_ms = elapsed_ms(start),
            "ingest complete"
        );

        Ok(IngestResponse {
            success: true,
            document_id: request.document_id,
            collection_name: request.collection_name,
            chunks_created: chunks.len() as u32,
            chunks_inserted,
            processing_time_ms: elapsed_ms(start),
            stages,
        })
    }

    async fn embed_in_batches(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batches: Vec<Vec<String>> = texts.chunks(EMBEDDING_BATCH_SIZE).map(|b| b.to_vec()).collect();
        let embedder = self.embedder.clone();
        let policy = RetryPolicy::default();

        let futures = batches.into_iter().map(|batch| {
            let embedder = embedder.clone();
            let policy = policy.clone();
            let model = model.to_string();
            async move {
                retry_with_backoff(policy, || {
                    let embedder = embedder.clone();
                    let model = model.clone();
                    let batch = batch.clone();
                    async move { embedder.embed(&model, &batch).await }
                })
                .await
            }
        });

        let results = futures::future::join_all(futures).await;
        let mut vectors = Vec::with_capacity(texts.len());
        for result in results {
            vectors.extend(result?);
        }
        Ok(vectors)
    }

    async fn store_chunks(
        &self,
        request: &IngestRequest,
        chunks: &[Chunk],
        metadata_model: Option<&str>,
        embedding_model: Option<&str>,
    ) -> Result<u32> {
        if request.storage_mode == StorageMode::None {
            return Ok(0);
        }

        if request.storage_mode == StorageMode::NewCollection {
            let dimension = chunks.iter().map(|c| c.dense_vector.len()).max().unwrap_or(0) as u32;
            let description = rag_vectorstore::generate_collection_description(dimension, metadata_model, embedding_model);
            self.store
                .ensure_collection(&request.collection_name, dimension, &description)
                .await?;
        }

        let policy = RetryPolicy::default();
        let collection = request.collection_name.clone();
        let chunks = chunks.to_vec();
        let inserted = retry_with_backoff(policy, || {
            let store = self.store.clone();
            let collection = collection.clone();
            let chunks = chunks.clone();
            async move { store.insert(&collection, &chunks, true).await }
        })
        .await?;

        Ok(inserted as u32)
    }
}

fn validate(request: &IngestRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(PipelineError::InvalidArgument("text must not be empty".to_string()));
    }
    if request.text.len() > MAX_TEXT_LENGTH {
        return Err(PipelineError::InvalidArgument(format!(
            "text exceeds maximum length of {MAX_TEXT_LENGTH} bytes"
        )));
    }
    if request.document_id.trim().is_empty() {
        return Err(PipelineError::InvalidArgument("document_id must not be empty".to_string()));
    }
    if request.collection_name.trim().is_empty() {
        return Err(PipelineError::InvalidArgument("collection_name must not be empty".to_string()));
    }
    if !(100..=10_000).contains(&request.max_chunk_size) {
        return Err(PipelineError::InvalidArgument("max_chunk_size must be in 100..=10000".to_string()));
    }
    if request.chunk_overlap > 1000 {
        return Err(PipelineError::InvalidArgument("chunk_overlap must be <= 1000".to_string()));
    }
    if request.generate_embeddings && request.embedding_model.trim().is_empty() {
        return Err(PipelineError::InvalidArgument(
            "embedding_model is required when generate_embeddings is true".to_string(),
        ));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_text() {
        let mut req = sample_request();
        req.text = "   ".to_string();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_chunk_size() {
        let mut req = sample_request();
        req.max_chunk_size = 50;
        assert!(validate(&req).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        assert!(validate(&sample_request()).is_ok());
    }

    fn sample_request() -> IngestRequest {
        IngestRequest {
            text: "Apple iPhone 15 Pro Max. Price: $1199 USD.".to_string(),
            document_id: "iphone_doc".to_string(),
            collection_name: "c1".to_string(),
            tenant_id: Some("t1".to_string()),
            chunking_method: rag_text_splitters::ChunkingMethod::Recursive,
            max_chunk_size: 1000,
            chunk_overlap: 200,
            separators: None,
            markdown_headers: None,
            encoding: None,
            generate_metadata: true,
            keywords_count: 8,
            topics_count: 4,
            questions_count: 3,
            summary_length: 2,
            generate_embeddings: true,
            embedding_model: "embed-model".to_string(),
            storage_mode: StorageMode::NewCollection,
        }
    }
}
