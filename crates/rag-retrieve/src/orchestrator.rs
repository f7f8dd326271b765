//! Retrieval Orchestrator (C9): intent classification runs concurrently with
//! metadata-boost search; the result then flows through optional reranking,
//! optional compression, and answer generation.

use std::sync::Arc;
use std::time::Instant;

use rag_core::{retry_with_backoff, Embedder, LlmGateway, PipelineError, Registry, Result, RetryPolicy, Task};
use rag_intent::{AnalyzeRequest, ClassificationResult, IntentClassifier};
use rag_search::SearchRequest;
use rag_vectorstore::VectorStore;
use tokio::sync::Semaphore;

use crate::compressor::Compressor;
use crate::reranker::Reranker;
use crate::types::{ContextChunk, RetrieveRequest, RetrieveResponse, RetrieveStages, StageReport};

pub struct RetrieveOrchestrator {
    classifier: Arc<IntentClassifier>,
    embedder: Arc<dyn Embedder>,
    /// Model id queries are embedded with. Fixed per deployment: a running
    /// instance searches collections built by one ingestion embedding model,
    /// so unlike ingestion (which takes `embedding_model` per request), this
    /// is a startup config value, not a `RetrieveRequest` field.
    embedding_model: String,
    store: Arc<dyn VectorStore>,
    registry: Arc<Registry>,
    gateway: Arc<LlmGateway>,
    reranker: Option<Arc<dyn Reranker>>,
    compressor: Option<Arc<dyn Compressor>>,
    retrieve_semaphore: Arc<Semaphore>,
}

/// Output of the shared (intent ∥ search → rerank → compress) pipeline,
/// consumed by both the batched and streaming `/v1/retrieve` paths so the
/// expensive retrieval work is never duplicated between them.
pub struct PreparedRetrieval {
    pub classification: Option<ClassificationResult>,
    pub context_chunks: Vec<ContextChunk>,
    pub stages: RetrieveStages,
    pub search_results_count: u32,
    pub reranked_count: u32,
    pub compressed_count: u32,
}

impl RetrieveOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Arc<IntentClassifier>,
        embedder: Arc<dyn Embedder>,
        embedding_model: String,
        store: Arc<dyn VectorStore>,
        registry: Arc<Registry>,
        gateway: Arc<LlmGateway>,
        reranker: Option<Arc<dyn Reranker>>,
        compressor: Option<Arc<dyn Compressor>>,
        retrieve_concurrency: usize,
    ) -> Self {
        Self {
            classifier,
            embedder,
            embedding_model,
            store,
            registry,
            gateway,
            reranker,
            compressor,
            retrieve_semaphore: Arc::new(Semaphore::new(retrieve_concurrency)),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<LlmGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn classifier(&self) -> &Arc<IntentClassifier> {
        &self.classifier
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Runs intent ∥ search, then rerank, then compress, returning the
    /// assembled context chunks and classification. Both the batched and
    /// streaming retrieve paths build on this.
    pub async fn prepare(&self, request: &RetrieveRequest) -> Result<PreparedRetrieval> {
        let _permit = self
            .retrieve_semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::Internal(format!("retrieve semaphore closed: {e}")))?;

        validate(request)?;

        let mut stages = RetrieveStages::default();

        let intent_fut = async {
            let start = Instant::now();
            let analyze_request = AnalyzeRequest {
                query: request.query.clone(),
                enable_citations: request.enable_citations,
                response_style: request.response_style,
                response_format: request.response_format.clone(),
            };
            let outcome = self.classifier.classify(&analyze_request).await;
            (outcome, start.elapsed())
        };

        let search_fut = async {
            let start = Instant::now();
            let embedding_model = self.embedding_model.clone();
            let search_request = SearchRequest {
                query_text: request.query.clone(),
                collection: request.collection_name.clone(),
                tenant_id: request.tenant_id.clone(),
                top_k: request.search_top_k as usize,
                use_metadata_boost: request.use_metadata_boost,
                boost_weights: None,
                filter_expr: None,
            };
            let outcome = retry_with_backoff(RetryPolicy::default(), || {
                let embedder = self.embedder.as_ref();
                let store = self.store.as_ref();
                let embedding_model = embedding_model.clone();
                let search_request = search_request.clone();
                async move { rag_search::search(embedder, store, &embedding_model, &search_request).await }
            })
            .await;
            (outcome, start.elapsed())
        };

        let (intent_outcome, search_outcome) = tokio::join!(intent_fut, search_fut);
        let (classification_result, intent_duration) = intent_outcome;
        let (search_result, search_duration) = search_outcome;

        let search_response = search_result?;
        stages.search = StageReport {
            duration_ms: search_duration.as_millis() as u64,
            model: None,
            items: search_response.results.len() as u32,
            failed: 0,
        };

        let classification = match classification_result {
            Ok(result) => {
                stages.intent = StageReport {
                    duration_ms: intent_duration.as_millis() as u64,
                    model: Some(result.recommended_model.clone()),
                    items: 1,
                    failed: 0,
                };
                Some(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "intent classification failed, falling back to request defaults");
                stages.intent =
                    StageReport { duration_ms: intent_duration.as_millis() as u64, model: None, items: 0, failed: 1 };
                None
            }
        };

        let search_results_count = search_response.results.len() as u32;
        let mut context_chunks: Vec<ContextChunk> = search_response
            .results
            .into_iter()
            .map(|hit| ContextChunk {
                chunk_id: hit.chunk_id,
                document_id: hit.document_id,
                chunk_index: hit.chunk_index,
                text: hit.text,
                score: hit.score,
                topics: hit.topics,
                keywords: hit.keywords,
                questions: hit.questions,
                summary: hit.summary,
            })
            .collect();

        // --- Rerank (optional, degrades to the previous stage's output on error) ---
        let mut reranked_count = context_chunks.len() as u32;
        if request.enable_reranking && !context_chunks.is_empty() {
            if let Some(reranker) = &self.reranker {
                let start = Instant::now();
                let query = request.query.clone();
                let top_k = request.rerank_top_k;
                let input = context_chunks.clone();
                let outcome = retry_with_backoff(RetryPolicy::default(), || {
                    let reranker = reranker.clone();
                    let query = query.clone();
                    let input = input.clone();
                    async move { reranker.rerank(&query, input, top_k).await }
                })
                .await;

                match outcome {
                    Ok(reranked) => {
                        reranked_count = reranked.len() as u32;
                        stages.rerank = Some(StageReport {
                            duration_ms: start.elapsed().as_millis() as u64,
                            model: None,
                            items: reranked_count,
                            failed: 0,
                        });
                        context_chunks = reranked;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "reranking failed, keeping search order");
                        crate::metrics::metrics().stage_skipped_total.with_label_values(&["rerank"]).inc();
                        stages.rerank = Some(StageReport {
                            duration_ms: start.elapsed().as_millis() as u64,
                            model: None,
                            items: 0,
                            failed: 1,
                        });
                        context_chunks.truncate(request.rerank_top_k as usize);
                        reranked_count = context_chunks.len() as u32;
                    }
                }
            }
        }

        // --- Compress (optional, degrades to the previous stage's output on error) ---
        let mut compressed_count = 0u32;
        if request.enable_compression && !context_chunks.is_empty() {
            if let Some(compressor) = &self.compressor {
                let start = Instant::now();
                let query = request.query.clone();
                let ratio = request.compression_ratio;
                let threshold = request.score_threshold;
                let input = context_chunks.clone();
                let outcome = retry_with_backoff(RetryPolicy::default(), || {
                    let compressor = compressor.clone();
                    let query = query.clone();
                    let input = input.clone();
                    async move { compressor.compress(&query, input, ratio, threshold).await }
                })
                .await;

                match outcome {
                    Ok(compressed) => {
                        compressed_count = compressed.len() as u32;
                        stages.compress = Some(StageReport {
                            duration_ms: start.elapsed().as_millis() as u64,
                            model: None,
                            items: compressed_count,
                            failed: 0,
                        });
                        context_chunks = compressed;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "compression failed, keeping reranked output");
                        crate::metrics::metrics().stage_skipped_total.with_label_values(&["compress"]).inc();
                        stages.compress = Some(StageReport {
                            duration_ms: start.elapsed().as_millis() as u64,
                            model: None,
                            items: 0,
                            failed: 1,
                        });
                    }
                }
            }
        }

        // `max_context_chunks` is a hard cap on the answer stage's context
        // regardless of which upstream stage produced it.
        context_chunks.truncate(request.max_context_chunks as usize);

        Ok(PreparedRetrieval {
            classification,
            context_chunks,
            stages,
            search_results_count,
            reranked_count,
            compressed_count,
        })
    }

    /// Full batched retrieval: prepare the context, then generate the answer
    /// in one call.
    pub async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrieveResponse> {
        let start = Instant::now();
        let query = request.query.clone();
        let enable_citations = request.enable_citations;
        let model_override = request.model.clone();
        let temperature = request.temperature;

        let mut prepared = self.prepare(&request).await?;

        let (model, system_prompt, max_tokens) = resolve_answer_params(&prepared.classification, &model_override, &self.registry);

        let answer_start = Instant::now();
        let (answer, citations) = crate::answer::generate(
            &self.gateway,
            &model,
            &system_prompt,
            &query,
            &prepared.context_chunks,
            max_tokens,
            temperature,
            enable_citations,
        )
        .await?;
        prepared.stages.answer =
            StageReport { duration_ms: answer_start.elapsed().as_millis() as u64, model: Some(model), items: prepared.context_chunks.len() as u32, failed: 0 };

        Ok(RetrieveResponse {
            success: true,
            query,
            answer,
            citations,
            context_count: prepared.context_chunks.len() as u32,
            context_chunks: prepared.context_chunks,
            stages: prepared.stages,
            total_time_ms: start.elapsed().as_millis() as u64,
            search_results_count: prepared.search_results_count,
            reranked_count: prepared.reranked_count,
            compressed_count: prepared.compressed_count,
            timestamp: chrono::Utc::now(),
        })
    }
}

/// Resolves which model/system-prompt/max-tokens to use for answer
/// generation: the intent classifier's recommendation, overridden by an
/// explicit `model` on the request, or a safe registry default if intent
/// classification itself failed (spec.md §4.9 step 5).
pub(crate) fn resolve_answer_params(
    classification: &Option<ClassificationResult>,
    model_override: &Option<String>,
    registry: &Registry,
) -> (String, String, u32) {
    let default_prompt = "You are a knowledgeable assistant that answers questions using only the provided context.";
    let (recommended_model, system_prompt, max_tokens) = match classification {
        Some(result) => (result.recommended_model.clone(), result.system_prompt.clone(), result.recommended_max_tokens),
        None => {
            let fallback =
                registry.model_for_task(Task::AnswerGenerationSimple).unwrap_or("unknown-model").to_string();
            (fallback, default_prompt.to_string(), 1024)
        }
    };

    let model = model_override.clone().unwrap_or(recommended_model);
    (model, system_prompt, max_tokens)
}

fn validate(request: &RetrieveRequest) -> Result<()> {
    if request.query.trim().is_empty() {
        return Err(PipelineError::InvalidArgument("query must not be empty".to_string()));
    }
    if request.collection_name.trim().is_empty() {
        return Err(PipelineError::InvalidArgument("collection_name must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&request.compression_ratio) {
        return Err(PipelineError::InvalidArgument("compression_ratio must be in 0.0..=1.0".to_string()));
    }
    if !(0.0..=1.0).contains(&request.score_threshold) {
        return Err(PipelineError::InvalidArgument("score_threshold must be in 0.0..=1.0".to_string()));
    }
    if request.search_top_k == 0 {
        return Err(PipelineError::InvalidArgument("search_top_k must be > 0".to_string()));
    }
    Ok(())
}
