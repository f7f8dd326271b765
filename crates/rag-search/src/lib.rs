//! Metadata-Boost Search (C7): extends pure ANN similarity with a
//! deterministic overlay derived from the seven structured metadata fields.

pub mod boost;
pub mod weights;

pub use boost::{compute_boost, tokenize, FieldMatch};
pub use weights::{BoostWeights, MAX_TOTAL_BOOST};

use rag_core::{Embedder, Result};
use rag_vectorstore::VectorStore;
use serde::{Deserialize, Serialize};

/// Matches the `/v1/search` request body (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    pub collection: String,
    pub tenant_id: Option<String>,
    pub top_k: usize,
    pub use_metadata_boost: bool,
    pub boost_weights: Option<BoostWeights>,
    pub filter_expr: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query_text: String::new(),
            collection: String::new(),
            tenant_id: None,
            top_k: 10,
            use_metadata_boost: true,
            boost_weights: None,
            filter_expr: None,
        }
    }
}

/// A single scored result with both scores and the per-field breakdown
/// that produced the boost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub vector_score: f32,
    pub metadata_boost: f32,
    pub score: f32,
    pub metadata_matches: Vec<String>,
    pub keywords: String,
    pub topics: String,
    pub questions: String,
    pub summary: String,
    pub semantic_keywords: String,
    pub entity_relationships: String,
    pub attributes: String,
}

/// Matches the `/v1/search` response body (spec.md §6).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<ScoredHit>,
    pub total_found: usize,
    pub collection: String,
    pub metadata_boost_applied: bool,
}

/// Run C7's algorithm: embed the query, ANN-search at `2 × top_k`, apply
/// the metadata boost per hit (if enabled), sort by final score and
/// truncate to `top_k`.
pub async fn search(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    embedding_model: &str,
    request: &SearchRequest,
) -> Result<SearchResponse> {
    let query_vectors = embedder.embed(embedding_model, std::slice::from_ref(&request.query_text)).await?;
    let query_vector = query_vectors.into_iter().next().unwrap_or_default();

    let ann_limit = request.top_k.saturating_mul(2).max(1);
    let hits = store
        .search(
            &request.collection,
            &query_vector,
            request.filter_expr.as_deref(),
            request.tenant_id.as_deref(),
            ann_limit,
        )
        .await?;

    let total_found = hits.len();
    let weights = request.boost_weights.unwrap_or_default();
    let query_tokens = tokenize(&request.query_text);

    let mut scored: Vec<ScoredHit> = hits
        .into_iter()
        .map(|hit| {
            let (boost, matches) = if request.use_metadata_boost {
                compute_boost(
                    &query_tokens,
                    &hit.keywords,
                    &hit.topics,
                    &hit.questions,
                    &hit.summary,
                    &hit.semantic_keywords,
                    &hit.entity_relationships,
                    &hit.attributes,
                    &weights,
                )
            } else {
                (0.0, Vec::new())
            };

            ScoredHit {
                chunk_id: hit.chunk_id,
                document_id: hit.document_id,
                chunk_index: hit.chunk_index,
                text: hit.text,
                vector_score: hit.score,
                metadata_boost: boost,
                score: hit.score + boost,
                metadata_matches: matches.into_iter().map(|m| m.field.to_string()).collect(),
                keywords: hit.keywords,
                topics: hit.topics,
                questions: hit.questions,
                summary: hit.summary,
                semantic_keywords: hit.semantic_keywords,
                entity_relationships: hit.entity_relationships,
                attributes: hit.attributes,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(request.top_k);

    Ok(SearchResponse {
        success: true,
        results: scored,
        total_found,
        collection: request.collection.clone(),
        metadata_boost_applied: request.use_metadata_boost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_core::PipelineError;
    use rag_vectorstore::{ChunkUpdate, EnsureOutcome, SearchHit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    struct FakeStore {
        hits: Vec<SearchHit>,
        seen_limit: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn ensure_collection(&self, _name: &str, _dimension: u32, _description: &str) -> Result<EnsureOutcome> {
            Ok(EnsureOutcome::AlreadyExists)
        }

        async fn insert(&self, _name: &str, _chunks: &[rag_core::Chunk], _auto_create: bool) -> Result<usize> {
            Ok(0)
        }

        async fn delete_by_filter(&self, _name: &str, _expr: &str, _tenant_id: Option<&str>) -> Result<usize> {
            Ok(0)
        }

        async fn update(
            &self,
            _name: &str,
            _filter: &str,
            _updates: &ChunkUpdate,
            _tenant_id: Option<&str>,
        ) -> Result<usize> {
            Ok(0)
        }

        async fn search(
            &self,
            _name: &str,
            _dense_query: &[f32],
            _filter_expr: Option<&str>,
            _tenant_id: Option<&str>,
            limit: usize,
        ) -> Result<Vec<SearchHit>> {
            self.seen_limit.store(limit, Ordering::SeqCst);
            Ok(self.hits.clone())
        }

        async fn drop_collection(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    fn sample_hit(id: &str, score: f32, keywords: &str) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            text: "Apple iPhone 15 Pro Max. Price: $1199 USD.".to_string(),
            score,
            keywords: keywords.to_string(),
            topics: String::new(),
            questions: String::new(),
            summary: String::new(),
            semantic_keywords: String::new(),
            entity_relationships: String::new(),
            attributes: String::new(),
        }
    }

    #[tokio::test]
    async fn search_requests_twice_top_k_as_ann_limit() {
        let store = FakeStore { hits: vec![sample_hit("a", 0.9, "apple, iphone")], seen_limit: AtomicUsize::new(0) };
        let request = SearchRequest { query_text: "apple iphone price".to_string(), top_k: 5, ..Default::default() };
        let _ = search(&FakeEmbedder, &store, "embed-1", &request).await.unwrap();
        assert_eq!(store.seen_limit.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn final_score_equals_vector_score_plus_boost() {
        let store = FakeStore { hits: vec![sample_hit("a", 0.9, "apple, iphone")], seen_limit: AtomicUsize::new(0) };
        let request = SearchRequest { query_text: "apple iphone price".to_string(), top_k: 5, ..Default::default() };
        let response = search(&FakeEmbedder, &store, "embed-1", &request).await.unwrap();
        let hit = &response.results[0];
        assert!((hit.score - (hit.vector_score + hit.metadata_boost)).abs() < 1e-6);
        assert!(hit.metadata_boost >= 0.0 && hit.metadata_boost <= MAX_TOTAL_BOOST);
    }

    #[tokio::test]
    async fn boost_disabled_leaves_vector_score_unchanged() {
        let store = FakeStore { hits: vec![sample_hit("a", 0.9, "apple, iphone")], seen_limit: AtomicUsize::new(0) };
        let request = SearchRequest {
            query_text: "apple iphone price".to_string(),
            top_k: 5,
            use_metadata_boost: false,
            ..Default::default()
        };
        let response = search(&FakeEmbedder, &store, "embed-1", &request).await.unwrap();
        assert_eq!(response.results[0].score, 0.9);
        assert_eq!(response.results[0].metadata_boost, 0.0);
    }

    #[tokio::test]
    async fn results_are_sorted_descending_and_truncated_to_top_k() {
        let store = FakeStore {
            hits: vec![
                sample_hit("a", 0.5, ""),
                sample_hit("b", 0.9, ""),
                sample_hit("c", 0.7, ""),
            ],
            seen_limit: AtomicUsize::new(0),
        };
        let request = SearchRequest { query_text: "anything".to_string(), top_k: 2, ..Default::default() };
        let response = search(&FakeEmbedder, &store, "embed-1", &request).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].chunk_id, "b");
        assert_eq!(response.results[1].chunk_id, "c");
        assert_eq!(response.total_found, 3);
    }

    #[test]
    fn pipeline_error_type_is_reexported_for_callers() {
        let _ = PipelineError::NotFound("x".to_string());
    }
}
