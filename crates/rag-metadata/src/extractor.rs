//! Single-chunk metadata extraction (C4): calls the LLM gateway with a
//! mode-specific prompt, applies the mandatory post-processing, and caches
//! the result.

use std::time::Duration;

use rag_core::{Cache, ChatMessage, ChatRequest, LlmGateway, MetadataFields, PipelineError, Result};

use crate::repair;

/// Minimum chunk length below which metadata is not extracted; the caller
/// must supply an empty-field record instead (ingestion orchestrator
/// responsibility, not the extractor's).
pub const MIN_CHUNK_LENGTH: usize = 10;

/// Field-count/length knobs that parameterize the extraction prompt and are
/// part of the cache key.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ExtractionCounts {
    pub keywords_count: u32,
    pub topics_count: u32,
    pub questions_count: u32,
    pub summary_length: u32,
}

impl Default for ExtractionCounts {
    fn default() -> Self {
        Self {
            keywords_count: 8,
            topics_count: 4,
            questions_count: 3,
            summary_length: 2,
        }
    }
}

type CacheKey = (String, usize, u32, u32, u32, u32, String, String, String);

/// Caches extraction results keyed on (normalized text prefix + full length,
/// counts, model, mode), exactly matching the source service's key scheme.
pub struct MetadataExtractor {
    gateway: std::sync::Arc<LlmGateway>,
    cache: Cache<CacheKey, MetadataFields>,
    model: String,
}

impl MetadataExtractor {
    #[must_use]
    pub fn new(gateway: std::sync::Arc<LlmGateway>, model: String, cache_ttl: Duration, cache_max_size: usize) -> Self {
        Self {
            gateway,
            cache: Cache::new(cache_max_size, cache_ttl),
            model,
        }
    }

    fn cache_key(&self, text: &str, counts: &ExtractionCounts, mode: &str) -> CacheKey {
        let prefix: String = text.chars().take(1000).collect();
        (
            prefix,
            text.chars().count(),
            counts.keywords_count,
            counts.topics_count,
            counts.questions_count,
            counts.summary_length,
            self.model.clone(),
            "base".to_string(),
            mode.to_string(),
        )
    }

    /// Extract metadata for a single chunk. `text` must be at least
    /// [`MIN_CHUNK_LENGTH`] characters; callers are responsible for that
    /// precondition (the batch operation enforces it directly).
    pub async fn extract(&self, text: &str, counts: &ExtractionCounts, mode: &str) -> Result<MetadataFields> {
        let key = self.cache_key(text, counts, mode);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let prompt = build_prompt(text, counts, mode);
        let response = self
            .gateway
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                temperature_milli: 100,
                max_tokens: 1024,
                response_format: Some("json_object".to_string()),
                stream: false,
            })
            .await?;

        let fields = repair::parse_and_repair(&response.content)?;
        self.cache.set(key, fields.clone());
        Ok(fields)
    }
}

fn build_prompt(text: &str, counts: &ExtractionCounts, mode: &str) -> String {
    format!(
        "Extract structured metadata from the following text chunk (mode: {mode}).\n\
Respond with ONLY a JSON object with these exact keys and caps:\n\
- keywords: up to {kw} comma-separated literal salient terms (max 500 chars)\n\
- topics: up to {tp} comma-separated high-level themes (max 500 chars)\n\
- questions: up to {q} pipe-separated natural-language questions this chunk answers (max 500 chars)\n\
- summary: a {sl}-sentence summary (max 1000 chars)\n\
- semantic_keywords: comma-separated synonyms/industry expansions, disjoint from keywords (max 800 chars)\n\
- entity_relationships: pipe-separated triplets of the form \"E1 -> rel -> E2\" (max 1000 chars)\n\
- attributes: comma-separated key: value pairs (max 1000 chars)\n\n\
Text:\n{text}",
        kw = counts.keywords_count,
        tp = counts.topics_count,
        q = counts.questions_count,
        sl = counts.summary_length,
    )
}

/// A chunk too short for extraction yields this instead of calling the LLM.
#[must_use]
pub fn empty_for_short_chunk(text: &str) -> Option<MetadataFields> {
    if text.chars().count() < MIN_CHUNK_LENGTH {
        Some(MetadataFields::empty())
    } else {
        None
    }
}

/// Explicit marker used when a chunk's extraction failed fatally: the batch
/// operation still succeeds overall, with this chunk demoted to
/// empty-metadata (per spec.md §4.4 failure semantics).
#[must_use]
pub fn failed_extraction_marker(err: &PipelineError) -> (MetadataFields, String) {
    (MetadataFields::empty(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_chunk_yields_empty_metadata() {
        assert!(empty_for_short_chunk("tiny").is_some());
    }

    #[test]
    fn long_enough_chunk_yields_none() {
        assert!(empty_for_short_chunk("this text has more than ten characters").is_none());
    }

    #[test]
    fn prompt_contains_all_seven_field_names() {
        let prompt = build_prompt("some text", &ExtractionCounts::default(), "full");
        for field in ["keywords", "topics", "questions", "summary", "semantic_keywords", "entity_relationships", "attributes"] {
            assert!(prompt.contains(field), "missing field {field} in prompt");
        }
    }

    #[test]
    fn failed_extraction_marker_has_empty_fields() {
        let err = PipelineError::ParseError("boom".to_string());
        let (fields, msg) = failed_extraction_marker(&err);
        assert_eq!(fields.keywords, "");
        assert!(msg.contains("boom"));
    }
}
