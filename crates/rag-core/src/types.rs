//! Data model shared by every component: chunks, collections, metadata fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-field length caps for the seven structured metadata fields, in the
/// order they appear on [`MetadataFields`].
pub const METADATA_FIELD_CAPS: [(&str, usize); 7] = [
    ("keywords", 500),
    ("topics", 500),
    ("questions", 500),
    ("summary", 1000),
    ("semantic_keywords", 800),
    ("entity_relationships", 1000),
    ("attributes", 1000),
];

/// The seven structured metadata fields attached to every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFields {
    /// Literal salient terms, comma-separated.
    pub keywords: String,
    /// High-level themes, comma-separated.
    pub topics: String,
    /// Natural-language questions the chunk answers, pipe-separated.
    pub questions: String,
    /// One-to-two sentence summary.
    pub summary: String,
    /// Synonyms / industry expansions, comma-separated, disjoint from `keywords`.
    pub semantic_keywords: String,
    /// Triplets `E1 -> rel -> E2`, pipe-separated.
    pub entity_relationships: String,
    /// `key: value` pairs, comma-separated.
    pub attributes: String,
}

impl MetadataFields {
    /// An all-empty record, used when a chunk is below the metadata-extraction
    /// minimum length or when extraction failed for that chunk.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Truncate every field to its cap, splitting at the last separator
    /// (`,` or `|`) before the cap so no item is cut mid-token.
    pub fn truncate_to_caps(&mut self) {
        self.keywords = truncate_at_separator(&self.keywords, 500);
        self.topics = truncate_at_separator(&self.topics, 500);
        self.questions = truncate_at_separator(&self.questions, 500);
        self.summary = truncate_at_separator(&self.summary, 1000);
        self.semantic_keywords = truncate_at_separator(&self.semantic_keywords, 800);
        self.entity_relationships = truncate_at_separator(&self.entity_relationships, 1000);
        self.attributes = truncate_at_separator(&self.attributes, 1000);
    }
}

/// Truncate `s` to at most `cap` bytes, backing off to the last `,` or `|`
/// separator strictly before the cap so the result never ends mid-item.
#[must_use]
pub fn truncate_at_separator(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let window = &s[..cap];
    match window.rfind([',', '|']) {
        Some(idx) => window[..idx].to_string(),
        None => window.to_string(),
    }
}

/// A unit of indexed content: a bounded text segment with its dense vector
/// and seven-field metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk id, conventionally `{document_id}_chunk_{chunk_index:04}`.
    pub id: String,
    pub document_id: String,
    /// 0-based, contiguous within a document.
    pub chunk_index: u32,
    /// Tenant partition key.
    pub tenant_id: String,
    /// UTF-8 text, bounded to 64 KiB by the chunker's post-filter.
    pub text: String,
    pub char_count: u32,
    pub token_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Dense vector; length must equal the owning collection's dimension.
    pub dense_vector: Vec<f32>,
    pub metadata: MetadataFields,
}

impl Chunk {
    /// Build the conventional idempotent chunk id for (`document_id`, `chunk_index`).
    #[must_use]
    pub fn conventional_id(document_id: &str, chunk_index: u32) -> String {
        format!("{document_id}_chunk_{chunk_index:04}")
    }
}

/// A named, tenant-partitioned set of chunks sharing one schema and dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub dimension: u32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// HNSW index parameters for the dense vector field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: u32,
    pub ef_construction: u32,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventional_id_is_zero_padded() {
        assert_eq!(Chunk::conventional_id("doc1", 0), "doc1_chunk_0000");
        assert_eq!(Chunk::conventional_id("doc1", 42), "doc1_chunk_0042");
    }

    #[test]
    fn truncate_under_cap_is_unchanged() {
        assert_eq!(truncate_at_separator("short", 500), "short");
    }

    #[test]
    fn truncate_backs_off_to_comma() {
        let s = format!("{},{}", "a".repeat(10), "b".repeat(10));
        let truncated = truncate_at_separator(&s, 15);
        assert!(!truncated.ends_with('b'));
        assert_eq!(truncated, "a".repeat(10));
    }

    #[test]
    fn truncate_with_no_separator_hard_cuts() {
        let s = "a".repeat(20);
        let truncated = truncate_at_separator(&s, 10);
        assert_eq!(truncated.len(), 10);
    }

    #[test]
    fn metadata_empty_has_blank_fields() {
        let m = MetadataFields::empty();
        assert_eq!(m.keywords, "");
        assert_eq!(m.attributes, "");
    }

    #[test]
    fn metadata_field_caps_cover_all_seven_fields() {
        assert_eq!(METADATA_FIELD_CAPS.len(), 7);
        assert_eq!(METADATA_FIELD_CAPS[3], ("summary", 1000));
    }
}
