//! The 17-field collection schema (9 core + 1 vector + 7 metadata fields)
//! and the rich description string attached to a collection at creation.

use chrono::Utc;

/// One field of the 17-field schema, in declaration order. Mirrors
/// `storage/v1.0.0/schema.py::create_storage_schema_v1`.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub max_length: Option<usize>,
    pub is_primary: bool,
    pub is_partition_key: bool,
}

/// The fixed field order every collection is created with.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "id", max_length: Some(100), is_primary: true, is_partition_key: false },
    FieldSpec { name: "document_id", max_length: Some(100), is_primary: false, is_partition_key: false },
    FieldSpec { name: "chunk_index", max_length: None, is_primary: false, is_partition_key: false },
    FieldSpec { name: "text", max_length: Some(65536), is_primary: false, is_partition_key: false },
    FieldSpec { name: "tenant_id", max_length: Some(100), is_primary: false, is_partition_key: true },
    FieldSpec { name: "created_at", max_length: Some(50), is_primary: false, is_partition_key: false },
    FieldSpec { name: "updated_at", max_length: Some(50), is_primary: false, is_partition_key: false },
    FieldSpec { name: "char_count", max_length: None, is_primary: false, is_partition_key: false },
    FieldSpec { name: "token_count", max_length: None, is_primary: false, is_partition_key: false },
    FieldSpec { name: "dense_vector", max_length: None, is_primary: false, is_partition_key: false },
    FieldSpec { name: "keywords", max_length: Some(500), is_primary: false, is_partition_key: false },
    FieldSpec { name: "topics", max_length: Some(500), is_primary: false, is_partition_key: false },
    FieldSpec { name: "questions", max_length: Some(500), is_primary: false, is_partition_key: false },
    FieldSpec { name: "summary", max_length: Some(1000), is_primary: false, is_partition_key: false },
    FieldSpec { name: "semantic_keywords", max_length: Some(800), is_primary: false, is_partition_key: false },
    FieldSpec { name: "entity_relationships", max_length: Some(1000), is_primary: false, is_partition_key: false },
    FieldSpec { name: "attributes", max_length: Some(1000), is_primary: false, is_partition_key: false },
];

/// Fixed tenant partition count new collections are created with.
pub const TENANT_PARTITION_COUNT: u32 = 256;

/// Compose the human-readable description stored on a collection at
/// creation time, recording dimension and the models actually used.
/// Mirrors `schema.py::generate_collection_description`.
#[must_use]
pub fn generate_collection_description(
    dimension: u32,
    metadata_model_used: Option<&str>,
    embedding_model_used: Option<&str>,
) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let mut parts = vec![
        "RAG vector store v1 - multi-tenant dense vector search".to_string(),
        format!("Created: {timestamp}"),
        format!("Vector Dimension: {dimension}"),
    ];
    if let Some(embedding) = embedding_model_used {
        parts.push(format!("Embedding: {embedding}"));
    }
    if let Some(metadata_model) = metadata_model_used {
        parts.push(format!("Metadata LLM: {metadata_model}"));
    }
    parts.push(
        "Metadata: 7 fields (keywords, topics, questions, summary, semantic_keywords, entity_relationships, attributes)"
            .to_string(),
    );
    parts.join(" | ")
}
