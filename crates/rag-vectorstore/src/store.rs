//! The narrow `VectorStore` trait every adapter implements, plus the
//! request/response types for its five operations (C5).

use async_trait::async_trait;
use rag_core::{Chunk, Result};
use serde::{Deserialize, Serialize};

/// A single search hit: score plus the requested output fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub score: f32,
    pub keywords: String,
    pub topics: String,
    pub questions: String,
    pub summary: String,
    pub semantic_keywords: String,
    pub entity_relationships: String,
    pub attributes: String,
}

/// Field-level updates applied by [`VectorStore::update`]'s read-modify-write
/// cycle. Fields left `None` are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkUpdate {
    pub text: Option<String>,
    pub dense_vector: Option<Vec<f32>>,
    pub keywords: Option<String>,
    pub topics: Option<String>,
    pub questions: Option<String>,
    pub summary: Option<String>,
    pub semantic_keywords: Option<String>,
    pub entity_relationships: Option<String>,
    pub attributes: Option<String>,
}

/// Outcome of [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// Narrow CRUD + ANN-search interface over the external vector engine.
/// Implementations own connection pooling and retry-free transport; callers
/// apply [`rag_core::retry_with_backoff`] around these calls as needed.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// No-op if `name` already exists (dimension must match the existing
    /// collection); otherwise creates it with the 17-field schema, tenant-id
    /// partition key, HNSW index on `dense_vector`, and a scalar index on
    /// `document_id`.
    async fn ensure_collection(&self, name: &str, dimension: u32, description: &str) -> Result<EnsureOutcome>;

    /// Bulk-insert `chunks` into `name`. If `auto_create` and the collection
    /// does not exist, it is created first using the dimension of the first
    /// chunk's vector.
    async fn insert(&self, name: &str, chunks: &[Chunk], auto_create: bool) -> Result<usize>;

    /// Delete every chunk in `name` matching `expr`, scoped to `tenant_id`
    /// when supplied. Returns the number of chunks deleted.
    async fn delete_by_filter(&self, name: &str, expr: &str, tenant_id: Option<&str>) -> Result<usize>;

    /// Read-modify-write update: query chunks matching `filter` (scoped to
    /// `tenant_id`), apply `updates`, bump `updated_at`, delete the old rows,
    /// and insert the new ones. Not atomic: callers must tolerate a brief
    /// gap between delete and insert.
    async fn update(&self, name: &str, filter: &str, updates: &ChunkUpdate, tenant_id: Option<&str>) -> Result<usize>;

    /// Dense-vector ANN search over `name`, optionally filtered by `expr`
    /// and scoped to `tenant_id`. Returns up to `limit` hits.
    async fn search(
        &self,
        name: &str,
        dense_query: &[f32],
        filter_expr: Option<&str>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Drop a collection entirely. Only reachable by explicit request, never
    /// as a side effect of another operation.
    async fn drop_collection(&self, name: &str) -> Result<()>;
}

/// Rewrite a filter expression to additionally scope it to `tenant_id`,
/// matching `DeleteByFilter`'s documented rewrite.
#[must_use]
pub fn scope_to_tenant(expr: &str, tenant_id: Option<&str>) -> String {
    match tenant_id {
        Some(tenant) if !expr.trim().is_empty() => format!("({expr}) AND tenant_id == \"{tenant}\""),
        Some(tenant) => format!("tenant_id == \"{tenant}\""),
        None => expr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_to_tenant_wraps_nonempty_expr() {
        let scoped = scope_to_tenant("document_id == \"d1\"", Some("t1"));
        assert_eq!(scoped, "(document_id == \"d1\") AND tenant_id == \"t1\"");
    }

    #[test]
    fn scope_to_tenant_without_tenant_is_unchanged() {
        assert_eq!(scope_to_tenant("document_id == \"d1\"", None), "document_id == \"d1\"");
    }

    #[test]
    fn scope_to_tenant_with_empty_expr_and_tenant() {
        assert_eq!(scope_to_tenant("", Some("t1")), "tenant_id == \"t1\"");
    }
}
