//! Vector Store Adapter (C5): collection lifecycle, bulk insert, and
//! filtered ANN search over an HTTP-accessible vector engine.

pub mod http;
pub mod schema;
pub mod store;

pub use http::{HttpVectorStore, HttpVectorStoreConfig};
pub use schema::{generate_collection_description, FieldSpec, FIELDS, TENANT_PARTITION_COUNT};
pub use store::{scope_to_tenant, ChunkUpdate, EnsureOutcome, SearchHit, VectorStore};
