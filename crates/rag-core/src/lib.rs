//! Shared core for the RAG pipeline: data model, error type, the Model &
//! Service Registry (C1), the LLM Gateway (C2), a generic LRU+TTL cache,
//! configuration loading, retry policy, and network-allow-list enforcement.

pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
pub mod gateway;
pub mod net_policy;
pub mod registry;
pub mod retry;
pub mod types;

pub use cache::{Cache, CacheStats};
pub use embedder::{Embedder, HttpEmbedder};
pub use error::{PipelineError, Result};
pub use gateway::{ChatMessage, ChatRequest, ChatResponse, LlmGateway};
pub use registry::{Environment, ModelInfo, Registry, RegistryConfig, ServiceEndpoint, Task};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{Chunk, Collection, HnswParams, MetadataFields, METADATA_FIELD_CAPS};
