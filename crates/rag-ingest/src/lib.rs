//! Ingestion Orchestrator (C6): chunks documents, extracts metadata and
//! embeddings concurrently, and writes the resulting chunks to the vector
//! store, exposed over HTTP as `/v1/ingest` and collection/document
//! management routes.

pub mod config;
pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod server;
pub mod types;

pub use config::Config;
pub use orchestrator::IngestOrchestrator;
pub use server::{build_router, AppState};
