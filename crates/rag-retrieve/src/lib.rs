//! Retrieval Orchestrator (C9): drives a query through intent classification
//! (parallel with search), optional reranking, optional compression, and
//! answer generation, exposed over HTTP as `/v1/retrieve` and friends.

pub mod answer;
pub mod compressor;
pub mod config;
pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod reranker;
pub mod server;
pub mod types;

pub use config::Config;
pub use orchestrator::RetrieveOrchestrator;
pub use server::{build_router, AppState};
