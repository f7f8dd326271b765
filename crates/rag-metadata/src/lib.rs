//! Metadata Extractor (C4): LLM-driven 7-field extraction, JSON repair,
//! post-processing, caching, and batching.

pub mod batch;
pub mod extractor;
pub mod repair;

pub use batch::{extract_batch, BatchItemResult, BatchResult, MAX_BATCH_SIZE};
pub use extractor::{empty_for_short_chunk, failed_extraction_marker, ExtractionCounts, MetadataExtractor, MIN_CHUNK_LENGTH};
pub use repair::parse_and_repair;
