//! Batch metadata extraction: drops undersized chunks while preserving
//! positional alignment, partitions the remainder into batches of at most
//! 40, issues all batches concurrently under a process-wide semaphore, and
//! merges results back into an N-length output in original order.

use std::sync::Arc;

use rag_core::MetadataFields;
use tokio::sync::Semaphore;

use crate::extractor::{empty_for_short_chunk, failed_extraction_marker, ExtractionCounts, MetadataExtractor};

pub const MAX_BATCH_SIZE: usize = 40;

/// One chunk's outcome within a batch: successful metadata, or an empty
/// record plus the error that demoted it.
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    pub metadata: MetadataFields,
    pub error: Option<String>,
}

/// Result of extracting metadata for a whole document: N-length, in
/// original chunk order, plus a count of chunks that failed extraction.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub items: Vec<BatchItemResult>,
    pub failed: usize,
}

/// Extract metadata for every chunk in `texts`, honoring the batching and
/// concurrency contract of spec.md §4.4.
pub async fn extract_batch(
    extractor: Arc<MetadataExtractor>,
    semaphore: Arc<Semaphore>,
    texts: &[String],
    counts: &ExtractionCounts,
    mode: &str,
) -> BatchResult {
    let mut indices_to_call = Vec::new();
    let mut items: Vec<Option<BatchItemResult>> = vec![None; texts.len()];

    for (idx, text) in texts.iter().enumerate() {
        if let Some(empty) = empty_for_short_chunk(text) {
            items[idx] = Some(BatchItemResult {
                metadata: empty,
                error: None,
            });
        } else {
            indices_to_call.push(idx);
        }
    }

    let mut failed = 0usize;

    for batch in indices_to_call.chunks(MAX_BATCH_SIZE) {
        let futures = batch.iter().map(|&idx| {
            let extractor = Arc::clone(&extractor);
            let semaphore = Arc::clone(&semaphore);
            let text = texts[idx].clone();
            let counts = counts.clone();
            let mode = mode.to_string();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let result = extractor.extract(&text, &counts, &mode).await;
                (idx, result)
            }
        });

        let results = futures::future::join_all(futures).await;
        for (idx, result) in results {
            let item = match result {
                Ok(metadata) => BatchItemResult { metadata, error: None },
                Err(err) => {
                    failed += 1;
                    let (metadata, msg) = failed_extraction_marker(&err);
                    BatchItemResult {
                        metadata,
                        error: Some(msg),
                    }
                }
            };
            items[idx] = Some(item);
        }
    }

    BatchResult {
        items: items.into_iter().map(|i| i.expect("every index filled")).collect(),
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_chunking_respects_max_size() {
        let indices: Vec<usize> = (0..97).collect();
        let chunks: Vec<&[usize]> = indices.chunks(MAX_BATCH_SIZE).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 40);
        assert_eq!(chunks[2].len(), 17);
    }
}
