//! Chunker (C3): splits a single text into an ordered sequence of chunks
//! using one of three methods, with a shared post-filter and deterministic
//! output.

pub mod config;
pub mod error;
pub mod markdown;
pub mod postfilter;
pub mod recursive;
pub mod token;

pub use config::ChunkConfig;
pub use error::{Error, Result};
pub use markdown::MarkdownChunk;

use serde::{Deserialize, Serialize};

/// Which of the three chunking methods to use for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMethod {
    Recursive,
    Markdown,
    Token,
}

/// Per-request chunking parameters, matching the `/v1/ingest` body fields.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub method: ChunkingMethod,
    pub config: ChunkConfig,
    pub separators: Option<Vec<String>>,
    pub markdown_headers: Option<Vec<u8>>,
    pub tokenizer: String,
}

impl Default for ChunkRequest {
    fn default() -> Self {
        Self {
            method: ChunkingMethod::Recursive,
            config: ChunkConfig::default(),
            separators: None,
            markdown_headers: None,
            tokenizer: "cl100k_base".to_string(),
        }
    }
}

/// Split `text` per `request`, returning plain chunk strings. The markdown
/// method's heading path is dropped here; callers needing it should call
/// [`markdown::split_markdown`] directly.
pub fn chunk(text: &str, request: &ChunkRequest) -> Result<Vec<String>> {
    request.config.validate()?;

    match request.method {
        ChunkingMethod::Recursive => {
            let separators = request.separators.clone().unwrap_or_else(recursive::default_separators);
            let raw = recursive::split_recursive(text, &separators, &request.config);
            Ok(raw.into_iter().filter(|c| postfilter::keep(c)).collect())
        }
        ChunkingMethod::Markdown => {
            let levels = request.markdown_headers.clone().unwrap_or_else(|| vec![1, 2, 3]);
            Ok(markdown::split_markdown(text, &levels)
                .into_iter()
                .map(|c| c.text)
                .collect())
        }
        ChunkingMethod::Token => {
            let tokenizer = token::tokenizer_for(&request.tokenizer)?;
            Ok(token::chunk_by_tokens(text, &request.config, &tokenizer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_deterministic_for_recursive_method() {
        let request = ChunkRequest::default();
        let text = "Sentence one here with words.\n\nSentence two here with words.\n\nSentence three here with words.";
        let a = chunk(text, &request).unwrap();
        let b = chunk(text, &request).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn markdown_method_returns_heading_sections() {
        let mut request = ChunkRequest::default();
        request.method = ChunkingMethod::Markdown;
        let text = "# Title\nBody text with enough words here.\n## Sub\nMore body text with enough words.";
        let chunks = chunk(text, &request).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected_before_splitting() {
        let mut request = ChunkRequest::default();
        request.config.max_chunk_size = 1;
        assert!(chunk("anything", &request).is_err());
    }

    proptest::proptest! {
        #[test]
        fn recursive_chunking_never_panics(text in "\\PC{0,500}") {
            let request = ChunkRequest::default();
            let _ = chunk(&text, &request);
        }
    }
}
