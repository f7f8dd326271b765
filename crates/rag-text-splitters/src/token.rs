//! Token-exact splitting using a named tokenizer (default `cl100k_base`).

use tiktoken_rs::CoreBPE;

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use crate::postfilter;

/// Resolve a tokenizer by name. Only `cl100k_base` is wired up; unknown
/// names fail configuration validation rather than silently falling back.
pub fn tokenizer_for(name: &str) -> Result<CoreBPE> {
    match name {
        "cl100k_base" => tiktoken_rs::cl100k_base()
            .map_err(|e| Error::InvalidConfiguration(format!("failed to load tokenizer: {e}"))),
        other => Err(Error::InvalidConfiguration(format!(
            "unknown tokenizer encoding: {other}"
        ))),
    }
}

/// Split `text` into chunks of exactly `config.max_chunk_size` tokens (the
/// final chunk may be shorter), with `config.chunk_overlap` tokens of
/// trailing context repeated into the next chunk.
pub fn chunk_by_tokens(text: &str, config: &ChunkConfig, tokenizer: &CoreBPE) -> Vec<String> {
    let tokens = tokenizer.encode_ordinary(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let step = config.max_chunk_size.saturating_sub(config.chunk_overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < tokens.len() {
        let end = (start + config.max_chunk_size).min(tokens.len());
        let slice = &tokens[start..end];
        let decoded = tokenizer.decode(slice.to_vec()).unwrap_or_default();
        if postfilter::keep(&decoded) {
            out.push(decoded);
        }
        if end == tokens.len() {
            break;
        }
        start += step;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tokenizer_is_rejected() {
        assert!(tokenizer_for("made-up-encoding").is_err());
    }

    #[test]
    fn cl100k_base_resolves() {
        assert!(tokenizer_for("cl100k_base").is_ok());
    }

    #[test]
    fn chunk_by_tokens_produces_overlapping_windows() {
        let tokenizer = tokenizer_for("cl100k_base").unwrap();
        let config = ChunkConfig {
            max_chunk_size: 20,
            chunk_overlap: 5,
        };
        let text = "word ".repeat(100);
        let chunks = chunk_by_tokens(&text, &config, &tokenizer);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let tokenizer = tokenizer_for("cl100k_base").unwrap();
        let config = ChunkConfig::default();
        assert!(chunk_by_tokens("", &config, &tokenizer).is_empty());
    }
}
