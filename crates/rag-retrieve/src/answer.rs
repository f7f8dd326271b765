//! Answer generation: assembles a context-grounded prompt from the final
//! chunk set and calls the LLM gateway, batched or streamed.
//!
//! Prompt shape and citation notation (`[Source N]`) are grounded on
//! `answer_generation/v1.0.0/config.py`'s system prompts.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use rag_core::{ChatMessage, ChatRequest, LlmGateway, Result};
use regex::Regex;

use crate::types::{Citation, ContextChunk};

/// Builds the user-turn prompt: the query followed by each chunk under a
/// `[Source N]` heading with its metadata, so the model can cite by number.
#[must_use]
pub fn build_prompt(query: &str, chunks: &[ContextChunk]) -> String {
    let mut sections = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let mut section = format!("[Source {}]\n{}", i + 1, chunk.text);
        if !chunk.topics.is_empty() {
            section.push_str(&format!("\nTopics: {}", chunk.topics));
        }
        if !chunk.keywords.is_empty() {
            section.push_str(&format!("\nKeywords: {}", chunk.keywords));
        }
        if !chunk.summary.is_empty() {
            section.push_str(&format!("\nSummary: {}", chunk.summary));
        }
        sections.push(section);
    }

    format!("Context:\n\n{}\n\nQuestion: {query}", sections.join("\n\n"))
}

/// Scans the generated answer for `[Source N]` references and resolves them
/// against the context chunks that produced the prompt.
#[must_use]
pub fn extract_citations(answer: &str, chunks: &[ContextChunk]) -> Vec<Citation> {
    let pattern = Regex::new(r"\[Source (\d+)\]").expect("static regex is valid");
    let mut seen = std::collections::BTreeSet::new();
    let mut citations = Vec::new();

    for capture in pattern.captures_iter(answer) {
        let Ok(source_id) = capture[1].parse::<usize>() else { continue };
        if !seen.insert(source_id) {
            continue;
        }
        let Some(chunk) = source_id.checked_sub(1).and_then(|idx| chunks.get(idx)) else { continue };
        citations.push(Citation {
            source_id: source_id as u32,
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            text_snippet: rag_core::types::truncate_at_separator(&chunk.text, 280),
        });
    }

    citations
}

/// Generate a full answer in one call, returning the answer text and (if
/// `enable_citations`) the citations resolved from it.
pub async fn generate(
    gateway: &LlmGateway,
    model: &str,
    system_prompt: &str,
    query: &str,
    chunks: &[ContextChunk],
    max_tokens: u32,
    temperature: f32,
    enable_citations: bool,
) -> Result<(String, Vec<Citation>)> {
    if chunks.is_empty() {
        return Ok(("I could not find any relevant information to answer this question.".to_string(), Vec::new()));
    }

    let prompt = build_prompt(query, chunks);
    let response = gateway
        .chat(ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: prompt },
            ],
            temperature_milli: (temperature * 1000.0) as u32,
            max_tokens,
            response_format: None,
            stream: false,
        })
        .await?;

    let citations = if enable_citations { extract_citations(&response.content, chunks) } else { Vec::new() };
    Ok((response.content, citations))
}

/// Streaming counterpart of [`generate`]: returns content deltas as they
/// arrive. Citations cannot be resolved until the full answer is known, so
/// streaming responses omit them (spec.md §6 notes streaming returns
/// OpenAI-compatible delta chunks, not the full envelope).
pub async fn generate_stream(
    gateway: Arc<LlmGateway>,
    model: &str,
    system_prompt: &str,
    query: &str,
    chunks: &[ContextChunk],
    max_tokens: u32,
    temperature: f32,
) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send>>> {
    let prompt = build_prompt(query, chunks);
    gateway
        .chat_stream(ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: prompt },
            ],
            temperature_milli: (temperature * 1000.0) as u32,
            max_tokens,
            response_format: None,
            stream: true,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(id: &str, text: &str) -> ContextChunk {
        ContextChunk {
            chunk_id: id.to_string(),
            document_id: "doc-1".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score: 0.9,
            topics: "electronics".to_string(),
            keywords: "iphone".to_string(),
            questions: String::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn prompt_numbers_sources_in_order() {
        let chunks = vec![sample_chunk("a", "iPhone 15"), sample_chunk("b", "Galaxy S24")];
        let prompt = build_prompt("compare phones", &chunks);
        assert!(prompt.contains("[Source 1]\niPhone 15"));
        assert!(prompt.contains("[Source 2]\nGalaxy S24"));
        assert!(prompt.contains("Question: compare phones"));
    }

    #[test]
    fn citations_resolve_source_numbers_to_chunks() {
        let chunks = vec![sample_chunk("a", "iPhone 15"), sample_chunk("b", "Galaxy S24")];
        let answer = "The iPhone [Source 1] is lighter than the Galaxy [Source 2].";
        let citations = extract_citations(answer, &chunks);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].chunk_id, "a");
        assert_eq!(citations[1].chunk_id, "b");
    }

    #[test]
    fn duplicate_citations_are_deduplicated() {
        let chunks = vec![sample_chunk("a", "iPhone 15")];
        let answer = "[Source 1] says X. Also, [Source 1] says Y.";
        let citations = extract_citations(answer, &chunks);
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn out_of_range_source_is_ignored() {
        let chunks = vec![sample_chunk("a", "iPhone 15")];
        let answer = "[Source 9] does not exist.";
        assert!(extract_citations(answer, &chunks).is_empty());
    }
}
