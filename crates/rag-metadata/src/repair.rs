//! Mandatory post-processing applied to every raw LLM metadata output before
//! it is returned: JSON repair, dedup, placeholder filtering, triplet
//! validation, and per-field truncation.

use rag_core::{MetadataFields, PipelineError};
use regex::Regex;

/// Case-insensitive placeholder keywords the extractor's prompt sometimes
/// echoes back literally instead of real content.
const PLACEHOLDER_KEYWORDS: &[&str] = &[
    "full product names",
    "company names",
    "technical terms",
    "key terms",
    "relevant keywords",
    "n/a",
    "none",
];

/// Parse a raw LLM response into a [`MetadataFields`], applying repair
/// fallbacks in order: direct parse, reasoning-tag strip, markdown
/// code-fence extraction, balanced-brace extraction. Fails with
/// [`PipelineError::ParseError`] if none succeed.
pub fn parse_and_repair(raw: &str) -> Result<MetadataFields, PipelineError> {
    let candidates = [
        raw.to_string(),
        strip_reasoning_tags(raw),
        extract_code_fence(raw).unwrap_or_default(),
        extract_balanced_braces(raw).unwrap_or_default(),
    ];

    for candidate in candidates {
        if candidate.trim().is_empty() {
            continue;
        }
        if let Ok(raw_fields) = serde_json::from_str::<RawMetadata>(candidate.trim()) {
            return Ok(post_process(raw_fields));
        }
    }

    Err(PipelineError::ParseError(
        "could not parse metadata JSON after repair attempts".to_string(),
    ))
}

#[derive(Debug, Default, serde::Deserialize)]
struct RawMetadata {
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    topics: String,
    #[serde(default)]
    questions: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    semantic_keywords: String,
    #[serde(default)]
    entity_relationships: String,
    #[serde(default)]
    attributes: String,
}

fn strip_reasoning_tags(s: &str) -> String {
    Regex::new(r"(?is)<think>.*?</think>")
        .map(|re| re.replace_all(s, "").to_string())
        .unwrap_or_else(|_| s.to_string())
}

fn extract_code_fence(s: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok()?;
    re.captures(s).map(|c| c[1].to_string())
}

fn extract_balanced_braces(s: &str) -> Option<String> {
    let start = s.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in s[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(s[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn post_process(raw: RawMetadata) -> MetadataFields {
    let keywords = filter_placeholders(&raw.keywords);
    let semantic_keywords = dedup_against_keywords(&raw.semantic_keywords, &keywords);
    let entity_relationships = validate_triplets(&raw.entity_relationships);

    let mut fields = MetadataFields {
        keywords,
        topics: raw.topics,
        questions: raw.questions,
        summary: raw.summary,
        semantic_keywords,
        entity_relationships,
        attributes: raw.attributes,
    };
    fields.truncate_to_caps();
    fields
}

/// Remove items from `keywords` whose case-insensitive form is a known
/// generic placeholder the model echoed from the prompt.
fn filter_placeholders(keywords: &str) -> String {
    split_csv(keywords)
        .into_iter()
        .filter(|item| !PLACEHOLDER_KEYWORDS.contains(&item.to_ascii_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Remove any `semantic_keywords` item that case-insensitively equals an
/// item already present in `keywords`.
fn dedup_against_keywords(semantic_keywords: &str, keywords: &str) -> String {
    let keyword_set: std::collections::HashSet<String> = split_csv(keywords)
        .into_iter()
        .map(|k| k.to_ascii_lowercase())
        .collect();

    split_csv(semantic_keywords)
        .into_iter()
        .filter(|item| !keyword_set.contains(&item.to_ascii_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keep only `entity_relationships` items containing at least 2 arrow
/// tokens (`->` or `→`); rejoin survivors with `" | "`.
fn validate_triplets(entity_relationships: &str) -> String {
    entity_relationships
        .split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| count_arrows(item) >= 2)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn count_arrows(s: &str) -> usize {
    s.matches("->").count() + s.matches('\u{2192}').count()
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_directly() {
        let raw = r#"{"keywords":"apple, iphone","topics":"electronics","questions":"what is it?","summary":"a phone","semantic_keywords":"smartphone","entity_relationships":"Apple -> makes -> iPhone -> sold_by -> Store","attributes":"color: black"}"#;
        let parsed = parse_and_repair(raw).unwrap();
        assert_eq!(parsed.keywords, "apple, iphone");
    }

    #[test]
    fn strips_reasoning_tags_before_parsing() {
        let raw = r#"<think>let me think</think>{"keywords":"a","topics":"b","questions":"c","summary":"d","semantic_keywords":"e","entity_relationships":"","attributes":""}"#;
        let parsed = parse_and_repair(raw).unwrap();
        assert_eq!(parsed.keywords, "a");
    }

    #[test]
    fn extracts_from_markdown_code_fence() {
        let raw = "```json\n{\"keywords\":\"a\",\"topics\":\"\",\"questions\":\"\",\"summary\":\"\",\"semantic_keywords\":\"\",\"entity_relationships\":\"\",\"attributes\":\"\"}\n```";
        let parsed = parse_and_repair(raw).unwrap();
        assert_eq!(parsed.keywords, "a");
    }

    #[test]
    fn extracts_balanced_braces_from_surrounding_prose() {
        let raw = r#"Sure, here you go: {"keywords":"a","topics":"","questions":"","summary":"","semantic_keywords":"","entity_relationships":"","attributes":""} hope that helps!"#;
        let parsed = parse_and_repair(raw).unwrap();
        assert_eq!(parsed.keywords, "a");
    }

    #[test]
    fn unparseable_input_fails() {
        let err = parse_and_repair("not json at all, no braces here").unwrap_err();
        assert!(matches!(err, PipelineError::ParseError(_)));
    }

    #[test]
    fn dedup_removes_case_insensitive_overlap() {
        let result = dedup_against_keywords("apple, smartphone", "Apple, iPhone");
        assert_eq!(result, "smartphone");
    }

    #[test]
    fn placeholder_keywords_are_filtered() {
        let result = filter_placeholders("full product names, iPhone, company names");
        assert_eq!(result, "iPhone");
    }

    #[test]
    fn triplets_require_two_arrows() {
        let result = validate_triplets("Apple -> makes -> iPhone | just one arrow -> here | Apple -> sold_by -> Store");
        assert_eq!(result, "Apple -> makes -> iPhone | Apple -> sold_by -> Store");
    }

    #[test]
    fn unicode_arrow_counts_toward_triplet_validity() {
        let result = validate_triplets("A \u{2192} B \u{2192} C");
        assert_eq!(result, "A \u{2192} B \u{2192} C");
    }

    #[test]
    fn fields_are_truncated_to_caps() {
        let raw = RawMetadata {
            keywords: "k,".repeat(300),
            ..Default::default()
        };
        let fields = post_process(raw);
        assert!(fields.keywords.len() <= 500);
    }
}
