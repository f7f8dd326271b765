//! Per-field boost scoring (spec.md §4.7): fuses the seven structured
//! metadata fields returned alongside an ANN hit into an additive boost.

use std::collections::HashSet;

use crate::weights::{BoostWeights, MAX_TOTAL_BOOST};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "of", "in", "on", "to", "and", "or", "for",
    "with", "that", "this", "what", "how", "why", "when", "where", "which", "who", "whom", "it",
    "as", "by", "at", "be", "do", "does", "did", "has", "have", "had", "can", "will", "would",
];

/// Lowercase, split on non-alphanumeric boundaries, drop stopwords and
/// tokens of length ≤ 2.
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

fn split_csv_tokens(field: &str) -> Vec<HashSet<String>> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(tokenize)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// `keywords` contribution: set-intersection of tokenized query with
/// comma-split chunk keywords, diminishing returns capped at 3 matches.
fn keywords_boost(query_tokens: &HashSet<String>, field: &str, weight: f32) -> f32 {
    let chunk_tokens: HashSet<String> = field
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    let matches = query_tokens.intersection(&chunk_tokens).count();
    (matches.min(3) as f32) * weight
}

/// `topics` contribution: count of comma-split topics whose word-set
/// intersects the query tokens at all, times the weight.
fn topics_boost(query_tokens: &HashSet<String>, field: &str, weight: f32) -> f32 {
    let count = split_csv_tokens(field)
        .iter()
        .filter(|topic_tokens| !topic_tokens.is_disjoint(query_tokens))
        .count();
    (count as f32) * weight
}

/// `questions` contribution: max Jaccard similarity across `?`-split
/// questions vs the query tokens, tiered into full/half/zero weight.
fn questions_boost(query_tokens: &HashSet<String>, field: &str, weight: f32) -> f32 {
    let best = field
        .split('?')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|q| jaccard(&tokenize(q), query_tokens))
        .fold(0.0_f32, f32::max);

    if best > 0.5 {
        weight
    } else if best > 0.3 {
        0.5 * weight
    } else {
        0.0
    }
}

/// `summary` contribution: fraction of query tokens appearing in the
/// summary text, tiered into full/scaled/zero weight.
fn fraction_matched_boost(query_tokens: &HashSet<String>, field: &str, weight: f32) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let field_tokens = tokenize(field);
    let matched = query_tokens.intersection(&field_tokens).count() as f32;
    let fraction = matched / (query_tokens.len() as f32);

    if fraction > 0.6 {
        weight
    } else if fraction > 0.3 {
        weight * (fraction / 0.6)
    } else {
        0.0
    }
}

/// `entity_relationships` contribution: analogous to `topics` — count of
/// newline/comma-separated relationship items whose word-set intersects the
/// query tokens.
fn entity_relationships_boost(query_tokens: &HashSet<String>, field: &str, weight: f32) -> f32 {
    let count = field
        .split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(tokenize)
        .filter(|item_tokens| !item_tokens.is_disjoint(query_tokens))
        .count();
    (count as f32) * weight
}

/// Per-field contribution, summed and capped by [`compute_boost`].
#[derive(Debug, Clone)]
pub struct FieldMatch {
    pub field: &'static str,
    pub contribution: f32,
}

/// Sum every field's contribution for one hit, capped at
/// [`MAX_TOTAL_BOOST`]. Returns the capped total plus the list of fields
/// that contributed a non-zero amount, in evaluation order.
#[must_use]
pub fn compute_boost(
    query_tokens: &HashSet<String>,
    keywords: &str,
    topics: &str,
    questions: &str,
    summary: &str,
    semantic_keywords: &str,
    entity_relationships: &str,
    attributes: &str,
    weights: &BoostWeights,
) -> (f32, Vec<FieldMatch>) {
    let candidates = [
        ("keywords", keywords_boost(query_tokens, keywords, weights.keywords)),
        ("topics", topics_boost(query_tokens, topics, weights.topics)),
        ("questions", questions_boost(query_tokens, questions, weights.questions)),
        ("summary", fraction_matched_boost(query_tokens, summary, weights.summary)),
        (
            "semantic_keywords",
            keywords_boost(query_tokens, semantic_keywords, weights.semantic_keywords),
        ),
        (
            "entity_relationships",
            entity_relationships_boost(query_tokens, entity_relationships, weights.entity_relationships),
        ),
        ("attributes", fraction_matched_boost(query_tokens, attributes, weights.attributes)),
    ];

    let matches: Vec<FieldMatch> = candidates
        .iter()
        .filter(|(_, contribution)| *contribution > 0.0)
        .map(|(field, contribution)| FieldMatch { field, contribution: *contribution })
        .collect();

    let total: f32 = candidates.iter().map(|(_, c)| c).sum();
    (total.min(MAX_TOTAL_BOOST), matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_short_and_stopwords() {
        let tokens = tokenize("The Price Is $1199 USD of it");
        assert!(tokens.contains("price"));
        assert!(tokens.contains("usd"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("of"));
    }

    #[test]
    fn keywords_boost_diminishing_returns_caps_at_three() {
        let query = tokenize("apple iphone pro max price");
        let weight = 0.10;
        let boost = keywords_boost(&query, "apple, iphone, pro, max, unrelated", weight);
        assert!((boost - 0.30).abs() < 1e-6);
    }

    #[test]
    fn keywords_boost_zero_when_no_overlap() {
        let query = tokenize("completely unrelated words");
        let boost = keywords_boost(&query, "apple, iphone", 0.10);
        assert_eq!(boost, 0.0);
    }

    #[test]
    fn topics_boost_counts_intersecting_topics() {
        let query = tokenize("smartphone pricing");
        let boost = topics_boost(&query, "smartphone hardware, unrelated topic, pricing strategy", 0.06);
        assert!((boost - 0.12).abs() < 1e-6);
    }

    #[test]
    fn questions_boost_tiers_on_jaccard() {
        let query = tokenize("what is the price of the iphone");
        let high = questions_boost(&query, "What is the price of the iPhone?", 0.08);
        assert!((high - 0.08).abs() < 1e-6);

        let none = questions_boost(&query, "How do I reset my password?", 0.08);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn fraction_matched_boost_full_weight_above_point_six() {
        let query = tokenize("apple iphone pro max price");
        let full = fraction_matched_boost(&query, "apple iphone pro max price specifications", 0.06);
        assert!((full - 0.06).abs() < 1e-6);
    }

    #[test]
    fn fraction_matched_boost_scaled_between_thresholds() {
        let query = tokenize("apple iphone pro max price release");
        let scaled = fraction_matched_boost(&query, "apple iphone release", 0.06);
        assert!(scaled > 0.0 && scaled < 0.06);
    }

    #[test]
    fn compute_boost_caps_at_max_total_boost() {
        let query = tokenize("apple iphone pro max price smartphone");
        let weights = BoostWeights {
            keywords: 0.5,
            topics: 0.5,
            questions: 0.5,
            summary: 0.5,
            semantic_keywords: 0.5,
            entity_relationships: 0.5,
            attributes: 0.5,
        };
        let (total, _) = compute_boost(
            &query,
            "apple, iphone, pro",
            "smartphone, pricing",
            "What is the apple iphone pro max price?",
            "apple iphone pro max price smartphone",
            "apple, iphone",
            "iphone -> apple -> product",
            "apple iphone pro max price",
            &weights,
        );
        assert!(total <= MAX_TOTAL_BOOST);
    }

    #[test]
    fn compute_boost_zero_fields_yields_zero_boost() {
        let query = tokenize("apple iphone price");
        let weights = BoostWeights::default();
        let (total, matches) = compute_boost(&query, "", "", "", "", "", "", "", &weights);
        assert_eq!(total, 0.0);
        assert!(matches.is_empty());
    }
}
