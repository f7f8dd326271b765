//! Recursive chunking: a priority-ordered list of separators, splitting
//! greedily at the highest-priority separator that keeps chunks within the
//! target size.

use regex::Regex;

use crate::config::ChunkConfig;
use crate::postfilter;

/// Default separator priority: markdown headers, horizontal rules, paragraph
/// breaks, single lines, spaces, then individual characters. Earlier entries
/// win ties.
#[must_use]
pub fn default_separators() -> Vec<String> {
    vec![
        r"(?m)^#{1,6}\s".to_string(),
        r"(?m)^(?:-{3,}|\*{3,}|_{3,})$".to_string(),
        "\n\n".to_string(),
        "\n".to_string(),
        " ".to_string(),
        String::new(),
    ]
}

fn is_regex_separator(sep: &str) -> bool {
    sep.starts_with("(?m)")
}

/// Split `text` into raw segments by the first separator (in priority order)
/// that actually occurs, recursing into any resulting segment still over
/// `config.max_chunk_size`.
#[must_use]
pub fn split_recursive(text: &str, separators: &[String], config: &ChunkConfig) -> Vec<String> {
    let mut raw_splits = recurse(text, separators, config);
    raw_splits.retain(|s| !s.trim().is_empty());
    raw_splits
}

fn recurse(text: &str, separators: &[String], config: &ChunkConfig) -> Vec<String> {
    if text.chars().count() <= config.max_chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep_idx, sep)) = pick_separator(text, separators) else {
        return vec![text.to_string()];
    };

    let pieces = split_by_separator(text, sep);
    let remaining = &separators[sep_idx + 1..];

    let joined_sep = if is_regex_separator(sep) { "" } else { sep.as_str() };
    let merged = config.merge_splits(&pieces, joined_sep);

    let mut out = Vec::new();
    for piece in merged {
        if piece.chars().count() > config.max_chunk_size && !remaining.is_empty() {
            out.extend(recurse(&piece, remaining, config));
        } else {
            out.push(piece);
        }
    }
    out
}

fn pick_separator<'a>(text: &str, separators: &'a [String]) -> Option<(usize, &'a String)> {
    separators.iter().enumerate().find(|(_, sep)| {
        if sep.is_empty() {
            true
        } else if is_regex_separator(sep) {
            Regex::new(sep).is_ok_and(|re| re.is_match(text))
        } else {
            text.contains(sep.as_str())
        }
    })
}

fn split_by_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(String::from).collect();
    }
    if is_regex_separator(sep) {
        if let Ok(re) = Regex::new(sep) {
            return re.split(text).map(str::to_string).collect();
        }
    }
    text.split(sep).map(str::to_string).collect()
}

/// Run the recursive chunker end-to-end, applying the shared post-filter to
/// the produced segments.
#[must_use]
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let separators = default_separators();
    let raw = split_recursive(text, &separators, config);
    raw.into_iter().filter(|c| postfilter::keep(c)).collect()
}
