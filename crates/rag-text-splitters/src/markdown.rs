//! Markdown-header splitting: splits at configured heading levels, carrying
//! the heading path (e.g. `["Intro", "Background"]`) alongside each chunk so
//! downstream metadata extraction retains document structure.

use regex::Regex;

use crate::postfilter;

/// A chunk produced by the markdown splitter, with its heading path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownChunk {
    pub text: String,
    pub heading_path: Vec<String>,
}

/// Split `text` at the configured heading levels (e.g. `[1, 2]` splits on `#`
/// and `##` but not `###`). Each chunk carries the stack of ancestor
/// headings active at that point in the document.
#[must_use]
pub fn split_markdown(text: &str, heading_levels: &[u8]) -> Vec<MarkdownChunk> {
    let header_re = Regex::new(r"(?m)^(#{1,6})\s+(.*)$").expect("static regex is valid");

    let mut chunks = Vec::new();
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, stack: &[(u8, String)], chunks: &mut Vec<MarkdownChunk>| {
        if postfilter::keep(current) {
            chunks.push(MarkdownChunk {
                text: current.trim().to_string(),
                heading_path: stack.iter().map(|(_, h)| h.clone()).collect(),
            });
        }
        current.clear();
    };

    let mut last_end = 0;
    for cap in header_re.captures_iter(text) {
        let m = cap.get(0).expect("whole match always present");
        current.push_str(&text[last_end..m.start()]);
        last_end = m.end();

        let level = cap[1].len() as u8;
        let heading = cap[2].trim().to_string();

        if heading_levels.contains(&level) {
            flush(&mut current, &stack, &mut chunks);
            stack.retain(|(lvl, _)| *lvl < level);
            stack.push((level, heading));
        } else {
            current.push_str(&cap[0]);
            current.push('\n');
        }
    }
    current.push_str(&text[last_end..]);
    flush(&mut current, &stack, &mut chunks);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_configured_level() {
        let text = "# Intro\nHello world here.\n## Background\nMore words follow below.";
        let chunks = split_markdown(text, &[1, 2]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, vec!["Intro".to_string()]);
        assert_eq!(chunks[1].heading_path, vec!["Intro".to_string(), "Background".to_string()]);
    }

    #[test]
    fn ignores_levels_not_configured() {
        let text = "# Intro\nSome words in here please.\n### Deep\nMore words appear right here.";
        let chunks = split_markdown(text, &[1]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Deep"));
    }

    #[test]
    fn heading_stack_pops_on_sibling() {
        let text = "# A\nwords words words words.\n## B\nwords words words words.\n# C\nwords words words words.";
        let chunks = split_markdown(text, &[1, 2]);
        let last = chunks.last().unwrap();
        assert_eq!(last.heading_path, vec!["C".to_string()]);
    }
}
