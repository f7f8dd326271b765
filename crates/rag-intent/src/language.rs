//! Output-language detection (`intent_api.py::detect_output_languages`,
//! SPEC_FULL.md §3): a secondary, regex-based detector independent of the
//! primary `language` field, looking for explicit output-language requests
//! embedded in the query text.

use regex::Regex;
use std::sync::OnceLock;

struct LanguageRule {
    code: &'static str,
    pattern: &'static str,
}

const RULES: &[LanguageRule] = &[
    LanguageRule { code: "fr", pattern: r"(?i)\b(french|fran[cç]ais|in french)\b" },
    LanguageRule { code: "es", pattern: r"(?i)\b(spanish|espa[nñ]ol|in spanish)\b" },
    LanguageRule { code: "de", pattern: r"(?i)\b(german|deutsch|in german)\b" },
    LanguageRule { code: "zh", pattern: r"(?i)\b(chinese|mandarin|中文|in chinese)\b" },
    LanguageRule { code: "ja", pattern: r"(?i)\b(japanese|日本語|in japanese)\b" },
];

fn compiled_rules() -> &'static Vec<(&'static str, Regex)> {
    static CELL: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CELL.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|rule| Regex::new(rule.pattern).ok().map(|re| (rule.code, re)))
            .collect()
    })
}

/// Returns the set of explicitly-requested output-language codes found in
/// `query`, in rule order, deduplicated. Defaults to `["en"]` when none of
/// the supported codes (`fr, es, de, zh, ja`) are requested.
#[must_use]
pub fn detect_output_languages(query: &str) -> Vec<String> {
    let found: Vec<String> =
        compiled_rules().iter().filter(|(_, re)| re.is_match(query)).map(|(code, _)| (*code).to_string()).collect();

    if found.is_empty() {
        vec!["en".to_string()]
    } else {
        found
    }
}
