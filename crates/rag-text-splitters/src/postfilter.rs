//! Shared post-filter applied after every chunking method: a chunk is kept
//! iff it is non-empty after trimming, is not composed solely of separator
//! punctuation, and either starts with `#` or contains at least 5
//! alphanumeric characters.

const SEPARATOR_PUNCTUATION: &str = "-*_ \t\n";

/// Whether `chunk` should survive the post-filter.
#[must_use]
pub fn keep(chunk: &str) -> bool {
    let trimmed = chunk.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.chars().all(|c| SEPARATOR_PUNCTUATION.contains(c)) {
        return false;
    }
    if trimmed.starts_with('#') {
        return true;
    }
    trimmed.chars().filter(|c| c.is_alphanumeric()).count() >= 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_dropped() {
        assert!(!keep("   "));
        assert!(!keep(""));
    }

    #[test]
    fn pure_separator_punctuation_is_dropped() {
        assert!(!keep("----------"));
        assert!(!keep("___ ***"));
    }

    #[test]
    fn heading_is_always_kept() {
        assert!(keep("# Hi"));
        assert!(keep("## A"));
    }

    #[test]
    fn short_alnum_below_five_is_dropped() {
        assert!(!keep("ab cd"));
    }

    #[test]
    fn five_or_more_alnum_is_kept() {
        assert!(keep("hello world"));
    }
}
