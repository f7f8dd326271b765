//! On-disk pattern library schema, compilation, and atomic reload.
//!
//! The library is compiled once at load and stored behind
//! `Arc<ArcSwap<CompiledLibrary>>` (SPEC_FULL.md §4): readers never block a
//! writer and a reload never tears a reader mid-match.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwap;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};

/// On-disk representation of a single pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPattern {
    pub regex: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub match_count: u32,
    #[serde(default)]
    pub accuracy: Option<f32>,
    #[serde(default)]
    pub added_date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_confidence() -> f32 {
    0.85
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIntentPatterns {
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<RawPattern>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningStats {
    #[serde(default)]
    pub patterns_learned: u64,
}

/// Top-level `pattern_library.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPatternLibrary {
    #[serde(default)]
    pub patterns: HashMap<String, RawIntentPatterns>,
    #[serde(default)]
    pub learning_stats: LearningStats,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// A compiled pattern: regex plus a live match counter. The counter is the
/// one piece of matcher state mutated from inside a `&self` match call, so
/// it is atomic rather than behind the outer `ArcSwap`.
pub struct CompiledPattern {
    pub regex: regex::Regex,
    pub raw_regex: String,
    pub confidence: f32,
    pub pattern_id: String,
    pub match_count: AtomicU32,
}

pub struct CompiledIntentPatterns {
    pub priority: u8,
    pub patterns: Vec<CompiledPattern>,
}

/// The double-buffered, immutable-once-published library. A reload
/// compiles a brand new `CompiledLibrary` and swaps the `Arc` atomically;
/// in-flight matches against the old value finish uncontended.
pub struct CompiledLibrary {
    pub patterns: HashMap<String, CompiledIntentPatterns>,
}

impl CompiledLibrary {
    pub fn compile(raw: &RawPatternLibrary) -> Result<CompiledLibrary> {
        let mut patterns = HashMap::new();
        for (intent, raw_intent) in &raw.patterns {
            let mut compiled = Vec::with_capacity(raw_intent.patterns.len());
            for (idx, raw_pattern) in raw_intent.patterns.iter().enumerate() {
                let regex = RegexBuilder::new(&raw_pattern.regex)
                    .case_insensitive(true)
                    .multi_line(true)
                    .build()
                    .map_err(|e| Error::InvalidLibrary(format!("{intent}[{idx}]: {e}")))?;
                compiled.push(CompiledPattern {
                    regex,
                    raw_regex: raw_pattern.regex.clone(),
                    confidence: raw_pattern.confidence,
                    pattern_id: format!("{intent}_{idx}"),
                    match_count: AtomicU32::new(raw_pattern.match_count),
                });
            }
            patterns.insert(
                intent.clone(),
                CompiledIntentPatterns { priority: raw_intent.priority, patterns: compiled },
            );
        }
        Ok(CompiledLibrary { patterns })
    }
}

/// Owns the library path and the swappable compiled library, plus the
/// raw (uncompiled) document used to rewrite the file on learn events.
pub struct PatternLibrary {
    path: PathBuf,
    compiled: Arc<ArcSwap<CompiledLibrary>>,
}

impl PatternLibrary {
    /// Load and compile `path`. Missing file or invalid JSON yields an
    /// empty library rather than failing startup, matching
    /// `pattern_matcher_v2.py::reload_patterns`'s error handling.
    pub fn load(path: impl AsRef<Path>) -> Result<PatternLibrary> {
        let path = path.as_ref().to_path_buf();
        let raw = read_raw(&path);
        let compiled = CompiledLibrary::compile(&raw)?;
        Ok(PatternLibrary { path, compiled: Arc::new(ArcSwap::from_pointee(compiled)) })
    }

    #[must_use]
    pub fn current(&self) -> Arc<CompiledLibrary> {
        self.compiled.load_full()
    }

    #[must_use]
    pub fn handle(&self) -> Arc<ArcSwap<CompiledLibrary>> {
        Arc::clone(&self.compiled)
    }

    /// Reload from disk, replacing the published library. Does not tear
    /// in-flight readers (SPEC_FULL.md §4).
    pub fn reload(&self) -> Result<()> {
        let raw = read_raw(&self.path);
        let compiled = CompiledLibrary::compile(&raw)?;
        self.compiled.store(Arc::new(compiled));
        Ok(())
    }

    /// Merge `additions` into the on-disk document under `intent`, rewrite
    /// the file atomically (write-tempfile-then-rename, spec.md §6), then
    /// reload in-process.
    pub fn add_patterns(&self, intent: &str, additions: Vec<RawPattern>) -> Result<usize> {
        let mut raw = read_raw(&self.path);
        let entry = raw.patterns.entry(intent.to_string()).or_insert_with(|| RawIntentPatterns {
            priority: 2,
            description: format!("Auto-learned patterns for {intent}"),
            patterns: Vec::new(),
        });
        let added = additions.len();
        entry.patterns.extend(additions);
        raw.learning_stats.patterns_learned += added as u64;
        raw.last_updated = Some(chrono::Utc::now().to_rfc3339());
        write_raw_atomic(&self.path, &raw)?;
        self.reload()?;
        Ok(added)
    }
}

fn read_raw(path: &Path) -> RawPatternLibrary {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => RawPatternLibrary::default(),
    }
}

fn write_raw_atomic(path: &Path, raw: &RawPatternLibrary) -> Result<()> {
    let body = serde_json::to_string_pretty(raw).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, body).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::InvalidLibrary(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json() -> &'static str {
        r#"{
            "patterns": {
                "comparison": {
                    "priority": 1,
                    "description": "Comparisons",
                    "patterns": [
                        {"regex": "compare\\s+\\w+\\s+and\\s+\\w+", "confidence": 0.9}
                    ]
                }
            },
            "learning_stats": {"patterns_learned": 0}
        }"#
    }

    #[test]
    fn load_compiles_valid_library() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();
        let lib = PatternLibrary::load(file.path()).unwrap();
        let current = lib.current();
        assert!(current.patterns.contains_key("comparison"));
        assert_eq!(current.patterns["comparison"].patterns.len(), 1);
    }

    #[test]
    fn missing_file_yields_empty_library() {
        let lib = PatternLibrary::load("/nonexistent/pattern_library.json").unwrap();
        assert!(lib.current().patterns.is_empty());
    }

    #[test]
    fn invalid_regex_fails_compile() {
        let raw = RawPatternLibrary {
            patterns: HashMap::from([(
                "x".to_string(),
                RawIntentPatterns {
                    priority: 1,
                    description: String::new(),
                    patterns: vec![RawPattern {
                        regex: "(unclosed".to_string(),
                        confidence: 0.9,
                        examples: vec![],
                        match_count: 0,
                        accuracy: None,
                        added_date: None,
                        source: None,
                        description: None,
                    }],
                },
            )]),
            learning_stats: LearningStats::default(),
            last_updated: None,
        };
        assert!(CompiledLibrary::compile(&raw).is_err());
    }

    #[test]
    fn add_patterns_rewrites_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern_library.json");
        std::fs::write(&path, sample_json()).unwrap();
        let lib = PatternLibrary::load(&path).unwrap();

        let added = lib
            .add_patterns(
                "new_intent",
                vec![RawPattern {
                    regex: "foo\\s+bar".to_string(),
                    confidence: 0.95,
                    examples: vec![],
                    match_count: 0,
                    accuracy: None,
                    added_date: None,
                    source: Some("auto_learned".to_string()),
                    description: None,
                }],
            )
            .unwrap();

        assert_eq!(added, 1);
        assert!(lib.current().patterns.contains_key("new_intent"));
        let on_disk = read_raw(&path);
        assert_eq!(on_disk.learning_stats.patterns_learned, 1);
    }
}
