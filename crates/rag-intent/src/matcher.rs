//! Tier 1: multi-dimensional pattern scoring (spec.md §4.8), a faithful
//! port of `pattern_matcher_v2.py::AdvancedPatternMatcher`.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::library::{CompiledLibrary, PatternLibrary};
use crate::types::{IntentScoreSummary, PatternScoring};

pub const CONFIDENCE_HIGH: f32 = 0.90;
pub const CONFIDENCE_MEDIUM: f32 = 0.70;
pub const CONFIDENCE_LOW: f32 = 0.50;
pub const CONFIDENCE_MULTI_INTENT: f32 = 0.85;

struct ConflictRule {
    intent: &'static str,
    conflicts_with: &'static [&'static str],
    penalty_factor: f32,
    reason: &'static str,
}

const INTENT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule {
        intent: "list_enumeration",
        conflicts_with: &["relationship_mapping", "cross_reference", "aggregation", "negative_logic"],
        penalty_factor: 0.65,
        reason: "Too generic - specific intent takes precedence",
    },
    ConflictRule {
        intent: "factual_retrieval",
        conflicts_with: &["comparison", "aggregation", "temporal", "cross_reference"],
        penalty_factor: 0.75,
        reason: "Generic lookup - specific analysis takes precedence",
    },
    ConflictRule {
        intent: "definition_explanation",
        conflicts_with: &["simple_lookup", "comparison", "aggregation"],
        penalty_factor: 0.70,
        reason: "Too generic - specific lookup/analysis takes precedence",
    },
];

const MULTI_PATTERN_THRESHOLD: usize = 2;
const MULTI_PATTERN_FACTOR: f32 = 1.25;
const EARLY_POSITION_MAX: usize = 20;
const EARLY_POSITION_FACTOR: f32 = 1.10;
const LONG_MATCH_MIN_LENGTH: usize = 30;
const LONG_MATCH_FACTOR: f32 = 1.15;

#[derive(Debug, Clone)]
struct PatternMatch {
    confidence: f32,
    position: usize,
    length: usize,
}

struct IntentScore {
    base_score: f32,
    final_score: f32,
    pattern_matches: Vec<PatternMatch>,
    penalties: Vec<(String, f32)>,
    boosts: Vec<(String, f32)>,
}

#[derive(Debug, Default, Clone)]
struct MatcherStats {
    total_queries: u64,
    pattern_hits: u64,
    llm_fallbacks: u64,
    multi_intent_queries: u64,
    conflict_resolutions: u64,
    avg_confidence: f64,
}

/// Aggregated stats surfaced at `GET /v1/stats` (SPEC_FULL.md §3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct MatcherStatsView {
    pub total_queries: u64,
    pub pattern_hits: u64,
    pub llm_fallbacks: u64,
    pub multi_intent_queries: u64,
    pub conflict_resolutions: u64,
    pub avg_confidence: f64,
    pub pattern_hit_rate: f64,
    pub llm_fallback_rate: f64,
    pub multi_intent_rate: f64,
}

/// Result of a successful Tier 1 match.
pub struct MatchOutcome {
    pub intent: String,
    pub confidence: f32,
    pub scoring: PatternScoring,
}

/// Owns the compiled library handle and live stats counters; `match_query`
/// is the Rust equivalent of `AdvancedPatternMatcher.match`.
pub struct PatternMatcher {
    handle: std::sync::Arc<arc_swap::ArcSwap<CompiledLibrary>>,
    stats: Mutex<MatcherStats>,
}

impl PatternMatcher {
    #[must_use]
    pub fn new(library: &PatternLibrary) -> Self {
        Self { handle: library.handle(), stats: Mutex::new(MatcherStats::default()) }
    }

    fn library_snapshot(&self) -> std::sync::Arc<CompiledLibrary> {
        self.handle.load_full()
    }

    fn find_all_matches(&self, query: &str) -> BTreeMap<String, IntentScore> {
        let library = self.library_snapshot();
        let mut scores = BTreeMap::new();

        for (intent, intent_patterns) in &library.patterns {
            let mut matches = Vec::new();
            for pattern in &intent_patterns.patterns {
                if let Some(m) = pattern.regex.find(query) {
                    matches.push(PatternMatch { confidence: pattern.confidence, position: m.start(), length: m.len() });
                    pattern.match_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            if !matches.is_empty() {
                let base_score: f32 = matches.iter().map(|m| m.confidence).sum();
                scores.insert(
                    intent.clone(),
                    IntentScore { base_score, final_score: base_score, pattern_matches: matches, penalties: Vec::new(), boosts: Vec::new() },
                );
            }
        }
        scores
    }

    fn apply_scoring_rules(&self, scores: &mut BTreeMap<String, IntentScore>) {
        let present: Vec<String> = scores.keys().cloned().collect();

        for rule in INTENT_CONFLICTS {
            if let Some(score) = scores.get_mut(rule.intent) {
                if rule.conflicts_with.iter().any(|c| present.iter().any(|p| p == c)) {
                    score.final_score *= rule.penalty_factor;
                    score.penalties.push((rule.reason.to_string(), rule.penalty_factor));
                    self.stats.lock().conflict_resolutions += 1;
                }
            }
        }

        for score in scores.values_mut() {
            if score.pattern_matches.len() >= MULTI_PATTERN_THRESHOLD {
                score.final_score *= MULTI_PATTERN_FACTOR;
                score.boosts.push(("Multiple patterns matched - high confidence".to_string(), MULTI_PATTERN_FACTOR));
            }

            let earliest = score.pattern_matches.iter().map(|m| m.position).min().unwrap_or(usize::MAX);
            if earliest <= EARLY_POSITION_MAX {
                score.final_score *= EARLY_POSITION_FACTOR;
                score.boosts.push(("Pattern at query start - clear intent signal".to_string(), EARLY_POSITION_FACTOR));
            }

            let longest = score.pattern_matches.iter().map(|m| m.length).max().unwrap_or(0);
            if longest >= LONG_MATCH_MIN_LENGTH {
                score.final_score *= LONG_MATCH_FACTOR;
                score.boosts.push(("Long pattern match - specific query".to_string(), LONG_MATCH_FACTOR));
            }
        }
    }

    /// Run the full Tier 1 algorithm. Returns `None` when no pattern
    /// matched at all or the winner's score is below [`CONFIDENCE_LOW`]
    /// (falls back to Tier 2).
    pub fn match_query(&self, query: &str) -> Option<MatchOutcome> {
        self.stats.lock().total_queries += 1;

        let mut scores = self.find_all_matches(query.trim());
        if scores.is_empty() {
            self.stats.lock().llm_fallbacks += 1;
            return None;
        }

        self.apply_scoring_rules(&mut scores);
        for score in scores.values_mut() {
            score.final_score = score.final_score.min(1.0);
        }

        let mut sorted: Vec<(&String, &IntentScore)> = scores.iter().collect();
        sorted.sort_by(|a, b| b.1.final_score.partial_cmp(&a.1.final_score).unwrap_or(std::cmp::Ordering::Equal));

        let (best_intent, best_score_data) = sorted[0];
        let best_score = best_score_data.final_score;

        let multi_intent_candidates: Vec<String> =
            scores.iter().filter(|(_, s)| s.final_score >= CONFIDENCE_MULTI_INTENT).map(|(i, _)| i.clone()).collect();
        let is_multi_intent = multi_intent_candidates.len() > 1;
        if is_multi_intent {
            self.stats.lock().multi_intent_queries += 1;
        }

        let all_scores: BTreeMap<String, IntentScoreSummary> = sorted
            .iter()
            .take(5)
            .map(|(intent, score)| {
                (
                    (*intent).clone(),
                    IntentScoreSummary {
                        final_score: score.final_score,
                        base_score: score.base_score,
                        patterns_matched: score.pattern_matches.len(),
                        penalties: score.penalties.clone(),
                        boosts: score.boosts.clone(),
                    },
                )
            })
            .collect();

        let runner_up = sorted.get(1).map(|(i, _)| (*i).clone());
        let runner_up_score = sorted.get(1).map_or(0.0, |(_, s)| s.final_score);

        let scoring = PatternScoring {
            all_scores,
            runner_up: runner_up.clone(),
            runner_up_score,
            confidence_gap: best_score - runner_up_score,
            multi_intent: is_multi_intent,
            multi_intent_candidates,
        };

        if best_score < CONFIDENCE_LOW {
            self.stats.lock().llm_fallbacks += 1;
            return None;
        }

        let mut stats = self.stats.lock();
        stats.pattern_hits += 1;
        stats.avg_confidence =
            (stats.avg_confidence * ((stats.pattern_hits - 1) as f64) + best_score as f64) / (stats.pattern_hits as f64);
        drop(stats);

        Some(MatchOutcome { intent: best_intent.clone(), confidence: best_score, scoring })
    }

    #[must_use]
    pub fn stats(&self) -> MatcherStatsView {
        let s = self.stats.lock().clone();
        let hit_rate = if s.total_queries > 0 { (s.pattern_hits as f64 / s.total_queries as f64) * 100.0 } else { 0.0 };
        let multi_rate = if s.total_queries > 0 { (s.multi_intent_queries as f64 / s.total_queries as f64) * 100.0 } else { 0.0 };
        MatcherStatsView {
            total_queries: s.total_queries,
            pattern_hits: s.pattern_hits,
            llm_fallbacks: s.llm_fallbacks,
            multi_intent_queries: s.multi_intent_queries,
            conflict_resolutions: s.conflict_resolutions,
            avg_confidence: s.avg_confidence,
            pattern_hit_rate: hit_rate,
            llm_fallback_rate: 100.0 - hit_rate,
            multi_intent_rate: multi_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{PatternLibrary, RawPattern};
    use std::io::Write;

    fn matcher_from_json(json: &str) -> (tempfile::NamedTempFile, PatternLibrary) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let lib = PatternLibrary::load(file.path()).unwrap();
        (file, lib)
    }

    #[test]
    fn no_match_falls_back_to_llm() {
        let (_f, lib) = matcher_from_json(r#"{"patterns": {}}"#);
        let matcher = PatternMatcher::new(&lib);
        assert!(matcher.match_query("asdf zxcv").is_none());
    }

    #[test]
    fn conflict_resolution_list_vs_relationship_mapping() {
        let json = r#"{
            "patterns": {
                "list_enumeration": {"priority": 1, "description": "", "patterns": [
                    {"regex": "list\\s+\\w+", "confidence": 0.90}
                ]},
                "relationship_mapping": {"priority": 1, "description": "", "patterns": [
                    {"regex": "differs\\s+from", "confidence": 0.90}
                ]}
            }
        }"#;
        let (_f, lib) = matcher_from_json(json);
        let matcher = PatternMatcher::new(&lib);
        let outcome = matcher.match_query("List products whose manufacturer differs from the vendor").unwrap();
        assert_eq!(outcome.intent, "relationship_mapping");
    }

    #[test]
    fn multi_pattern_boost_applies_when_two_patterns_match() {
        let json = r#"{
            "patterns": {
                "comparison": {"priority": 1, "description": "", "patterns": [
                    {"regex": "compare", "confidence": 0.5},
                    {"regex": "versus", "confidence": 0.5}
                ]}
            }
        }"#;
        let (_f, lib) = matcher_from_json(json);
        let matcher = PatternMatcher::new(&lib);
        let outcome = matcher.match_query("compare apples versus oranges").unwrap();
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn multi_intent_flagged_when_two_intents_exceed_threshold() {
        let json = r#"{
            "patterns": {
                "comparison": {"priority": 1, "description": "", "patterns": [
                    {"regex": "compare\\s+\\w+\\s+and\\s+\\w+\\s+products\\s+today", "confidence": 0.95}
                ]},
                "synthesis": {"priority": 1, "description": "", "patterns": [
                    {"regex": "summarize\\s+everything\\s+we\\s+know\\s+about\\s+this", "confidence": 0.95}
                ]}
            }
        }"#;
        let (_f, lib) = matcher_from_json(json);
        let matcher = PatternMatcher::new(&lib);
        let outcome = matcher.match_query("compare x and y products today, summarize everything we know about this").unwrap();
        assert!(outcome.scoring.multi_intent);
        assert_eq!(outcome.scoring.multi_intent_candidates.len(), 2);
    }

    #[test]
    fn stats_track_hits_and_fallbacks() {
        let json = r#"{
            "patterns": {
                "comparison": {"priority": 1, "description": "", "patterns": [
                    {"regex": "compare\\s+\\w+\\s+and\\s+\\w+", "confidence": 0.95}
                ]}
            }
        }"#;
        let (_f, lib) = matcher_from_json(json);
        let matcher = PatternMatcher::new(&lib);
        let _ = matcher.match_query("compare apple and samsung");
        let _ = matcher.match_query("totally unrelated gibberish");
        let stats = matcher.stats();
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.pattern_hits, 1);
        assert_eq!(stats.llm_fallbacks, 1);
    }

    #[test]
    fn reload_is_reflected_without_reconstructing_matcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern_library.json");
        std::fs::write(&path, r#"{"patterns": {}}"#).unwrap();
        let lib = PatternLibrary::load(&path).unwrap();
        let matcher = PatternMatcher::new(&lib);
        assert!(matcher.match_query("compare apple and samsung").is_none());

        lib.add_patterns(
            "comparison",
            vec![RawPattern {
                regex: "compare\\s+\\w+\\s+and\\s+\\w+".to_string(),
                confidence: 0.95,
                examples: vec![],
                match_count: 0,
                accuracy: None,
                added_date: None,
                source: None,
                description: None,
            }],
        )
        .unwrap();

        let outcome = matcher.match_query("compare apple and samsung").unwrap();
        assert_eq!(outcome.intent, "comparison");
    }
}
