//! Closed-set intent, complexity, and response-style vocabulary, plus the
//! classification result envelope returned to `/v1/analyze` and consumed by
//! the retrieval orchestrator (C9).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The 15 allowed intents (spec.md §4.8). Closed set — never extended at
/// runtime; new categories require a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SimpleLookup,
    ListEnumeration,
    YesNo,
    DefinitionExplanation,
    FactualRetrieval,
    Comparison,
    Aggregation,
    Temporal,
    RelationshipMapping,
    ContextualExplanation,
    NegativeLogic,
    CrossReference,
    Synthesis,
    DocumentNavigation,
    ExceptionHandling,
}

impl Intent {
    pub const ALL: [Intent; 15] = [
        Intent::SimpleLookup,
        Intent::ListEnumeration,
        Intent::YesNo,
        Intent::DefinitionExplanation,
        Intent::FactualRetrieval,
        Intent::Comparison,
        Intent::Aggregation,
        Intent::Temporal,
        Intent::RelationshipMapping,
        Intent::ContextualExplanation,
        Intent::NegativeLogic,
        Intent::CrossReference,
        Intent::Synthesis,
        Intent::DocumentNavigation,
        Intent::ExceptionHandling,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::SimpleLookup => "simple_lookup",
            Intent::ListEnumeration => "list_enumeration",
            Intent::YesNo => "yes_no",
            Intent::DefinitionExplanation => "definition_explanation",
            Intent::FactualRetrieval => "factual_retrieval",
            Intent::Comparison => "comparison",
            Intent::Aggregation => "aggregation",
            Intent::Temporal => "temporal",
            Intent::RelationshipMapping => "relationship_mapping",
            Intent::ContextualExplanation => "contextual_explanation",
            Intent::NegativeLogic => "negative_logic",
            Intent::CrossReference => "cross_reference",
            Intent::Synthesis => "synthesis",
            Intent::DocumentNavigation => "document_navigation",
            Intent::ExceptionHandling => "exception_handling",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Intent> {
        Intent::ALL.into_iter().find(|i| i.as_str() == name)
    }

    /// Complex-answer intents route to the registry's complex model;
    /// everything else uses the simple model (spec.md §4.8).
    #[must_use]
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            Intent::CrossReference
                | Intent::Synthesis
                | Intent::NegativeLogic
                | Intent::RelationshipMapping
                | Intent::Aggregation
                | Intent::Temporal
                | Intent::ContextualExplanation
                | Intent::ExceptionHandling
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Concise,
    Balanced,
    Comprehensive,
}

/// Per-intent score, mirroring the source's `IntentScore` dataclass for the
/// `/v1/analyze` observability surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentScoreSummary {
    pub final_score: f32,
    pub base_score: f32,
    pub patterns_matched: usize,
    pub penalties: Vec<(String, f32)>,
    pub boosts: Vec<(String, f32)>,
}

/// Pattern-matcher metadata attached to a classification, preserved on the
/// response envelope per SPEC_FULL.md §4's "multi-intent" carry-forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternScoring {
    pub all_scores: BTreeMap<String, IntentScoreSummary>,
    pub runner_up: Option<String>,
    pub runner_up_score: f32,
    pub confidence_gap: f32,
    pub multi_intent: bool,
    pub multi_intent_candidates: Vec<String>,
}

/// A warning describing an auto-upgraded `response_style` (spec.md §5 open
/// question: 200-with-warning, never 400, for style-override mismatches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseStyleOverride {
    pub requested: ResponseStyle,
    pub applied: ResponseStyle,
    pub warning: String,
}

/// Full result of classifying one query, matching `/v1/analyze`'s response
/// body (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub language: String,
    pub complexity: Complexity,
    pub requires_math: bool,
    pub confidence: f32,
    pub recommended_model: String,
    pub recommended_max_tokens: u32,
    pub system_prompt: String,
    pub used_pattern: bool,
    pub pattern_scoring: Option<PatternScoring>,
    pub response_style: ResponseStyle,
    pub response_style_override: Option<ResponseStyleOverride>,
    pub output_languages: Vec<String>,
}
