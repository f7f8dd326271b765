//! Derives answer-generation recommendations from a classified intent
//! (spec.md §4.8): model tier, `max_tokens`, `response_style`, and the
//! composed system prompt.

use rag_core::{PipelineError, Registry, Task};

use crate::types::{Complexity, Intent, ResponseStyle, ResponseStyleOverride};

/// Resolve the registry model id for `intent`'s answer-generation tier.
pub fn model_for_intent(registry: &Registry, intent: Intent) -> rag_core::Result<String> {
    let task = if intent.is_complex() { Task::AnswerGenerationComplex } else { Task::AnswerGenerationSimple };
    registry
        .model_for_task(task)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::Internal(format!("no model configured for task {task:?}")))
}

/// `max_tokens` per spec.md §4.8: 512 for yes/no + simple lookup, 3072 for
/// list enumeration, 2048 for the analytical set, 1024 default.
#[must_use]
pub fn max_tokens_for_intent(intent: Intent) -> u32 {
    match intent {
        Intent::YesNo | Intent::SimpleLookup => 512,
        Intent::ListEnumeration => 3072,
        Intent::Comparison
        | Intent::Aggregation
        | Intent::Temporal
        | Intent::RelationshipMapping
        | Intent::ContextualExplanation
        | Intent::NegativeLogic
        | Intent::CrossReference
        | Intent::Synthesis
        | Intent::ExceptionHandling => 2048,
        Intent::DefinitionExplanation | Intent::FactualRetrieval | Intent::DocumentNavigation => 1024,
    }
}

/// Auto-selected response style before any user override is applied.
#[must_use]
pub fn default_response_style(intent: Intent) -> ResponseStyle {
    match intent {
        Intent::YesNo | Intent::SimpleLookup => ResponseStyle::Concise,
        Intent::ListEnumeration
        | Intent::Comparison
        | Intent::Aggregation
        | Intent::Temporal
        | Intent::RelationshipMapping
        | Intent::ContextualExplanation
        | Intent::NegativeLogic
        | Intent::CrossReference
        | Intent::Synthesis
        | Intent::ExceptionHandling => ResponseStyle::Comprehensive,
        Intent::DefinitionExplanation | Intent::FactualRetrieval | Intent::DocumentNavigation => ResponseStyle::Balanced,
    }
}

fn is_analytical(intent: Intent) -> bool {
    intent.is_complex() || matches!(intent, Intent::ListEnumeration | Intent::Comparison)
}

/// Validate a user-requested `response_style` override. Requesting
/// `concise` for an analytical intent is refused and auto-upgraded to
/// `balanced` with a warning (never a 400, per SPEC_FULL.md §5).
#[must_use]
pub fn validate_response_style(intent: Intent, requested: Option<ResponseStyle>) -> (ResponseStyle, Option<ResponseStyleOverride>) {
    let Some(requested) = requested else {
        return (default_response_style(intent), None);
    };

    if requested == ResponseStyle::Concise && is_analytical(intent) {
        let applied = ResponseStyle::Balanced;
        let warning = format!(
            "response_style 'concise' is not supported for intent '{}'; auto-upgraded to 'balanced'",
            intent.as_str()
        );
        (applied, Some(ResponseStyleOverride { requested, applied, warning }))
    } else {
        (requested, None)
    }
}

/// Compose the system prompt from a template indexed by intent, language,
/// complexity, citation policy, response style, response format, and the
/// output-language set.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn compose_system_prompt(
    intent: Intent,
    language: &str,
    complexity: Complexity,
    enable_citations: bool,
    response_style: ResponseStyle,
    response_format: &str,
    output_languages: &[String],
) -> String {
    let complexity_label = match complexity {
        Complexity::Simple => "simple",
        Complexity::Moderate => "moderate",
        Complexity::Complex => "complex",
    };
    let style_label = match response_style {
        ResponseStyle::Concise => "concise",
        ResponseStyle::Balanced => "balanced",
        ResponseStyle::Comprehensive => "comprehensive",
    };
    let citation_clause = if enable_citations {
        "Cite every factual claim with its source chunk."
    } else {
        "Do not include citations."
    };
    let languages = output_languages.join(", ");

    format!(
        "You are answering a '{intent}' query in {language} with {complexity_label} analytical depth. \
         Respond in a {style_label} style, formatted as {response_format}. {citation_clause} \
         Produce the answer in the following output language(s): {languages}.",
        intent = intent.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tokens_matches_registered_table() {
        assert_eq!(max_tokens_for_intent(Intent::YesNo), 512);
        assert_eq!(max_tokens_for_intent(Intent::SimpleLookup), 512);
        assert_eq!(max_tokens_for_intent(Intent::ListEnumeration), 3072);
        assert_eq!(max_tokens_for_intent(Intent::Synthesis), 2048);
        assert_eq!(max_tokens_for_intent(Intent::FactualRetrieval), 1024);
    }

    #[test]
    fn concise_override_is_auto_upgraded_for_analytical_intent() {
        let (style, warning) = validate_response_style(Intent::Synthesis, Some(ResponseStyle::Concise));
        assert_eq!(style, ResponseStyle::Balanced);
        assert!(warning.is_some());
    }

    #[test]
    fn concise_override_is_accepted_for_simple_intent() {
        let (style, warning) = validate_response_style(Intent::SimpleLookup, Some(ResponseStyle::Concise));
        assert_eq!(style, ResponseStyle::Concise);
        assert!(warning.is_none());
    }

    #[test]
    fn no_override_uses_default_style() {
        let (style, warning) = validate_response_style(Intent::YesNo, None);
        assert_eq!(style, ResponseStyle::Concise);
        assert!(warning.is_none());
    }

    #[test]
    fn composed_prompt_mentions_intent_and_languages() {
        let prompt = compose_system_prompt(
            Intent::Comparison,
            "en",
            Complexity::Moderate,
            true,
            ResponseStyle::Balanced,
            "markdown",
            &["en".to_string(), "fr".to_string()],
        );
        assert!(prompt.contains("comparison"));
        assert!(prompt.contains("en, fr"));
        assert!(prompt.contains("Cite every factual claim"));
    }
}
