//! Intent Classifier (C8): the hardest subsystem. Two-tier query
//! classification (pattern match, then LLM fallback/verification),
//! recommendation derivation, background pattern learning, and query
//! logging.

pub mod error;
pub mod language;
pub mod learner;
pub mod library;
pub mod logging;
pub mod matcher;
pub mod recommend;
pub mod types;

pub use error::{Error, Result};
pub use learner::{PatternLearner, PendingQuery};
pub use library::{PatternLibrary, RawPattern};
pub use logging::{QueryLogEntry, QueryLogger};
pub use matcher::{MatcherStatsView, PatternMatcher};
pub use types::{ClassificationResult, Complexity, Intent, PatternScoring, ResponseStyle, ResponseStyleOverride};

use std::sync::Arc;

use chrono::Utc;
use rag_core::{ChatMessage, ChatRequest, LlmGateway, Registry, Task};

/// Below this confidence, the request is rejected outright (spec.md §4.8).
pub const THRESHOLD_REJECT: f32 = 0.40;
/// Below this confidence (but at/above [`THRESHOLD_REJECT`]), intent is
/// coerced to `factual_retrieval` and logged.
pub const THRESHOLD_FALLBACK: f32 = 0.60;

/// Request body for `/v1/analyze` (spec.md §6).
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub query: String,
    pub enable_citations: bool,
    pub response_style: Option<ResponseStyle>,
    pub response_format: String,
}

struct Tier2Outcome {
    intent: Intent,
    confidence: f32,
    language: String,
    complexity: Complexity,
    requires_math: bool,
}

#[derive(serde::Deserialize, Default)]
struct Tier2Response {
    intent: Option<String>,
    language: Option<String>,
    complexity: Option<String>,
    requires_math: Option<bool>,
    #[serde(default)]
    confidence: f32,
}

/// Owns every piece of classifier state: the compiled pattern matcher, the
/// library handle (for reload/learning), the LLM gateway, and the query
/// logger.
pub struct IntentClassifier {
    matcher: PatternMatcher,
    gateway: Arc<LlmGateway>,
    registry: Arc<Registry>,
    learner: Arc<PatternLearner>,
    logger: QueryLogger,
}

impl IntentClassifier {
    #[must_use]
    pub fn new(
        library: &PatternLibrary,
        gateway: Arc<LlmGateway>,
        registry: Arc<Registry>,
        learner: Arc<PatternLearner>,
        logger: QueryLogger,
    ) -> Self {
        Self { matcher: PatternMatcher::new(library), gateway, registry, learner, logger }
    }

    #[must_use]
    pub fn stats(&self) -> MatcherStatsView {
        self.matcher.stats()
    }

    /// Classify `request.query`, applying the full two-tier algorithm,
    /// rejection/coercion thresholds, recommendation derivation, and
    /// system-prompt composition.
    pub async fn classify(&self, request: &AnalyzeRequest) -> Result<ClassificationResult> {
        let tier1 = self.matcher.match_query(&request.query);

        let (intent, confidence, used_pattern, scoring, tier2) = match &tier1 {
            None => {
                let tier2 = self.classify_tier2(&request.query).await;
                self.learner
                    .add_to_queue(PendingQuery {
                        query: request.query.clone(),
                        llm_intent: tier2.intent.as_str().to_string(),
                        llm_confidence: tier2.confidence,
                        pattern_intent: None,
                        pattern_confidence: None,
                    })
                    .await;
                let intent = tier2.intent;
                let confidence = tier2.confidence;
                (intent, confidence, false, None, Some(tier2))
            }
            Some(outcome) if outcome.confidence < matcher::CONFIDENCE_MEDIUM => {
                // Medium confidence: verify Tier 1's pick against Tier 2.
                let tier2 = self.classify_tier2(&request.query).await;
                self.learner
                    .add_to_queue(PendingQuery {
                        query: request.query.clone(),
                        llm_intent: tier2.intent.as_str().to_string(),
                        llm_confidence: tier2.confidence,
                        pattern_intent: Some(outcome.intent.clone()),
                        pattern_confidence: Some(outcome.confidence),
                    })
                    .await;

                if tier2.intent.as_str() == outcome.intent.as_str() {
                    let confidence = outcome.confidence.max(tier2.confidence);
                    (tier2.intent, confidence, true, Some(outcome.scoring.clone()), Some(tier2))
                } else {
                    let intent = tier2.intent;
                    let confidence = tier2.confidence;
                    (intent, confidence, false, Some(outcome.scoring.clone()), Some(tier2))
                }
            }
            Some(outcome) => {
                let intent = Intent::parse(&outcome.intent).unwrap_or(Intent::FactualRetrieval);
                (intent, outcome.confidence, true, Some(outcome.scoring.clone()), None)
            }
        };

        let result = self.apply_threshold_policy(
            &request.query,
            intent,
            confidence,
            used_pattern,
            scoring,
            tier2,
            &request.response_format,
        )?;
        Ok(Self::apply_response_style_override(result, request.response_style))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_threshold_policy(
        &self,
        query: &str,
        intent: Intent,
        confidence: f32,
        used_pattern: bool,
        scoring: Option<PatternScoring>,
        tier2: Option<Tier2Outcome>,
        response_format: &str,
    ) -> Result<ClassificationResult> {
        if confidence < THRESHOLD_REJECT {
            let _ = self.logger.log_rejected(&logging::QueryLogEntry {
                timestamp: Utc::now(),
                query: query.to_string(),
                intent: Some(intent.as_str().to_string()),
                confidence,
                language: None,
                complexity: None,
                event_type: "rejected".to_string(),
                reasoning: None,
                error_message: Some("confidence below rejection threshold".to_string()),
            });
            return Err(Error::Rejected(confidence));
        }

        let resolved_intent = if confidence < THRESHOLD_FALLBACK {
            let _ = self.logger.log_low_confidence(&logging::QueryLogEntry {
                timestamp: Utc::now(),
                query: query.to_string(),
                intent: Some(intent.as_str().to_string()),
                confidence,
                language: None,
                complexity: None,
                event_type: "low_confidence".to_string(),
                reasoning: None,
                error_message: None,
            });
            Intent::FactualRetrieval
        } else {
            intent
        };

        Ok(self.build_result(query, resolved_intent, confidence, used_pattern, scoring, tier2, response_format))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_result(
        &self,
        query: &str,
        intent: Intent,
        confidence: f32,
        used_pattern: bool,
        scoring: Option<PatternScoring>,
        tier2: Option<Tier2Outcome>,
        response_format: &str,
    ) -> ClassificationResult {
        let complexity = tier2.as_ref().map(|t| t.complexity).unwrap_or_else(|| {
            if intent.is_complex() {
                Complexity::Complex
            } else if matches!(intent, Intent::SimpleLookup | Intent::YesNo) {
                Complexity::Simple
            } else {
                Complexity::Moderate
            }
        });
        let requires_math = tier2
            .as_ref()
            .map(|t| t.requires_math)
            .unwrap_or_else(|| matches!(intent, Intent::Aggregation | Intent::Temporal));

        let output_languages = language::detect_output_languages(query);
        let primary_language = tier2
            .as_ref()
            .map(|t| t.language.clone())
            .unwrap_or_else(|| output_languages.first().cloned().unwrap_or_else(|| "en".to_string()));

        let recommended_model =
            recommend::model_for_intent(&self.registry, intent).unwrap_or_else(|_| "unknown-model".to_string());
        let recommended_max_tokens = recommend::max_tokens_for_intent(intent);
        let response_style = recommend::default_response_style(intent);

        let system_prompt = recommend::compose_system_prompt(
            intent,
            &primary_language,
            complexity,
            true,
            response_style,
            response_format,
            &output_languages,
        );

        ClassificationResult {
            intent,
            language: primary_language,
            complexity,
            requires_math,
            confidence,
            recommended_model,
            recommended_max_tokens,
            system_prompt,
            used_pattern,
            pattern_scoring: scoring,
            response_style,
            response_style_override: None,
            output_languages,
        }
    }

    /// Apply and validate a caller-requested `response_style`, returning
    /// the (possibly auto-upgraded) result merged into `result`.
    #[must_use]
    pub fn apply_response_style_override(
        mut result: ClassificationResult,
        requested: Option<ResponseStyle>,
    ) -> ClassificationResult {
        let (style, override_) = recommend::validate_response_style(result.intent, requested);
        result.response_style = style;
        result.response_style_override = override_;
        result
    }

    async fn classify_tier2(&self, query: &str) -> Tier2Outcome {
        let model = self.registry.model_for_task(Task::IntentDetection).unwrap_or("").to_string();
        let prompt = build_tier2_prompt(query);

        let chat_result = self
            .gateway
            .chat(ChatRequest {
                model,
                messages: vec![ChatMessage { role: "user".to_string(), content: prompt }],
                temperature_milli: 100,
                max_tokens: 512,
                response_format: Some("json_object".to_string()),
                stream: false,
            })
            .await;

        let parsed = match chat_result {
            Ok(response) => serde_json::from_str::<Tier2Response>(&response.content).unwrap_or_default(),
            Err(_) => Tier2Response::default(),
        };

        let intent = parsed.intent.as_deref().and_then(Intent::parse).unwrap_or(Intent::FactualRetrieval);
        let confidence = if parsed.intent.is_some() { parsed.confidence } else { 0.5 };
        let language = parsed.language.unwrap_or_else(|| "en".to_string());
        let complexity = match parsed.complexity.as_deref() {
            Some("complex") => Complexity::Complex,
            Some("simple") => Complexity::Simple,
            _ => Complexity::Moderate,
        };

        Tier2Outcome { intent, confidence, language, complexity, requires_math: parsed.requires_math.unwrap_or(false) }
    }
}

fn build_tier2_prompt(query: &str) -> String {
    let intents = Intent::ALL.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ");
    format!(
        "Classify the analytical intent of this query. Choose exactly one intent from: {intents}.\n\n\
         Query: \"{query}\"\n\n\
         Respond with ONLY a JSON object: \
         {{\"intent\": \"<one of the intents above>\", \"language\": \"<ISO-639-1 code>\", \
         \"complexity\": \"simple|moderate|complex\", \"requires_math\": true|false, \"confidence\": 0.0}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::{Environment, ModelInfo, RegistryConfig, ServiceEndpoint};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry_for(base_url: &str) -> Arc<Registry> {
        let mut task_models = HashMap::new();
        for task in [
            Task::IntentDetection,
            Task::AnswerGenerationSimple,
            Task::AnswerGenerationComplex,
            Task::MetadataExtraction,
            Task::Compression,
        ] {
            task_models.insert(task, "fast-model".to_string());
        }

        let config = RegistryConfig {
            task_models,
            models: vec![ModelInfo {
                model_id: "fast-model".to_string(),
                provider: "test-provider".to_string(),
                embedding_dimension: None,
                price_per_million_input_tokens: 0.0,
                price_per_million_output_tokens: 0.0,
                emits_reasoning_tags: false,
                reasoning_strip_pattern: None,
            }],
            services: vec![
                ServiceEndpoint { name: "llm_gateway".to_string(), base_url: base_url.to_string() },
                ServiceEndpoint { name: "vector_store".to_string(), base_url: base_url.to_string() },
                ServiceEndpoint { name: "embedder".to_string(), base_url: base_url.to_string() },
            ],
        };
        Arc::new(Registry::build(Environment::Dev, config).unwrap())
    }

    async fn build_classifier(server: &MockServer, library_json: &str) -> (IntentClassifier, tempfile::TempDir) {
        let registry = registry_for(&server.uri());
        let gateway = Arc::new(LlmGateway::new(
            reqwest::Client::new(),
            registry.clone(),
            HashMap::from([("test-provider".to_string(), "key".to_string())]),
            std::time::Duration::from_secs(60),
            100,
        ));

        let dir = tempfile::tempdir().unwrap();
        let lib_path = dir.path().join("pattern_library.json");
        std::fs::write(&lib_path, library_json).unwrap();
        let library = PatternLibrary::load(&lib_path).unwrap();
        let logger = QueryLogger::new(dir.path(), 7);
        let learner = Arc::new(PatternLearner::new(
            Arc::new(PatternLibrary::load(&lib_path).unwrap()),
            gateway.clone(),
            "fast-model".to_string(),
            dir.path().join("learning_queue.jsonl"),
            100,
            0.95,
            false,
        ));

        (IntentClassifier::new(&library, gateway, registry, learner, logger), dir)
    }

    #[tokio::test]
    async fn high_confidence_pattern_match_used_directly() {
        let server = MockServer::start().await;
        let library_json = r#"{
            "patterns": {
                "comparison": {"priority": 1, "description": "", "patterns": [
                    {"regex": "compare\\s+\\w+\\s+and\\s+\\w+", "confidence": 0.95}
                ]}
            }
        }"#;
        let (classifier, _dir) = build_classifier(&server, library_json).await;

        let result = classifier
            .classify(&AnalyzeRequest {
                query: "Compare iPhone and Samsung".to_string(),
                enable_citations: true,
                response_style: None,
                response_format: "markdown".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::Comparison);
        assert!(result.used_pattern);
        assert!(result.confidence >= 0.85);
    }

    #[tokio::test]
    async fn no_pattern_match_falls_back_to_llm() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"intent\": \"factual_retrieval\", \"language\": \"en\", \"complexity\": \"simple\", \"requires_math\": false, \"confidence\": 0.72}"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 5}
            })))
            .mount(&server)
            .await;

        let (classifier, _dir) = build_classifier(&server, r#"{"patterns": {}}"#).await;

        let result = classifier
            .classify(&AnalyzeRequest {
                query: "What's the warranty period for this product".to_string(),
                enable_citations: true,
                response_style: None,
                response_format: "markdown".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::FactualRetrieval);
        assert!(!result.used_pattern);
    }

    #[tokio::test]
    async fn llm_json_parse_failure_falls_back_to_safe_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "not json at all"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 5}
            })))
            .mount(&server)
            .await;

        let (classifier, _dir) = build_classifier(&server, r#"{"patterns": {}}"#).await;

        let result = classifier
            .classify(&AnalyzeRequest {
                query: "asdf zxcv qwer".to_string(),
                enable_citations: true,
                response_style: None,
                response_format: "markdown".to_string(),
            })
            .await;

        // confidence 0.5 is within [REJECT, FALLBACK), so it's coerced, not rejected.
        let result = result.unwrap();
        assert_eq!(result.intent, Intent::FactualRetrieval);
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn very_low_confidence_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"intent\": \"factual_retrieval\", \"confidence\": 0.1}"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 5}
            })))
            .mount(&server)
            .await;

        let (classifier, _dir) = build_classifier(&server, r#"{"patterns": {}}"#).await;

        let result = classifier
            .classify(&AnalyzeRequest {
                query: "zzz".to_string(),
                enable_citations: true,
                response_style: None,
                response_format: "markdown".to_string(),
            })
            .await;

        assert!(matches!(result, Err(Error::Rejected(_))));
    }

    #[tokio::test]
    async fn conflict_resolution_end_to_end() {
        let server = MockServer::start().await;
        let library_json = r#"{
            "patterns": {
                "list_enumeration": {"priority": 1, "description": "", "patterns": [
                    {"regex": "list\\s+\\w+", "confidence": 0.90}
                ]},
                "relationship_mapping": {"priority": 1, "description": "", "patterns": [
                    {"regex": "differs\\s+from", "confidence": 0.90}
                ]}
            }
        }"#;
        let (classifier, _dir) = build_classifier(&server, library_json).await;

        let result = classifier
            .classify(&AnalyzeRequest {
                query: "List products whose manufacturer differs from the vendor".to_string(),
                enable_citations: true,
                response_style: None,
                response_format: "markdown".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::RelationshipMapping);
    }
}
