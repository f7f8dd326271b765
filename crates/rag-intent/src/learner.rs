//! Background pattern-learning cycle (`pattern_learner.py`, spec.md
//! §4.8): groups LLM-fallback queries by assigned intent, asks a meta-LLM
//! to propose regex patterns, and auto-approves high-confidence
//! suggestions into the pattern library.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rag_core::{ChatMessage, ChatRequest, LlmGateway};
use serde::{Deserialize, Serialize};

use crate::library::{PatternLibrary, RawPattern};

const MIN_EXAMPLES_PER_GROUP: usize = 3;
const MAX_EXAMPLES_IN_PROMPT: usize = 20;

/// One query that required Tier 2 (LLM) classification, queued for the
/// next learning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuery {
    pub query: String,
    pub llm_intent: String,
    pub llm_confidence: f32,
    pub pattern_intent: Option<String>,
    pub pattern_confidence: Option<f32>,
}

impl PendingQuery {
    #[must_use]
    pub fn mismatch(&self) -> bool {
        self.pattern_intent.as_deref().is_some_and(|p| p != self.llm_intent)
    }
}

#[derive(Debug, Deserialize)]
struct PatternSuggestion {
    regex: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, Deserialize, Default)]
struct DiscoveryResponse {
    #[serde(default)]
    patterns: Vec<PatternSuggestion>,
}

/// Background learner: owns the in-memory queue, the pattern library
/// handle, and the meta-LLM gateway used for pattern discovery.
pub struct PatternLearner {
    library: Arc<PatternLibrary>,
    gateway: Arc<LlmGateway>,
    meta_model: String,
    batch_size: usize,
    auto_approve_threshold: f32,
    learning_enabled: bool,
    queue: Mutex<Vec<PendingQuery>>,
    queue_path: PathBuf,
}

impl PatternLearner {
    #[must_use]
    pub fn new(
        library: Arc<PatternLibrary>,
        gateway: Arc<LlmGateway>,
        meta_model: String,
        queue_path: PathBuf,
        batch_size: usize,
        auto_approve_threshold: f32,
        learning_enabled: bool,
    ) -> Self {
        let queue = load_queue(&queue_path);
        Self {
            library,
            gateway,
            meta_model,
            batch_size,
            auto_approve_threshold,
            learning_enabled,
            queue: Mutex::new(queue),
            queue_path,
        }
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Queue a query for learning. Triggers a learning cycle once the
    /// batch size is reached.
    pub async fn add_to_queue(&self, item: PendingQuery) {
        if !self.learning_enabled {
            return;
        }

        let should_run = {
            let mut queue = self.queue.lock();
            queue.push(item);
            if queue.len() % 5 == 0 {
                let _ = save_queue(&self.queue_path, &queue);
            }
            queue.len() >= self.batch_size
        };

        if should_run {
            self.run_learning_cycle().await;
        }
    }

    /// Analyze the queued batch and discover new patterns. Failures are
    /// swallowed (observability only) — learning never fails a request.
    pub async fn run_learning_cycle(&self) -> usize {
        let batch = {
            let mut queue = self.queue.lock();
            std::mem::take(&mut *queue)
        };
        let _ = save_queue(&self.queue_path, &Vec::new());

        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for item in &batch {
            groups.entry(item.llm_intent.clone()).or_default().push(item.query.clone());
        }

        let mut discovered = 0;
        for (intent, queries) in groups {
            if queries.len() < MIN_EXAMPLES_PER_GROUP {
                continue;
            }
            match self.discover_patterns(&intent, &queries).await {
                Ok(suggestions) => discovered += self.approve_and_add(&intent, suggestions),
                Err(err) => tracing::warn!(intent = %intent, error = %err, "pattern discovery failed"),
            }
        }

        discovered
    }

    async fn discover_patterns(&self, intent: &str, queries: &[String]) -> rag_core::Result<Vec<PatternSuggestion>> {
        let prompt = build_discovery_prompt(intent, queries);
        let response = self
            .gateway
            .chat(ChatRequest {
                model: self.meta_model.clone(),
                messages: vec![ChatMessage { role: "user".to_string(), content: prompt }],
                temperature_milli: 300,
                max_tokens: 1024,
                response_format: Some("json_object".to_string()),
                stream: false,
            })
            .await?;

        let cleaned = strip_code_fence(&response.content);
        let parsed: DiscoveryResponse = serde_json::from_str(&cleaned).unwrap_or_default();
        Ok(parsed.patterns)
    }

    fn approve_and_add(&self, intent: &str, suggestions: Vec<PatternSuggestion>) -> usize {
        let now = Utc::now().to_rfc3339();
        let approved: Vec<RawPattern> = suggestions
            .into_iter()
            .filter_map(|s| {
                if s.confidence >= self.auto_approve_threshold {
                    Some(RawPattern {
                        regex: s.regex,
                        confidence: s.confidence,
                        examples: s.examples,
                        match_count: 0,
                        accuracy: None,
                        added_date: Some(now.clone()),
                        source: Some("auto_learned".to_string()),
                        description: s.description,
                    })
                } else {
                    tracing::warn!(intent, confidence = s.confidence, regex = %s.regex, "pattern below auto-approve threshold, skipped");
                    None
                }
            })
            .collect();

        if approved.is_empty() {
            return 0;
        }

        match self.library.add_patterns(intent, approved) {
            Ok(added) => added,
            Err(err) => {
                tracing::error!(intent, error = %err, "failed to add learned patterns to library");
                0
            }
        }
    }
}

fn build_discovery_prompt(intent: &str, queries: &[String]) -> String {
    let examples: String =
        queries.iter().take(MAX_EXAMPLES_IN_PROMPT).map(|q| format!("- \"{q}\"")).collect::<Vec<_>>().join("\n");

    format!(
        "You are a regex pattern discovery expert. Analyze these queries and suggest regex patterns.\n\n\
         Intent Type: {intent}\n\n\
         Example Queries:\n{examples}\n\n\
         Task:\n\
         1. Identify common linguistic patterns across these queries\n\
         2. Suggest 1-3 regex patterns that would match 70%+ of these examples\n\
         3. Ensure patterns are specific enough (avoid overly broad matches)\n\
         4. Provide a confidence score based on pattern specificity\n\n\
         Output JSON format:\n\
         {{\"patterns\": [{{\"regex\": \"<regex>\", \"confidence\": 0.0, \"examples\": [\"...\"], \"description\": \"...\"}}]}}\n\n\
         Respond with ONLY valid JSON."
    )
}

fn strip_code_fence(content: &str) -> String {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    s.strip_suffix("```").unwrap_or(s).trim().to_string()
}

fn load_queue(path: &PathBuf) -> Vec<PendingQuery> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents.lines().filter(|l| !l.trim().is_empty()).filter_map(|l| serde_json::from_str(l).ok()).collect()
}

fn save_queue(path: &PathBuf, queue: &[PendingQuery]) -> std::io::Result<()> {
    let body =
        queue.iter().map(|q| serde_json::to_string(q).unwrap_or_default()).collect::<Vec<_>>().join("\n");
    std::fs::write(path, body)
}
