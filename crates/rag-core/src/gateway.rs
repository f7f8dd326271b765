//! LLM Gateway (C2): a thin, provider-routed chat-completions proxy with
//! response caching, reasoning-tag stripping, and cost/latency observability.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::{PipelineError, Result};
use crate::registry::Registry;

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A chat-completions request, provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Stored as milli-units so the struct can derive `Hash`/`Eq` for the
    /// cache key (floats cannot).
    pub temperature_milli: u32,
    pub max_tokens: u32,
    pub response_format: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    #[must_use]
    pub fn temperature(&self) -> f64 {
        f64::from(self.temperature_milli) / 1000.0
    }

    fn cache_key(&self) -> (String, Vec<ChatMessage>, u32, u32) {
        (
            self.model.clone(),
            self.messages.clone(),
            self.temperature_milli,
            self.max_tokens,
        )
    }
}

/// A chat-completions response, with gateway-added observability fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub estimated_cost_usd: f64,
    pub latency_ms: u64,
    pub cached: bool,
    pub cache_age_seconds: Option<f64>,
}

type CacheKey = (String, Vec<ChatMessage>, u32, u32);

/// Provider-routed chat-completions proxy.
pub struct LlmGateway {
    http: reqwest::Client,
    registry: Arc<Registry>,
    cache: Cache<CacheKey, ChatResponse>,
    provider_api_keys: std::collections::HashMap<String, String>,
}

impl LlmGateway {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        registry: Arc<Registry>,
        provider_api_keys: std::collections::HashMap<String, String>,
        cache_ttl: Duration,
        cache_max_size: usize,
    ) -> Self {
        Self {
            http,
            registry,
            cache: Cache::new(cache_max_size, cache_ttl),
            provider_api_keys,
        }
    }

    /// Issue a chat-completions call, routing to the model's provider.
    /// Streaming requests bypass the cache entirely.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let key = request.cache_key();

        if !request.stream {
            if let Some(mut cached) = self.cache.get(&key) {
                cached.cached = true;
                cached.cache_age_seconds = self.cache.age_seconds(&key);
                return Ok(cached);
            }
        }

        let model_info = self.registry.model_info(&request.model).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("unknown model id: {}", request.model))
        })?;

        let api_key = self
            .provider_api_keys
            .get(&model_info.provider)
            .ok_or_else(|| {
                PipelineError::Internal(format!(
                    "no API key configured for provider {}",
                    model_info.provider
                ))
            })?;

        let start = Instant::now();
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens,
            "stream": request.stream,
        });

        let provider_url = self.registry.service_url("llm_gateway").ok_or_else(|| {
            PipelineError::Internal("llm_gateway service url not configured".to_string())
        })?;

        let resp = self
            .http
            .post(format!("{provider_url}/v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if resp.status().as_u16() == 429 {
            return Err(PipelineError::RateLimited(
                "upstream provider rate limited the request".to_string(),
            ));
        }
        if resp.status().is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::InvalidArgument(text));
        }
        if resp.status().is_server_error() {
            return Err(PipelineError::UpstreamError(format!(
                "provider returned {}",
                resp.status()
            )));
        }

        let parsed: ProviderResponse = resp.json().await.map_err(|e| {
            PipelineError::ParseError(format!("could not parse provider response: {e}"))
        })?;

        let mut content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if model_info.emits_reasoning_tags {
            if let Some(pattern) = &model_info.reasoning_strip_pattern {
                if let Ok(re) = RegexBuilder::new(pattern).case_insensitive(true).dot_matches_new_line(true).build() {
                    content = re.replace_all(&content, "").to_string();
                }
            }
        }

        let prompt_tokens = parsed.usage.as_ref().map_or(0, |u| u.prompt_tokens);
        let completion_tokens = parsed.usage.as_ref().map_or(0, |u| u.completion_tokens);
        let estimated_cost_usd = (f64::from(prompt_tokens) / 1_000_000.0)
            * model_info.price_per_million_input_tokens
            + (f64::from(completion_tokens) / 1_000_000.0) * model_info.price_per_million_output_tokens;

        let response = ChatResponse {
            content,
            provider: model_info.provider.clone(),
            prompt_tokens,
            completion_tokens,
            estimated_cost_usd,
            latency_ms: start.elapsed().as_millis() as u64,
            cached: false,
            cache_age_seconds: None,
        };

        tracing::info!(
            provider = %response.provider,
            model = %request.model,
            latency_ms = response.latency_ms,
            prompt_tokens,
            completion_tokens,
            estimated_cost_usd,
            "llm gateway call"
        );

        if !request.stream {
            self.cache.set(key, response.clone());
        }

        Ok(response)
    }

    /// Issue a streaming chat-completions call, returning content deltas as
    /// they arrive. Always bypasses the cache (spec.md §4.2). Reasoning-tag
    /// stripping is not applied to streamed deltas: the stripped span can
    /// straddle chunk boundaries, so callers that route to a
    /// reasoning-tag-emitting model should not request streaming for it.
    pub async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send>>> {
        let model_info = self.registry.model_info(&request.model).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("unknown model id: {}", request.model))
        })?;

        let api_key = self
            .provider_api_keys
            .get(&model_info.provider)
            .ok_or_else(|| {
                PipelineError::Internal(format!(
                    "no API key configured for provider {}",
                    model_info.provider
                ))
            })?
            .clone();

        let provider_url = self.registry.service_url("llm_gateway").ok_or_else(|| {
            PipelineError::Internal("llm_gateway service url not configured".to_string())
        })?;

        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        let resp = self
            .http
            .post(format!("{provider_url}/v1/chat/completions"))
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await?;

        if resp.status().as_u16() == 429 {
            return Err(PipelineError::RateLimited(
                "upstream provider rate limited the request".to_string(),
            ));
        }
        if resp.status().is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::InvalidArgument(text));
        }
        if resp.status().is_server_error() {
            return Err(PipelineError::UpstreamError(format!(
                "provider returned {}",
                resp.status()
            )));
        }

        let event_stream = resp.bytes_stream().eventsource().filter_map(|event| async move {
            let event = match event {
                Ok(e) => e,
                Err(e) => return Some(Err(PipelineError::Unreachable(format!("SSE parse error: {e}")))),
            };
            if event.data == "[DONE]" {
                return None;
            }
            match serde_json::from_str::<ProviderStreamChunk>(&event.data) {
                Ok(chunk) => chunk
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.clone())
                    .map(Ok),
                Err(e) => Some(Err(PipelineError::ParseError(format!("could not parse stream chunk: {e}")))),
            }
        });

        Ok(Box::pin(event_stream))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderStreamChunk {
    choices: Vec<ProviderStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ProviderStreamChoice {
    delta: ProviderStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    choices: Vec<ProviderChoice>,
    usage: Option<ProviderUsage>,
}

#[derive(Debug, Deserialize)]
struct ProviderChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ProviderUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
