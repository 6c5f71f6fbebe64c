use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single turn in a chat-style prompt sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Per-call generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: Some(4096),
            top_p: None,
            stop: None,
        }
    }
}

/// Response from a provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub total_tokens: Option<usize>,
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
    pub finish_reason: Option<String>,
    pub model: String,
}

/// A failed provider call, annotated with enough information for the caller
/// to decide whether to retry the same model or fall back to the next
/// candidate.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub message: String,
    pub retriable: bool,
    pub retry_after: Option<Duration>,
    pub status_code: Option<u16>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retriable: false,
            retry_after: None,
            status_code: None,
        }
    }

    pub fn retriable(
        message: impl Into<String>,
        retry_after: Option<Duration>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            message: message.into(),
            retriable: true,
            retry_after,
            status_code,
        }
    }
}

pub type LLMResult<T> = std::result::Result<T, ProviderError>;

/// Static capabilities of a provider/model pair, used by the router to pick
/// sane defaults (timeouts, context truncation) without a network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCharacteristics {
    pub max_tokens: usize,
    pub avg_latency_ms: u64,
    pub supports_streaming: bool,
}

/// Uniform interface implemented by every model backend (local or cloud).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a single prompt, using default parameters.
    async fn generate(&self, prompt: &str) -> LLMResult<LLMResponse> {
        let messages = vec![Message {
            role: MessageRole::User,
            content: prompt.to_string(),
        }];
        self.generate_chat(&messages, &GenerationConfig::default())
            .await
    }

    /// Generate a chat completion with message history.
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    /// Cheap reachability/availability probe.
    async fn is_available(&self) -> bool;

    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
    fn characteristics(&self) -> ProviderCharacteristics;

    fn context_window(&self) -> usize {
        self.characteristics().max_tokens
    }
}

/// Sleep out a `Retry-After`-aware exponential backoff before attempt `n`
/// (0-indexed). Shared by every cloud provider's retry loop.
pub async fn backoff_delay(attempt: u32, retry_after: Option<Duration>) {
    if let Some(delay) = retry_after {
        tokio::time::sleep(delay).await;
        return;
    }
    if attempt == 0 {
        return;
    }
    let base_ms = 500u64.saturating_mul(1u64 << attempt.min(6));
    let jitter_ms = fastrand::u64(0..=base_ms / 4);
    tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
}
