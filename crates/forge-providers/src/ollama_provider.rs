use crate::llm_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Local Ollama HTTP client (`/api/generate`), used as the primary tier for
/// most artifact types before falling back to cloud providers.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model_name: String,
    pub base_url: String,
    pub context_window: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model_name: "llama3".to_string(),
            base_url: "http://localhost:11434".to_string(),
            context_window: 32_000,
            max_tokens: 4096,
            temperature: 0.2,
            timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
    num_ctx: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<usize>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
}

pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn prompt_from_messages(&self, messages: &[Message]) -> String {
        let body = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("{}\n\nassistant:", body)
    }

    async fn generate_raw(
        &self,
        prompt: String,
        config: &GenerationConfig,
    ) -> LLMResult<GenerateResponse> {
        let request = GenerateRequest {
            model: self.config.model_name.clone(),
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens.unwrap_or(self.config.max_tokens),
                num_ctx: self.config.context_window,
            },
        };

        debug!(model = %self.config.model_name, "sending request to ollama");

        let response = timeout(
            self.config.timeout,
            self.client
                .post(format!("{}/api/generate", self.config.base_url))
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| {
            ProviderError::retriable(
                format!("ollama request timed out after {:?}", self.config.timeout),
                None,
                None,
            )
        })?
        .map_err(|e| ProviderError::retriable(format!("ollama request failed: {}", e), None, None))?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::retriable(
                format!("ollama API error: {}", error_text),
                None,
                Some(status_code),
            ));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ProviderError::fatal(format!("failed to parse ollama response: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let prompt = self.prompt_from_messages(messages);
        let response = self.generate_raw(prompt, config).await?;

        Ok(LLMResponse {
            content: response.response,
            total_tokens: Some(
                response.prompt_eval_count.unwrap_or(0) + response.eval_count.unwrap_or(0),
            ),
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
            finish_reason: Some("stop".to_string()),
            model: self.config.model_name.clone(),
        })
    }

    async fn is_available(&self) -> bool {
        let response = timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/api/tags", self.config.base_url))
                .send(),
        )
        .await;

        let Ok(Ok(response)) = response else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }

        let Ok(body) = response.json::<serde_json::Value>().await else {
            return false;
        };

        body["models"]
            .as_array()
            .map(|models| {
                models.iter().any(|m| {
                    m["name"]
                        .as_str()
                        .is_some_and(|n| n.contains(&self.config.model_name))
                })
            })
            .unwrap_or(false)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 2000,
            supports_streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_renders_roles() {
        let provider = OllamaProvider::new(OllamaConfig::default());
        let messages = vec![Message {
            role: MessageRole::User,
            content: "hi".to_string(),
        }];
        let prompt = provider.prompt_from_messages(&messages);
        assert!(prompt.contains("user: hi"));
        assert!(prompt.ends_with("assistant:"));
    }
}
