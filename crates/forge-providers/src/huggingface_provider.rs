use crate::llm_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

/// Local provider for a Hugging Face model served behind a text-generation-
/// inference-compatible `/generate` endpoint, e.g. a fine-tuned LoRA/QLoRA
/// checkpoint produced by the fine-tuning worker and loaded for serving.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub model_id: String,
    pub base_url: String,
    pub context_window: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            model_id: "local-finetune".to_string(),
            base_url: "http://localhost:8080".to_string(),
            context_window: 16_000,
            max_tokens: 2048,
            temperature: 0.2,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    inputs: String,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    temperature: f32,
    max_new_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

pub struct HuggingFaceProvider {
    client: Client,
    config: HuggingFaceConfig,
}

impl HuggingFaceProvider {
    pub fn new(config: HuggingFaceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn prompt_from_messages(&self, messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl LLMProvider for HuggingFaceProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let request = GenerateRequest {
            inputs: self.prompt_from_messages(messages),
            parameters: GenerateParameters {
                temperature: config.temperature,
                max_new_tokens: config.max_tokens.unwrap_or(self.config.max_tokens),
            },
        };

        let response = timeout(
            self.config.timeout,
            self.client
                .post(format!("{}/generate", self.config.base_url))
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| {
            ProviderError::retriable(
                format!(
                    "huggingface request timed out after {:?}",
                    self.config.timeout
                ),
                None,
                None,
            )
        })?
        .map_err(|e| {
            ProviderError::retriable(format!("huggingface request failed: {}", e), None, None)
        })?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::retriable(
                format!("huggingface inference error: {}", error_text),
                None,
                Some(status_code),
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::fatal(format!("failed to parse response: {}", e)))?;

        Ok(LLMResponse {
            content: body.generated_text,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: Some("stop".to_string()),
            model: self.config.model_id.clone(),
        })
    }

    async fn is_available(&self) -> bool {
        let response = timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/health", self.config.base_url))
                .send(),
        )
        .await;
        matches!(response, Ok(Ok(r)) if r.status().is_success())
    }

    fn provider_name(&self) -> &str {
        "huggingface"
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 2500,
            supports_streaming: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_renders_roles() {
        let provider = HuggingFaceProvider::new(HuggingFaceConfig::default());
        let messages = vec![Message {
            role: MessageRole::User,
            content: "hi".to_string(),
        }];
        assert!(provider.prompt_from_messages(&messages).contains("user: hi"));
    }
}
