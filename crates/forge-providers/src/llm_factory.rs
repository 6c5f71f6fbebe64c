use crate::anthropic_provider::{AnthropicConfig, AnthropicProvider};
use crate::gemini_provider::{GeminiConfig, GeminiProvider};
use crate::groq_provider::{GroqConfig, GroqProvider};
use crate::huggingface_provider::{HuggingFaceConfig, HuggingFaceProvider};
use crate::llm_provider::{LLMProvider, LLMResult, ProviderError};
use crate::ollama_provider::{OllamaConfig, OllamaProvider};
use forge_core::config_manager::AppConfig;
use forge_core::model::{ModelId, Provider};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// Builds a concrete [`LLMProvider`] for a [`ModelId`], reading credentials
/// and call-tuning knobs from [`AppConfig`].
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    pub fn build(model_id: &ModelId, config: &AppConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        match model_id.provider {
            Provider::Ollama => Ok(Arc::new(OllamaProvider::new(OllamaConfig {
                model_name: model_id.name.clone(),
                base_url: config.ollama_url.0.clone(),
                context_window: config.generation.local_context_window,
                max_tokens: config.generation.cloud_max_tokens,
                temperature: config.generation.temperature,
                timeout: Duration::from_secs(config.generation.local_call_timeout_s),
            }))),
            Provider::HuggingFace => Ok(Arc::new(HuggingFaceProvider::new(HuggingFaceConfig {
                model_id: model_id.name.clone(),
                base_url: "http://localhost:8080".to_string(),
                context_window: config.generation.local_context_window,
                max_tokens: config.generation.cloud_max_tokens,
                temperature: config.generation.temperature,
                timeout: Duration::from_secs(config.generation.local_call_timeout_s),
            }))),
            Provider::Anthropic => {
                let api_key = config
                    .credentials
                    .anthropic_api_key
                    .as_ref()
                    .ok_or_else(|| ProviderError::fatal("no ANTHROPIC_API_KEY configured"))?
                    .expose_secret()
                    .to_string();
                Ok(Arc::new(AnthropicProvider::new(AnthropicConfig {
                    api_key,
                    model: model_id.name.clone(),
                    context_window: 200_000,
                    timeout_secs: config.generation.cloud_call_timeout_s,
                    max_retries: config.generation.max_retries_per_model,
                })?))
            }
            Provider::OpenAi => {
                let api_key = config
                    .credentials
                    .openai_api_key
                    .as_ref()
                    .ok_or_else(|| ProviderError::fatal("no OPENAI_API_KEY configured"))?
                    .expose_secret()
                    .to_string();
                Ok(Arc::new(crate::openai_llm_provider::OpenAIProvider::new(
                    crate::openai_llm_provider::OpenAIConfig {
                        api_key,
                        base_url: "https://api.openai.com/v1".to_string(),
                        model: model_id.name.clone(),
                        context_window: 128_000,
                        timeout_secs: config.generation.cloud_call_timeout_s,
                        max_retries: config.generation.max_retries_per_model,
                        organization: std::env::var("OPENAI_ORG_ID").ok(),
                    },
                )?))
            }
            Provider::Gemini => {
                let api_key = config
                    .credentials
                    .gemini_api_key
                    .as_ref()
                    .ok_or_else(|| ProviderError::fatal("no GEMINI_API_KEY configured"))?
                    .expose_secret()
                    .to_string();
                Ok(Arc::new(GeminiProvider::new(GeminiConfig {
                    api_key,
                    base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                    model: model_id.name.clone(),
                    context_window: 1_000_000,
                    timeout_secs: config.generation.cloud_call_timeout_s,
                    max_retries: config.generation.max_retries_per_model,
                })?))
            }
            Provider::Groq => {
                let api_key = config
                    .credentials
                    .groq_api_key
                    .as_ref()
                    .ok_or_else(|| ProviderError::fatal("no GROQ_API_KEY configured"))?
                    .expose_secret()
                    .to_string();
                Ok(Arc::new(GroqProvider::new(GroqConfig {
                    api_key,
                    base_url: "https://api.groq.com/openai/v1".to_string(),
                    model: model_id.name.clone(),
                    context_window: 128_000,
                    timeout_secs: config.generation.cloud_call_timeout_s,
                    max_retries: config.generation.max_retries_per_model,
                })?))
            }
        }
    }

    pub async fn check_availability(provider: &Arc<dyn LLMProvider>) -> bool {
        provider.is_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cloud_key_is_fatal_not_retriable() {
        let config = AppConfig::default();
        let model_id = ModelId::new(Provider::Anthropic, "claude-3-5-sonnet-20241022");
        let result = LLMProviderFactory::build(&model_id, &config);
        assert!(result.is_err());
        assert!(!result.err().unwrap().retriable);
    }

    #[test]
    fn local_providers_never_require_a_key() {
        let config = AppConfig::default();
        let model_id = ModelId::new(Provider::Ollama, "llama3");
        assert!(LLMProviderFactory::build(&model_id, &config).is_ok());
    }
}
