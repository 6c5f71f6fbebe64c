use std::collections::HashSet;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Generation-gate and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_validation_threshold")]
    pub validation_threshold: u8,
    #[serde(default = "default_max_retries")]
    pub max_retries_per_model: u32,
    #[serde(default = "default_local_timeout")]
    pub local_call_timeout_s: u64,
    #[serde(default = "default_cloud_timeout")]
    pub cloud_call_timeout_s: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub use_validation: bool,
    #[serde(default = "default_cloud_max_tokens")]
    pub cloud_max_tokens: usize,
    #[serde(default = "default_local_context_window")]
    pub local_context_window: usize,
    /// Model ids kept loaded across calls instead of unloaded post-success.
    #[serde(default)]
    pub persistent_models: HashSet<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            validation_threshold: default_validation_threshold(),
            max_retries_per_model: default_max_retries(),
            local_call_timeout_s: default_local_timeout(),
            cloud_call_timeout_s: default_cloud_timeout(),
            temperature: default_temperature(),
            use_validation: true,
            cloud_max_tokens: default_cloud_max_tokens(),
            local_context_window: default_local_context_window(),
            persistent_models: HashSet::new(),
        }
    }
}

fn default_validation_threshold() -> u8 {
    80
}
fn default_max_retries() -> u32 {
    2
}
fn default_local_timeout() -> u64 {
    60
}
fn default_cloud_timeout() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.2
}
fn default_cloud_max_tokens() -> usize {
    4096
}
fn default_local_context_window() -> usize {
    8192
}

/// Pool admission and training-batch trigger settings for C6/C7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuneConfig {
    #[serde(default = "default_pool_min_score")]
    pub pool_min_score: u8,
    #[serde(default = "default_incremental_batch_threshold")]
    pub incremental_batch_threshold: usize,
    #[serde(default = "default_check_interval")]
    pub check_interval_s: u64,
    #[serde(default)]
    pub hf_training_enabled: bool,
    #[serde(default = "default_lora_rank")]
    pub hf_lora_rank: u32,
    #[serde(default = "default_gradient_accumulation")]
    pub hf_gradient_accumulation: u32,
    /// Graduation bar: real (non-synthetic) examples needed to trust a pool fully.
    #[serde(default = "default_real_graduation_count")]
    pub real_graduation_count: usize,
    #[serde(default = "default_bootstrap_floor")]
    pub bootstrap_floor: usize,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            pool_min_score: default_pool_min_score(),
            incremental_batch_threshold: default_incremental_batch_threshold(),
            check_interval_s: default_check_interval(),
            hf_training_enabled: false,
            hf_lora_rank: default_lora_rank(),
            hf_gradient_accumulation: default_gradient_accumulation(),
            real_graduation_count: default_real_graduation_count(),
            bootstrap_floor: default_bootstrap_floor(),
        }
    }
}

fn default_pool_min_score() -> u8 {
    85
}
fn default_incremental_batch_threshold() -> usize {
    50
}
fn default_check_interval() -> u64 {
    60
}
fn default_lora_rank() -> u32 {
    16
}
fn default_gradient_accumulation() -> u32 {
    8
}
fn default_real_graduation_count() -> usize {
    200
}
fn default_bootstrap_floor() -> usize {
    20
}

/// Character caps enforced by the context builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_meeting_notes_cap")]
    pub max_meeting_notes_chars: usize,
    #[serde(default = "default_rag_cap")]
    pub max_rag_chars: usize,
    #[serde(default = "default_min_assembled")]
    pub min_assembled_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_meeting_notes_chars: default_meeting_notes_cap(),
            max_rag_chars: default_rag_cap(),
            min_assembled_chars: default_min_assembled(),
        }
    }
}

fn default_meeting_notes_cap() -> usize {
    8000
}
fn default_rag_cap() -> usize {
    12000
}
fn default_min_assembled() -> usize {
    100
}

/// API credentials for cloud providers, read once at startup. Never logged,
/// never interpolated into a prompt.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub groq_api_key: Option<SecretString>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderCredentials {
    pub fn has_key(&self, provider: crate::model::Provider) -> bool {
        use crate::model::Provider::*;
        match provider {
            OpenAi => self.openai_api_key.is_some(),
            Anthropic => self.anthropic_api_key.is_some(),
            Gemini => self.gemini_api_key.is_some(),
            Groq => self.groq_api_key.is_some(),
            Ollama | HuggingFace => true,
        }
    }

    fn from_env() -> Self {
        use secrecy::SecretString;
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok().map(SecretString::from),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().map(SecretString::from),
            groq_api_key: std::env::var("GROQ_API_KEY").ok().map(SecretString::from),
        }
    }
}

/// Logging configuration (shared by the server process and the fine-tuning
/// worker process).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Root application configuration. Loaded from `.forge.toml` / environment
/// overrides and shared by every component via [`ConfigManager`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub finetune: FineTuneConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ollama_url: OllamaUrl,
    #[serde(skip)]
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OllamaUrl(pub String);

impl Default for OllamaUrl {
    fn default() -> Self {
        Self("http://localhost:11434".to_string())
    }
}

/// Loads [`AppConfig`] with the precedence: environment variables >
/// `.forge.toml` in the current directory > `~/.forge/config.toml` >
/// built-in defaults.
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn load() -> Result<Self, ConfigError> {
        let (mut config, config_path) = Self::load_config_file()?;
        config.credentials = ProviderCredentials::from_env();
        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;

        info!(
            validation_threshold = config.generation.validation_threshold,
            pool_min_score = config.finetune.pool_min_score,
            "configuration loaded"
        );
        if let Some(path) = &config_path {
            info!(path = %path.display(), "config file");
        }

        Ok(Self { config, config_path })
    }

    fn load_config_file() -> Result<(AppConfig, Option<PathBuf>), ConfigError> {
        let local = Path::new(".forge.toml");
        if local.exists() {
            return Ok((Self::read_toml(local)?, Some(local.to_path_buf())));
        }
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".forge").join("config.toml");
            if user_config.exists() {
                return Ok((Self::read_toml(&user_config)?, Some(user_config)));
            }
        }
        info!("no config file found, using defaults");
        Ok((AppConfig::default(), None))
    }

    fn read_toml(path: &Path) -> Result<AppConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(url) = std::env::var("FORGE_OLLAMA_URL") {
            config.ollama_url = OllamaUrl(url);
        }
        if let Ok(threshold) = std::env::var("FORGE_VALIDATION_THRESHOLD") {
            if let Ok(v) = threshold.parse() {
                config.generation.validation_threshold = v;
            } else {
                warn!(value = %threshold, "ignoring invalid FORGE_VALIDATION_THRESHOLD");
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }
    }

    fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.generation.validation_threshold > 100 {
            return Err(ConfigError::ValidationError(
                "generation.validation_threshold must be <= 100".into(),
            ));
        }
        if config.finetune.pool_min_score > 100 {
            return Err(ConfigError::ValidationError(
                "finetune.pool_min_score must be <= 100".into(),
            ));
        }
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "invalid log level: {other}"
                )))
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = AppConfig::default();
        assert_eq!(config.generation.validation_threshold, 80);
        assert_eq!(config.finetune.pool_min_score, 85);
        assert_eq!(config.finetune.incremental_batch_threshold, 50);
    }

    #[test]
    fn validation_rejects_threshold_above_100() {
        let mut config = AppConfig::default();
        config.generation.validation_threshold = 150;
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[test]
    fn credentials_are_not_debug_printed() {
        let mut creds = ProviderCredentials::default();
        creds.openai_api_key = Some(SecretString::from("sk-super-secret".to_string()));
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("sk-super-secret"));
    }
}
