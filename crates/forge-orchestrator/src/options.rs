use forge_core::config_manager::AppConfig;

/// Per-call generation knobs. Defaults mirror
/// [`forge_core::config_manager::GenerationConfig`] so a caller that passes
/// `GenerationOptions::default()` gets the configured behavior rather than
/// hardcoded constants.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_retries_per_model: u32,
    pub validation_threshold: u8,
    pub use_validation: bool,
    pub cloud_max_tokens: usize,
    pub local_context_window: usize,
    /// When set for `ArtifactType::CodePrototype`, the prompt asks for an
    /// `=== IMPLEMENTATION ===` / `=== TESTS ===` separator and the code
    /// validator requires it to be present.
    pub include_tests: bool,
}

impl GenerationOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.generation.temperature,
            max_retries_per_model: config.generation.max_retries_per_model,
            validation_threshold: config.generation.validation_threshold,
            use_validation: config.generation.use_validation,
            cloud_max_tokens: config.generation.cloud_max_tokens,
            local_context_window: config.generation.local_context_window,
            include_tests: false,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
