use thiserror::Error;

/// Errors surfaced by the core pipeline to its callers.
///
/// Validation failures and low-quality results are data, carried on
/// [`crate::generation::GenerationResult`], not exceptions: only
/// conditions that prevent any result from being produced belong here.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No candidate models available for artifact type: {0}")]
    NoModelsAvailable(String),

    #[error("Model call failed: {0}")]
    ModelCallFailed(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs:?}s")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Routing update rejected: {0}")]
    RoutingConflict(String),

    #[error("Invalid custom artifact-type template: {0}")]
    InvalidTemplate(String),

    #[error("Dataset validation failed: {0}")]
    DatasetValidationFailed(String),

    #[error("Training job failed: {0}")]
    TrainingFailed(String),

    #[error("Out of memory during training: {0}")]
    Oom(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
