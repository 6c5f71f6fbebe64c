pub mod artifact_type;
pub mod config_manager;
pub mod context;
pub mod error;
pub mod generation;
pub mod hashing;
pub mod model;
pub mod validation;

pub use artifact_type::{ArtifactCategory, ArtifactType, ArtifactTypeRegistry, CustomTypeDefinition};
pub use config_manager::{AppConfig, ConfigManager};
pub use context::{Context, ContextSources};
pub use error::{ForgeError, Result};
pub use generation::{Attempt, GenerationErrorKind, GenerationOutcome, GenerationResult};
pub use hashing::content_hash;
pub use model::{ModelId, ModelInfo, ModelRouting, ModelStatus, Provider};
pub use validation::ValidationResult;
