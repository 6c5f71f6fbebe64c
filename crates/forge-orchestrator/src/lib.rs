pub mod collaborators;
pub mod generator;
pub mod options;
pub mod progress;
pub mod prompt;
pub mod sprint;

pub use collaborators::{DiagramRenderer, ModelUnloader};
pub use generator::GenerationOrchestrator;
pub use options::GenerationOptions;
pub use progress::{emit_progress, ProgressCallback, ProgressEvent};
pub use sprint::{
    PackageArtifactResult, PackageEvent, PackageEventCallback, PackageResult, PackageSelection,
    SprintPackageGenerator, SprintPreset,
};
