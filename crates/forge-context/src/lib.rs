pub mod builder;
pub mod collaborators;
pub mod sanitize;

pub use builder::{ContextBuilder, ContextRequest};
pub use collaborators::{KnowledgeGraphSource, PatternSource, RagSource};
pub use sanitize::sanitize;
