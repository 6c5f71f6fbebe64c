use async_trait::async_trait;
use forge_core::{ArtifactType, ModelId};

/// Releases a local model's VRAM after a successful generation, unless it is
/// in the configured persistent set.
/// Cloud providers have nothing to unload; callers simply don't register one
/// for them.
#[async_trait]
pub trait ModelUnloader: Send + Sync {
    async fn unload(&self, model_id: &ModelId);
}

/// Best-effort HTML companion renderer for a validated mermaid diagram (spec
/// section 4.5's post-success side effect, section 6's "Rendering"
/// collaborator). A render failure must never fail the generation call.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, artifact_type: &ArtifactType, content: &str) -> Option<String>;
}
