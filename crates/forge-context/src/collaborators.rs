use async_trait::async_trait;
use forge_core::ArtifactType;

/// Retrieval-augmented-generation source. Implementations back onto whatever
/// vector store or codebase index is available; a query failure is reported
/// as `None` rather than an error, since context assembly must degrade
/// gracefully rather than fail the whole generation call.
#[async_trait]
pub trait RagSource: Send + Sync {
    async fn query(&self, artifact_type: &ArtifactType, notes: &str) -> Option<serde_json::Value>;
}

/// Knowledge-graph collaborator (entities/relations relevant to `notes`).
#[async_trait]
pub trait KnowledgeGraphSource: Send + Sync {
    async fn query(&self, artifact_type: &ArtifactType, notes: &str) -> Option<serde_json::Value>;
}

/// Pattern-library collaborator (prior accepted artifacts of this type).
#[async_trait]
pub trait PatternSource: Send + Sync {
    async fn query(&self, artifact_type: &ArtifactType, notes: &str) -> Option<serde_json::Value>;
}
