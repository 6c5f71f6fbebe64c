use std::collections::HashMap;
use std::sync::Arc;

use forge_core::config_manager::ContextConfig;
use forge_core::{content_hash, ArtifactType, Context, ContextSources};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::collaborators::{KnowledgeGraphSource, PatternSource, RagSource};
use crate::sanitize::sanitize;

/// Which optional collaborators to consult for one `build_context` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRequest {
    pub include_rag: bool,
    pub include_kg: bool,
    pub include_patterns: bool,
    pub force_refresh: bool,
}

/// Assembles sanitized, size-capped prompt context from up to three
/// best-effort collaborators. Every collaborator is optional and its
/// failure degrades the context rather than failing the call — see
/// [`Context::is_degraded`].
pub struct ContextBuilder {
    config: ContextConfig,
    rag: Option<Arc<dyn RagSource>>,
    kg: Option<Arc<dyn KnowledgeGraphSource>>,
    patterns: Option<Arc<dyn PatternSource>>,
    cache: RwLock<HashMap<String, Context>>,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            rag: None,
            kg: None,
            patterns: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_rag(mut self, source: Arc<dyn RagSource>) -> Self {
        self.rag = Some(source);
        self
    }

    pub fn with_knowledge_graph(mut self, source: Arc<dyn KnowledgeGraphSource>) -> Self {
        self.kg = Some(source);
        self
    }

    pub fn with_patterns(mut self, source: Arc<dyn PatternSource>) -> Self {
        self.patterns = Some(source);
        self
    }

    fn cache_key(artifact_type: &ArtifactType, meeting_notes: &str, request: ContextRequest) -> String {
        content_hash(&format!(
            "{}|{}|{}|{}|{}",
            artifact_type.value(),
            meeting_notes,
            request.include_rag,
            request.include_kg,
            request.include_patterns
        ))
    }

    pub async fn build_context(
        &self,
        meeting_notes: &str,
        artifact_type: &ArtifactType,
        request: ContextRequest,
    ) -> Context {
        let key = Self::cache_key(artifact_type, meeting_notes, request);
        if !request.force_refresh {
            if let Some(cached) = self.cache.read().get(&key).cloned() {
                return cached;
            }
        }

        let sanitized_notes = sanitize(meeting_notes, self.config.max_meeting_notes_chars);

        let rag = if request.include_rag {
            match &self.rag {
                Some(source) => source.query(artifact_type, meeting_notes).await,
                None => None,
            }
        } else {
            None
        };
        let kg = if request.include_kg {
            match &self.kg {
                Some(source) => source.query(artifact_type, meeting_notes).await,
                None => None,
            }
        } else {
            None
        };
        let patterns = if request.include_patterns {
            match &self.patterns {
                Some(source) => source.query(artifact_type, meeting_notes).await,
                None => None,
            }
        } else {
            None
        };

        let mut assembled = format!(
            "## Requirements\n{}\n\n## Project Context (from codebase)\n{}",
            sanitized_notes,
            rag.as_ref()
                .map(|v| sanitize(&v.to_string(), self.config.max_rag_chars))
                .unwrap_or_default(),
        );
        if let Some(kg) = &kg {
            assembled.push_str(&format!(
                "\n\n## Knowledge Graph Context\n{}",
                sanitize(&kg.to_string(), self.config.max_rag_chars)
            ));
        }
        if let Some(patterns) = &patterns {
            assembled.push_str(&format!(
                "\n\n## Prior Pattern Context\n{}",
                sanitize(&patterns.to_string(), self.config.max_rag_chars)
            ));
        }

        if assembled.chars().count() < self.config.min_assembled_chars && !meeting_notes.trim().is_empty() {
            assembled = format!("## Requirements\n{}", sanitized_notes);
        }

        let context = Context {
            context_id: Uuid::new_v4(),
            meeting_notes: meeting_notes.to_string(),
            assembled,
            sources: ContextSources { rag, kg, patterns },
            created_at: chrono::Utc::now(),
        };

        self.cache.write().insert(key, context.clone());
        context
    }

    /// Returns the cached context for `(meeting_notes, artifact_type,
    /// request)` if present; on a cache miss, rebuilds with
    /// `force_refresh=true` regardless of what `request.force_refresh` says.
    pub async fn get_context_by_id(
        &self,
        meeting_notes: &str,
        artifact_type: &ArtifactType,
        mut request: ContextRequest,
    ) -> Context {
        let key = Self::cache_key(artifact_type, meeting_notes, request);
        if let Some(cached) = self.cache.read().get(&key).cloned() {
            return cached;
        }
        request.force_refresh = true;
        self.build_context(meeting_notes, artifact_type, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubRag(&'static str);

    #[async_trait]
    impl RagSource for StubRag {
        async fn query(&self, _artifact_type: &ArtifactType, _notes: &str) -> Option<serde_json::Value> {
            Some(serde_json::json!(self.0))
        }
    }

    struct FailingRag;

    #[async_trait]
    impl RagSource for FailingRag {
        async fn query(&self, _artifact_type: &ArtifactType, _notes: &str) -> Option<serde_json::Value> {
            None
        }
    }

    fn config() -> ContextConfig {
        ContextConfig {
            max_meeting_notes_chars: 8000,
            max_rag_chars: 12000,
            min_assembled_chars: 100,
        }
    }

    #[tokio::test]
    async fn builds_assembled_context_with_requirements_section() {
        let builder = ContextBuilder::new(config());
        let ctx = builder
            .build_context(
                "Build a login page with email and password",
                &ArtifactType::MermaidErd,
                ContextRequest::default(),
            )
            .await;
        assert!(ctx.assembled.contains("## Requirements"));
        assert!(ctx.assembled.contains("login page"));
    }

    #[tokio::test]
    async fn missing_collaborator_degrades_gracefully() {
        let builder = ContextBuilder::new(config());
        let ctx = builder
            .build_context(
                "some notes",
                &ArtifactType::MermaidErd,
                ContextRequest {
                    include_rag: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(ctx.is_degraded());
    }

    #[tokio::test]
    async fn failing_rag_source_does_not_panic() {
        let builder = ContextBuilder::new(config()).with_rag(Arc::new(FailingRag));
        let ctx = builder
            .build_context(
                "some notes",
                &ArtifactType::MermaidErd,
                ContextRequest {
                    include_rag: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(ctx.sources.rag.is_none());
    }

    #[tokio::test]
    async fn rag_content_is_included_when_present() {
        let builder = ContextBuilder::new(config()).with_rag(Arc::new(StubRag("relevant snippet")));
        let ctx = builder
            .build_context(
                "some notes",
                &ArtifactType::MermaidErd,
                ContextRequest {
                    include_rag: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(ctx.assembled.contains("relevant snippet"));
        assert!(!ctx.is_degraded());
    }

    #[tokio::test]
    async fn cache_hit_returns_same_context_id() {
        let builder = ContextBuilder::new(config());
        let request = ContextRequest::default();
        let first = builder.build_context("same notes", &ArtifactType::MermaidErd, request).await;
        let second = builder.build_context("same notes", &ArtifactType::MermaidErd, request).await;
        assert_eq!(first.context_id, second.context_id);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let builder = ContextBuilder::new(config());
        let request = ContextRequest::default();
        let first = builder.build_context("same notes", &ArtifactType::MermaidErd, request).await;
        let second = builder
            .build_context(
                "same notes",
                &ArtifactType::MermaidErd,
                ContextRequest {
                    force_refresh: true,
                    ..request
                },
            )
            .await;
        assert_ne!(first.context_id, second.context_id);
    }

    #[tokio::test]
    async fn get_context_by_id_rebuilds_on_miss() {
        let builder = ContextBuilder::new(config());
        let ctx = builder
            .get_context_by_id("fresh notes", &ArtifactType::MermaidErd, ContextRequest::default())
            .await;
        assert!(ctx.assembled.contains("fresh notes"));
    }
}
