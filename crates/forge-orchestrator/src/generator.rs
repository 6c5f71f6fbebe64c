use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forge_context::{ContextBuilder, ContextRequest};
use forge_core::config_manager::AppConfig;
use forge_core::{
    content_hash, ArtifactType, ArtifactTypeRegistry, Attempt, Context, GenerationErrorKind,
    GenerationOutcome, GenerationResult, ModelId,
};
use forge_finetune::{ExampleSource, FineTunePool};
use forge_graph::{static_dependencies, ArtifactGraph, ArtifactNode};
use forge_providers::{backoff_delay, GenerationConfig as ProviderGenConfig, LLMProviderFactory, Message, MessageRole};
use forge_registry::ModelRouter;
use forge_validation::{cleanup, coerce_erd_from_class_diagram, validate_content};

use crate::collaborators::{DiagramRenderer, ModelUnloader};
use crate::options::GenerationOptions;
use crate::progress::{emit_progress, ProgressCallback};
use crate::prompt::{build_prompt, BuiltPrompt};

struct BestAttempt {
    score: u8,
    content: String,
    model_id: ModelId,
}

fn update_best(best: &mut Option<BestAttempt>, score: u8, content: &str, model_id: &ModelId) {
    let better = best.as_ref().is_none_or(|b| score > b.score);
    if better {
        *best = Some(BestAttempt {
            score,
            content: content.to_string(),
            model_id: model_id.clone(),
        });
    }
}

fn prompt_to_messages(prompt: &BuiltPrompt) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &prompt.system {
        messages.push(Message {
            role: MessageRole::System,
            content: system.clone(),
        });
    }
    messages.push(Message {
        role: MessageRole::User,
        content: prompt.user.clone(),
    });
    messages
}

/// The generation pipeline: build prompt, try candidates in order with
/// retries, gate on validation, fall back to cloud, promote successful
/// models, emit progress.
pub struct GenerationOrchestrator {
    context_builder: Arc<ContextBuilder>,
    router: Arc<ModelRouter>,
    artifact_registry: Arc<ArtifactTypeRegistry>,
    pool: Arc<FineTunePool>,
    config: Arc<AppConfig>,
    unloader: Option<Arc<dyn ModelUnloader>>,
    renderer: Option<Arc<dyn DiagramRenderer>>,
    graph: Option<Arc<ArtifactGraph>>,
}

impl GenerationOrchestrator {
    pub fn new(
        context_builder: Arc<ContextBuilder>,
        router: Arc<ModelRouter>,
        artifact_registry: Arc<ArtifactTypeRegistry>,
        pool: Arc<FineTunePool>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            context_builder,
            router,
            artifact_registry,
            pool,
            config,
            unloader: None,
            renderer: None,
            graph: None,
        }
    }

    pub fn with_unloader(mut self, unloader: Arc<dyn ModelUnloader>) -> Self {
        self.unloader = Some(unloader);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DiagramRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Attaches the dependency graph (C8) so a successful `generate` call
    /// registers the artifact as a node, the way [`crate::sprint`]'s package
    /// generator already does for each artifact in a package.
    pub fn with_graph(mut self, graph: Arc<ArtifactGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// `generate(type, meeting_notes, options, progress_callback) →
    /// GenerationResult`, the core's `generate_artifact` operation.
    pub async fn generate(
        &self,
        artifact_type: &ArtifactType,
        meeting_notes: &str,
        options: &GenerationOptions,
        progress: Option<ProgressCallback>,
    ) -> GenerationResult {
        emit_progress(progress.as_ref(), 10, "building context");
        let context = self
            .context_builder
            .build_context(
                meeting_notes,
                artifact_type,
                ContextRequest {
                    include_rag: true,
                    include_kg: true,
                    include_patterns: true,
                    force_refresh: false,
                },
            )
            .await;
        emit_progress(progress.as_ref(), 30, "context assembled");

        let mut attempts: Vec<Attempt> = Vec::new();
        let mut best: Option<BestAttempt> = None;

        let custom_template = match artifact_type {
            ArtifactType::Custom(name) => self
                .artifact_registry
                .custom_definition(name)
                .map(|d| d.prompt_template),
            _ => None,
        };

        let routing = match self.router.routing_for(artifact_type) {
            Some(r) if r.enabled => r,
            _ => {
                return GenerationResult::from_outcome(
                    GenerationOutcome::Err {
                        kind: GenerationErrorKind::NoModelsAvailable,
                    },
                    attempts,
                    None,
                )
            }
        };

        // Preferred cloud short-circuit: a configured cloud primary is tried
        // once, ahead of every local candidate.
        let mut tried_cloud_primary = false;
        if routing.primary_model_id.provider.is_cloud()
            && self.config.credentials.has_key(routing.primary_model_id.provider)
        {
            tried_cloud_primary = true;
            emit_progress(
                progress.as_ref(),
                40,
                format!("trying preferred cloud model {}", routing.primary_model_id),
            );
            if let Some((content, score)) = self
                .run_candidate(
                    &routing.primary_model_id,
                    artifact_type,
                    meeting_notes,
                    &context,
                    custom_template.as_deref(),
                    options,
                    1,
                    false,
                    &mut attempts,
                    &mut best,
                )
                .await
            {
                return self
                    .finalize_success(
                        artifact_type,
                        &routing.primary_model_id,
                        score,
                        content,
                        meeting_notes,
                        attempts,
                        progress.as_ref(),
                    )
                    .await;
            }
        }
        let _ = tried_cloud_primary;

        // Local candidate loop.
        let local_candidates: Vec<ModelId> = routing
            .ordered_candidates()
            .into_iter()
            .filter(|m| m.provider.is_local())
            .collect();
        let local_total = local_candidates.len().max(1) as u8;
        for (i, model_id) in local_candidates.iter().enumerate() {
            emit_progress(
                progress.as_ref(),
                40 + (30 * i as u8 / local_total),
                format!("trying local model {model_id}"),
            );
            if let Some((content, score)) = self
                .run_candidate(
                    model_id,
                    artifact_type,
                    meeting_notes,
                    &context,
                    custom_template.as_deref(),
                    options,
                    options.max_retries_per_model + 1,
                    false,
                    &mut attempts,
                    &mut best,
                )
                .await
            {
                return self
                    .finalize_success(artifact_type, model_id, score, content, meeting_notes, attempts, progress.as_ref())
                    .await;
            }
        }

        // Cloud fallback loop: routing's cloud fallbacks, each with
        // exponential backoff across up to 3 attempts.
        let cloud_candidates: Vec<ModelId> = routing
            .fallback_model_ids
            .iter()
            .filter(|m| m.provider.is_cloud() && self.config.credentials.has_key(m.provider))
            .cloned()
            .collect();
        for model_id in &cloud_candidates {
            emit_progress(progress.as_ref(), 50, format!("trying cloud fallback {model_id}"));
            if let Some((content, score)) = self
                .run_candidate(
                    model_id,
                    artifact_type,
                    meeting_notes,
                    &context,
                    custom_template.as_deref(),
                    options,
                    3,
                    true,
                    &mut attempts,
                    &mut best,
                )
                .await
            {
                emit_progress(progress.as_ref(), 75, "validated cloud fallback attempt");
                return self
                    .finalize_success(artifact_type, model_id, score, content, meeting_notes, attempts, progress.as_ref())
                    .await;
            }
        }

        // Return policy: best-attempt-with-warning, or a hard error if
        // nothing ever produced content.
        match best {
            Some(b) => {
                emit_progress(progress.as_ref(), 95, "returning best attempt below threshold");
                let warning = format!(
                    "best score {} below threshold {}",
                    b.score, options.validation_threshold
                );
                let outcome = GenerationOutcome::OkWithWarning {
                    best_content: b.content,
                    model_used: b.model_id,
                    score: b.score,
                    warning,
                };
                emit_progress(progress.as_ref(), 100, "terminal");
                GenerationResult::from_outcome(outcome, attempts, None)
            }
            None => {
                let kind = if attempts.is_empty() {
                    GenerationErrorKind::NoModelsAvailable
                } else {
                    GenerationErrorKind::AllAttemptsFailed
                };
                emit_progress(progress.as_ref(), 100, "terminal");
                GenerationResult::from_outcome(GenerationOutcome::Err { kind }, attempts, None)
            }
        }
    }

    /// Runs up to `max_attempts` calls against a single candidate model,
    /// recording every attempt and updating `best`. Returns
    /// `Some((content, score))` the moment validation passes; `None` once
    /// the candidate is exhausted, signaling the caller to move on.
    #[allow(clippy::too_many_arguments)]
    async fn run_candidate(
        &self,
        model_id: &ModelId,
        artifact_type: &ArtifactType,
        meeting_notes: &str,
        context: &Context,
        custom_template: Option<&str>,
        options: &GenerationOptions,
        max_attempts: u32,
        use_backoff: bool,
        attempts: &mut Vec<Attempt>,
        best: &mut Option<BestAttempt>,
    ) -> Option<(String, u8)> {
        let provider = match LLMProviderFactory::build(model_id, &self.config) {
            Ok(p) => p,
            Err(e) => {
                attempts.push(Attempt {
                    model: model_id.as_str(),
                    provider: model_id.provider,
                    content: None,
                    score: None,
                    errors: vec![e.message],
                    retry_index: 0,
                    duration: Duration::ZERO,
                    notes: None,
                });
                return None;
            }
        };

        let timeout = if model_id.provider.is_cloud() {
            Duration::from_secs(self.config.generation.cloud_call_timeout_s)
        } else {
            Duration::from_secs(self.config.generation.local_call_timeout_s)
        };

        let mut retry_after: Option<Duration> = None;
        for attempt_index in 0..max_attempts {
            if use_backoff {
                backoff_delay(attempt_index, retry_after.take()).await;
            }

            let prompt = build_prompt(
                meeting_notes,
                &context.assembled,
                artifact_type,
                custom_template,
                options.include_tests,
            );
            let gen_config = ProviderGenConfig {
                temperature: options.temperature,
                max_tokens: Some(options.cloud_max_tokens),
                top_p: None,
                stop: None,
            };
            let messages = prompt_to_messages(&prompt);

            let started = Instant::now();
            let call = tokio::time::timeout(timeout, provider.generate_chat(&messages, &gen_config)).await;
            let duration = started.elapsed();

            let response = match call {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    retry_after = err.retry_after;
                    let retriable = err.retriable;
                    attempts.push(Attempt {
                        model: model_id.as_str(),
                        provider: model_id.provider,
                        content: None,
                        score: None,
                        errors: vec![err.message],
                        retry_index: attempt_index,
                        duration,
                        notes: None,
                    });
                    if retriable && attempt_index + 1 < max_attempts {
                        continue;
                    }
                    return None;
                }
                Err(_) => {
                    attempts.push(Attempt {
                        model: model_id.as_str(),
                        provider: model_id.provider,
                        content: None,
                        score: None,
                        errors: vec![format!("call to {model_id} timed out after {}s", timeout.as_secs())],
                        retry_index: attempt_index,
                        duration,
                        notes: None,
                    });
                    if attempt_index + 1 < max_attempts {
                        continue;
                    }
                    return None;
                }
            };

            let validation = validate_content(
                &self.artifact_registry,
                artifact_type,
                &response.content,
                options.validation_threshold,
                options.include_tests,
            );

            attempts.push(Attempt {
                model: model_id.as_str(),
                provider: model_id.provider,
                content: Some(response.content.clone()),
                score: Some(validation.score),
                errors: validation.errors.clone(),
                retry_index: attempt_index,
                duration,
                notes: None,
            });

            update_best(best, validation.score, &response.content, model_id);

            if validation.is_valid {
                return Some((response.content, validation.score));
            }
        }
        None
    }

    /// Post-success side effects: unload unless persistent, feed the
    /// fine-tune pool, render an HTML companion for mermaid types, and
    /// promote the model if it scored high enough.
    async fn finalize_success(
        &self,
        artifact_type: &ArtifactType,
        model_id: &ModelId,
        score: u8,
        content: String,
        meeting_notes: &str,
        attempts: Vec<Attempt>,
        progress: Option<&ProgressCallback>,
    ) -> GenerationResult {
        emit_progress(progress, 90, "validated, applying cleanup");
        let mut cleaned = cleanup(&content);
        if matches!(artifact_type, ArtifactType::MermaidErd) {
            cleaned = coerce_erd_from_class_diagram(&cleaned);
        }

        if let Some(unloader) = &self.unloader {
            if model_id.provider.is_local()
                && !self.config.generation.persistent_models.contains(&model_id.as_str())
            {
                unloader.unload(model_id).await;
            }
        }

        if score >= self.config.finetune.pool_min_score {
            if let Err(e) = self.pool.add_example(
                artifact_type.clone(),
                meeting_notes,
                &cleaned,
                score,
                model_id.as_str(),
                ExampleSource::Real,
            ) {
                tracing::warn!(error = %e, "failed to add example to fine-tune pool");
            }
        }

        if artifact_type.is_mermaid() {
            if let Some(renderer) = &self.renderer {
                let _ = renderer.render(artifact_type, &cleaned).await;
            }
        }

        if score >= 80 {
            let already_primary = self
                .router
                .routing_for(artifact_type)
                .map(|r| &r.primary_model_id == model_id)
                .unwrap_or(false);
            if !already_primary {
                if let Err(e) = self.router.promote(artifact_type, model_id) {
                    tracing::warn!(error = %e, "failed to promote model after successful generation");
                }
            }
        }

        if let Some(graph) = &self.graph {
            self.register_in_graph(graph, artifact_type, &cleaned);
        }

        emit_progress(progress, 100, "generation complete");

        let outcome = GenerationOutcome::Ok {
            content: cleaned,
            model_used: model_id.clone(),
            score,
        };
        GenerationResult::from_outcome(outcome, attempts, Some(artifact_type.value()))
    }

    /// Registers the just-generated artifact as a C8 node, id'd by
    /// `artifact_type.value()` per the convention the CLI's `graph register`
    /// and the sprint package generator both already follow. Upstream
    /// sources are whichever of `static_dependencies(artifact_type)` already
    /// have a node in the graph; a single `generate` call has no sibling
    /// artifacts from the same run to link against the way a package does.
    fn register_in_graph(&self, graph: &Arc<ArtifactGraph>, artifact_type: &ArtifactType, content: &str) {
        let id = artifact_type.value();
        let hash = content_hash(content);

        let mut source_ids = Vec::new();
        let mut source_hashes = HashMap::new();
        for upstream_type in static_dependencies(artifact_type) {
            if let Some(existing) = graph.get(&upstream_type.value()) {
                source_ids.push(existing.id.clone());
                source_hashes.insert(existing.id, existing.content_hash);
            }
        }

        let node = ArtifactNode::new(id.clone(), artifact_type.clone(), hash, source_ids, source_hashes);
        if let Err(e) = graph.upsert(node) {
            tracing::warn!(error = %e, artifact = %id, "failed to register generated artifact in graph");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_context::ContextBuilder;
    use forge_core::config_manager::{ContextConfig, FineTuneConfig};
    use forge_core::{ModelInfo, ModelRouting, Provider};
    use forge_registry::RegistryStore;
    use tempfile::tempdir;

    fn orchestrator() -> (GenerationOrchestrator, tempfile::TempDir) {
        let config = Arc::new(AppConfig::default());
        let context_builder = Arc::new(ContextBuilder::new(ContextConfig {
            max_meeting_notes_chars: 8000,
            max_rag_chars: 12000,
            min_assembled_chars: 100,
        }));
        let router = Arc::new(ModelRouter::new(RegistryStore::new(), config.clone()));
        let registry = Arc::new(ArtifactTypeRegistry::new());
        let dir = tempdir().unwrap();
        let pool = Arc::new(
            FineTunePool::new(
                dir.path(),
                FineTuneConfig {
                    pool_min_score: 85,
                    incremental_batch_threshold: 50,
                    check_interval_s: 60,
                    hf_training_enabled: false,
                    hf_lora_rank: 16,
                    hf_gradient_accumulation: 8,
                    real_graduation_count: 200,
                    bootstrap_floor: 20,
                },
            )
            .unwrap(),
        );
        (
            GenerationOrchestrator::new(context_builder, router, registry, pool, config),
            dir,
        )
    }

    #[tokio::test]
    async fn no_routing_returns_no_models_available() {
        let (orchestrator, _dir) = orchestrator();
        let result = orchestrator
            .generate(
                &ArtifactType::MermaidErd,
                "notes",
                &GenerationOptions::from_config(&AppConfig::default()),
                None,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error_type, Some(GenerationErrorKind::NoModelsAvailable));
    }

    #[tokio::test]
    async fn disabled_routing_returns_no_models_available() {
        let (orchestrator, _dir) = orchestrator();
        let primary = ModelId::new(Provider::Ollama, "llama3");
        let mut routing = ModelRouting::new(ArtifactType::MermaidErd, primary.clone(), vec![]);
        routing.enabled = false;
        orchestrator.router().update_routing(routing).unwrap();
        orchestrator
            .router()
            .register_model(ModelInfo::new(primary, "Llama 3"))
            .unwrap();

        let result = orchestrator
            .generate(
                &ArtifactType::MermaidErd,
                "notes",
                &GenerationOptions::from_config(&AppConfig::default()),
                None,
            )
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn unreachable_local_model_falls_through_to_no_models_available() {
        let (orchestrator, _dir) = orchestrator();
        let primary = ModelId::new(Provider::Ollama, "llama3-does-not-exist");
        let routing = ModelRouting::new(ArtifactType::MermaidErd, primary, vec![]);
        orchestrator.router().update_routing(routing).unwrap();

        let mut options = GenerationOptions::from_config(&AppConfig::default());
        options.max_retries_per_model = 0;

        let result = orchestrator
            .generate(&ArtifactType::MermaidErd, "notes", &options, None)
            .await;
        // No ollama daemon in the test environment: the call fails, and with
        // zero retries that's exactly one attempt before giving up.
        assert!(!result.is_valid);
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn register_in_graph_links_existing_upstream_by_type() {
        let (orchestrator, dir) = orchestrator();
        let graph = Arc::new(ArtifactGraph::load(dir.path().join("graph.json")).unwrap());
        let orchestrator = orchestrator.with_graph(graph.clone());

        graph
            .upsert(ArtifactNode::new(
                ArtifactType::MermaidErd.value(),
                ArtifactType::MermaidErd,
                "erd-hash",
                vec![],
                HashMap::new(),
            ))
            .unwrap();

        orchestrator.register_in_graph(&graph, &ArtifactType::MermaidClass, "classDiagram\n  A");

        let node = graph.get(&ArtifactType::MermaidClass.value()).unwrap();
        assert_eq!(node.version, 1);
        assert_eq!(node.source_ids, vec![ArtifactType::MermaidErd.value()]);
        assert!(!graph.is_stale(&ArtifactType::MermaidClass.value()));
    }

    #[tokio::test]
    async fn register_in_graph_skips_linking_when_upstream_absent() {
        let (orchestrator, dir) = orchestrator();
        let graph = Arc::new(ArtifactGraph::load(dir.path().join("graph.json")).unwrap());
        let orchestrator = orchestrator.with_graph(graph.clone());

        orchestrator.register_in_graph(&graph, &ArtifactType::MermaidErd, "erDiagram\n  A");

        let node = graph.get(&ArtifactType::MermaidErd.value()).unwrap();
        assert!(node.source_ids.is_empty());
    }
}
