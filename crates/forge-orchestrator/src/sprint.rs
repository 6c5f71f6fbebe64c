use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use forge_core::{content_hash, ArtifactType};
use forge_graph::{static_dependencies, ArtifactGraph, ArtifactNode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generator::GenerationOrchestrator;
use crate::options::GenerationOptions;
use crate::progress::ProgressEvent;

/// The excerpt window taken from each prior artifact when building enhanced
/// notes for the next one in a package.
const EXCERPT_CHARS: usize = 1500;

/// Fixed preset → ordered artifact-type list maps. Ordering respects
/// dependencies: ERD and architecture diagrams lead every preset that
/// touches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintPreset {
    Full,
    Backend,
    Frontend,
    Documentation,
    Pm,
    Quick,
}

impl SprintPreset {
    pub fn artifact_types(self) -> Vec<ArtifactType> {
        use ArtifactType::*;
        match self {
            SprintPreset::Full => vec![
                MermaidErd,
                MermaidArchitecture,
                MermaidFlowchart,
                MermaidSequence,
                MermaidClass,
                ApiDocs,
                CodePrototype,
                Jira,
                Workflows,
                Backlog,
                Personas,
                Estimations,
                FeatureScoring,
            ],
            SprintPreset::Backend => vec![MermaidErd, MermaidArchitecture, ApiDocs, CodePrototype],
            SprintPreset::Frontend => vec![MermaidArchitecture, MermaidComponent, VisualPrototype],
            SprintPreset::Documentation => vec![MermaidErd, MermaidArchitecture, ApiDocs],
            SprintPreset::Pm => vec![Jira, Workflows, Backlog, Personas, Estimations, FeatureScoring],
            SprintPreset::Quick => vec![MermaidErd, MermaidArchitecture],
        }
    }
}

/// Either a named preset or a caller-supplied ordered list of artifact types.
pub enum PackageSelection {
    Preset(SprintPreset),
    CustomTypes(Vec<ArtifactType>),
}

impl PackageSelection {
    fn label(&self) -> String {
        match self {
            PackageSelection::Preset(preset) => format!("{preset:?}").to_lowercase(),
            PackageSelection::CustomTypes(_) => "custom".to_string(),
        }
    }

    fn ordered_types(&self) -> Vec<ArtifactType> {
        match self {
            PackageSelection::Preset(preset) => preset.artifact_types(),
            PackageSelection::CustomTypes(types) => types.clone(),
        }
    }
}

/// One artifact's outcome within a package run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageArtifactResult {
    pub artifact_type: String,
    pub success: bool,
    pub is_valid: bool,
    pub content: Option<String>,
    pub score: Option<u8>,
    pub model_used: Option<String>,
    pub warning: Option<String>,
}

/// `generate_package`'s terminal `result` event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageResult {
    pub package_id: Uuid,
    pub preset: String,
    pub artifacts: Vec<PackageArtifactResult>,
    pub total_time_seconds: f64,
    pub success_rate: f64,
    pub failed_artifacts: Vec<String>,
}

/// Stream events emitted during a package run: either a pass-through
/// per-artifact progress tick, or the final result once every artifact has
/// been attempted.
#[derive(Debug, Clone)]
pub enum PackageEvent {
    Progress {
        artifact_type: String,
        index: usize,
        total: usize,
        event: ProgressEvent,
    },
    Result(Box<PackageResult>),
}

pub type PackageEventCallback = Arc<dyn Fn(PackageEvent) + Send + Sync>;

/// Streamed orchestration of N artifacts per preset, delegating each to
/// [`GenerationOrchestrator`] with inter-artifact context propagation (spec
/// section 4.9, C9).
pub struct SprintPackageGenerator {
    orchestrator: Arc<GenerationOrchestrator>,
    graph: Arc<ArtifactGraph>,
}

impl SprintPackageGenerator {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, graph: Arc<ArtifactGraph>) -> Self {
        Self { orchestrator, graph }
    }

    pub async fn generate_package(
        &self,
        notes: &str,
        selection: PackageSelection,
        callback: Option<PackageEventCallback>,
    ) -> PackageResult {
        let package_id = Uuid::new_v4();
        let preset_label = selection.label();
        let ordered_types = selection.ordered_types();
        let total = ordered_types.len();

        let started = Instant::now();
        let mut artifacts = Vec::with_capacity(total);
        let mut failed_artifacts = Vec::new();
        let mut excerpts: Vec<(ArtifactType, String)> = Vec::new();
        let mut generated_hashes: HashMap<String, String> = HashMap::new();

        for (index, artifact_type) in ordered_types.iter().enumerate() {
            let enhanced_notes = build_enhanced_notes(notes, &excerpts);

            let artifact_label = artifact_type.value();
            let progress_cb: Option<crate::progress::ProgressCallback> = callback.as_ref().map(|cb| {
                let cb = cb.clone();
                let label = artifact_label.clone();
                Arc::new(move |event: ProgressEvent| {
                    cb(PackageEvent::Progress {
                        artifact_type: label.clone(),
                        index,
                        total,
                        event,
                    });
                }) as crate::progress::ProgressCallback
            });

            let mut options = GenerationOptions::from_config(self.orchestrator.config());
            options.temperature = 0.3;
            options.max_retries_per_model = 2;

            let result = self
                .orchestrator
                .generate(artifact_type, &enhanced_notes, &options, progress_cb)
                .await;

            if result.success {
                if let Some(content) = &result.content {
                    excerpts.push((artifact_type.clone(), content.clone()));
                    let hash = content_hash(content);
                    let source_hashes: HashMap<String, String> = ordered_types[..index]
                        .iter()
                        .filter_map(|dep_type| {
                            static_dependencies(artifact_type)
                                .contains(dep_type)
                                .then(|| generated_hashes.get(&dep_type.value()).map(|h| (dep_type.value(), h.clone())))
                                .flatten()
                        })
                        .collect();
                    let node = ArtifactNode::new(
                        artifact_label.clone(),
                        artifact_type.clone(),
                        hash.clone(),
                        source_hashes.keys().cloned().collect(),
                        source_hashes,
                    );
                    if let Err(e) = self.graph.upsert(node) {
                        tracing::warn!(error = %e, artifact = %artifact_label, "failed to register package artifact in graph");
                    }
                    generated_hashes.insert(artifact_label.clone(), hash);
                }
            } else {
                failed_artifacts.push(artifact_label.clone());
            }

            artifacts.push(PackageArtifactResult {
                artifact_type: artifact_label,
                success: result.success,
                is_valid: result.is_valid,
                content: result.content,
                score: result.score,
                model_used: result.model_used,
                warning: result.warning,
            });
        }

        let total_time_seconds = started.elapsed().as_secs_f64();
        let success_rate = if total == 0 {
            0.0
        } else {
            artifacts.iter().filter(|a| a.success).count() as f64 / total as f64
        };

        let package_result = PackageResult {
            package_id,
            preset: preset_label,
            artifacts,
            total_time_seconds,
            success_rate,
            failed_artifacts,
        };

        if let Some(callback) = &callback {
            callback(PackageEvent::Result(Box::new(package_result.clone())));
        }

        package_result
    }
}

/// `original_notes + "\n\n---\n\n" + excerpts from previously generated
/// artifacts`, each excerpt truncated to [`EXCERPT_CHARS`] and labeled by
/// type.
fn build_enhanced_notes(original_notes: &str, excerpts: &[(ArtifactType, String)]) -> String {
    if excerpts.is_empty() {
        return original_notes.to_string();
    }
    let mut out = String::from(original_notes);
    out.push_str("\n\n---\n\n");
    for (artifact_type, content) in excerpts {
        let truncated: String = content.chars().take(EXCERPT_CHARS).collect();
        out.push_str(&format!("### {}\n{}\n\n", artifact_type.pretty_name(), truncated));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_preset_orders_erd_before_architecture() {
        let types = SprintPreset::Quick.artifact_types();
        assert_eq!(types, vec![ArtifactType::MermaidErd, ArtifactType::MermaidArchitecture]);
    }

    #[test]
    fn enhanced_notes_is_unchanged_with_no_prior_artifacts() {
        let notes = build_enhanced_notes("original", &[]);
        assert_eq!(notes, "original");
    }

    #[test]
    fn enhanced_notes_appends_labeled_excerpts() {
        let excerpts = vec![(ArtifactType::MermaidErd, "erDiagram\n  A ||--o{ B : has".to_string())];
        let notes = build_enhanced_notes("original", &excerpts);
        assert!(notes.contains("original"));
        assert!(notes.contains("---"));
        assert!(notes.contains("Entity Relationship Diagram"));
        assert!(notes.contains("erDiagram"));
    }

    #[test]
    fn excerpt_is_truncated_to_window() {
        let long_content = "x".repeat(5000);
        let excerpts = vec![(ArtifactType::MermaidErd, long_content)];
        let notes = build_enhanced_notes("n", &excerpts);
        let excerpt_section = notes.split("Entity Relationship Diagram\n").nth(1).unwrap();
        assert!(excerpt_section.trim().len() <= EXCERPT_CHARS);
    }
}
