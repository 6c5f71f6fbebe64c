use std::collections::HashMap;

use chrono::{DateTime, Utc};
use forge_core::ArtifactType;
use serde::{Deserialize, Serialize};

/// A single generated artifact tracked in the dependency graph.
///
/// `source_hashes` freezes the content hash of every artifact this one was
/// generated from, as of generation time; comparing those against the
/// current hash of each source is how staleness is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactNode {
    pub id: String,
    pub artifact_type: ArtifactType,
    pub content_hash: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub source_ids: Vec<String>,
    pub source_hashes: HashMap<String, String>,
}

impl ArtifactNode {
    /// Builds a first-version node. [`crate::ArtifactGraph::register`] bumps
    /// `version`/`updated_at` over this if a node with the same `id` and a
    /// different `content_hash` is already present.
    pub fn new(
        id: impl Into<String>,
        artifact_type: ArtifactType,
        content_hash: impl Into<String>,
        source_ids: Vec<String>,
        source_hashes: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            artifact_type,
            content_hash: content_hash.into(),
            version: 1,
            updated_at: Utc::now(),
            source_ids,
            source_hashes,
        }
    }
}

/// The static "what depends on what" table between artifact categories, used
/// to decide which artifacts to flag when a source changes even before a
/// node-level edge has been recorded.
///
/// This is the exact inverse of the authoritative downstream table (ERD →
/// {api-docs, code-prototype, sequence, class}; Architecture → {component,
/// sequence, code-prototype}; API-docs → {code-prototype, visual-prototype};
/// Code-prototype → {visual-prototype}; Class → {code-prototype}; Sequence →
/// {api-docs, workflows}; State → {code-prototype}; Component →
/// {C4-component, code-prototype}; C4-context → C4-container → C4-component
/// → {C4-deployment, code-prototype}; jira → {workflows, estimations}):
/// each arm here lists `artifact_type`'s upstream sources, not what it feeds.
pub fn static_dependencies(artifact_type: &ArtifactType) -> Vec<ArtifactType> {
    use forge_core::ArtifactType::*;
    match artifact_type {
        ApiDocs => vec![MermaidErd, MermaidSequence],
        CodePrototype => vec![
            MermaidErd,
            MermaidArchitecture,
            ApiDocs,
            MermaidClass,
            MermaidState,
            MermaidComponent,
            C4Component,
        ],
        VisualPrototype => vec![ApiDocs, CodePrototype],
        MermaidSequence => vec![MermaidErd, MermaidArchitecture],
        MermaidClass => vec![MermaidErd],
        Workflows => vec![MermaidSequence, Jira],
        Estimations => vec![Jira],
        MermaidComponent => vec![MermaidArchitecture],
        C4Component => vec![MermaidComponent, C4Container],
        C4Container => vec![C4Context],
        C4Deployment => vec![C4Component],
        Html(inner) => vec![inner.as_ref().clone()],
        _ => vec![],
    }
}

/// How one artifact relates to another in the graph. `DependsOn` is the only
/// kind the static table or `register`'s auto-link ever produces; the other
/// two are recorded only via an explicit [`crate::ArtifactGraph::add_link`]
/// call from a caller that knows the relationship (e.g. a sprint package
/// marking a regenerated variant as `DerivedFrom` its predecessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    DependsOn,
    DerivedFrom,
    Complements,
}

/// A single recorded edge between two artifact ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLink {
    pub source_id: String,
    pub target_id: String,
    pub link_type: LinkType,
}

/// One upstream artifact whose content changed after `node`'s last
/// generation, as reported by [`crate::ArtifactGraph::check_staleness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamChange {
    pub id: String,
    pub artifact_type: ArtifactType,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

/// Result of [`crate::ArtifactGraph::check_staleness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessReport {
    pub is_stale: bool,
    pub reason: Option<String>,
    pub stale_since: Option<DateTime<Utc>>,
    pub upstream_changes: Vec<UpstreamChange>,
    pub recommendation: Option<String>,
}

impl StalenessReport {
    pub fn fresh() -> Self {
        Self {
            is_stale: false,
            reason: None,
            stale_since: None,
            upstream_changes: Vec::new(),
            recommendation: None,
        }
    }
}
