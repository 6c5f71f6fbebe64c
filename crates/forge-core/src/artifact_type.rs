use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;

use crate::error::{ForgeError, Result};

/// The family of validator that applies to a given artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCategory {
    DiagramMermaid,
    DiagramHtml,
    Code,
    Doc,
}

/// Closed enumeration of the built-in artifact kinds.
///
/// `Custom(name)` extends the set at runtime via [`ArtifactTypeRegistry::register_custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    MermaidErd,
    MermaidArchitecture,
    MermaidSequence,
    MermaidClass,
    MermaidState,
    MermaidFlowchart,
    MermaidComponent,
    MermaidGantt,
    MermaidPie,
    MermaidJourney,
    MermaidMindmap,
    MermaidGitGraph,
    MermaidTimeline,
    C4Context,
    C4Container,
    C4Component,
    C4Deployment,
    ApiDocs,
    CodePrototype,
    VisualPrototype,
    Jira,
    Workflows,
    Backlog,
    Personas,
    Estimations,
    FeatureScoring,
    /// The HTML-rendered companion of a mermaid diagram kind.
    Html(Box<ArtifactType>),
    /// A dynamically registered artifact type.
    Custom(String),
}

impl ArtifactType {
    /// Stable, lowercase identifier used as the artifact id, file stem, and
    /// registry key. Kept in sync with the `snake_case` serde representation.
    pub fn value(&self) -> String {
        match self {
            ArtifactType::Html(inner) => format!("{}_html", inner.value()),
            ArtifactType::Custom(name) => name.clone(),
            other => {
                let json = serde_json::to_value(other).unwrap_or(serde_json::Value::Null);
                json.as_str().map(|s| s.to_string()).unwrap_or_default()
            }
        }
    }

    /// Human-friendly title used in prompt templates ("Entity Relationship Diagram").
    pub fn pretty_name(&self) -> String {
        match self {
            ArtifactType::MermaidErd => "Entity Relationship Diagram".into(),
            ArtifactType::MermaidArchitecture => "Architecture Diagram".into(),
            ArtifactType::MermaidSequence => "Sequence Diagram".into(),
            ArtifactType::MermaidClass => "Class Diagram".into(),
            ArtifactType::MermaidState => "State Diagram".into(),
            ArtifactType::MermaidFlowchart => "Flowchart".into(),
            ArtifactType::MermaidComponent => "Component Diagram".into(),
            ArtifactType::MermaidGantt => "Gantt Chart".into(),
            ArtifactType::MermaidPie => "Pie Chart".into(),
            ArtifactType::MermaidJourney => "User Journey Map".into(),
            ArtifactType::MermaidMindmap => "Mindmap".into(),
            ArtifactType::MermaidGitGraph => "Git Graph".into(),
            ArtifactType::MermaidTimeline => "Timeline".into(),
            ArtifactType::C4Context => "C4 Context Diagram".into(),
            ArtifactType::C4Container => "C4 Container Diagram".into(),
            ArtifactType::C4Component => "C4 Component Diagram".into(),
            ArtifactType::C4Deployment => "C4 Deployment Diagram".into(),
            ArtifactType::ApiDocs => "API Documentation".into(),
            ArtifactType::CodePrototype => "Code Prototype".into(),
            ArtifactType::VisualPrototype => "Visual Prototype".into(),
            ArtifactType::Jira => "JIRA Stories".into(),
            ArtifactType::Workflows => "Workflows".into(),
            ArtifactType::Backlog => "Backlog".into(),
            ArtifactType::Personas => "User Personas".into(),
            ArtifactType::Estimations => "Estimations".into(),
            ArtifactType::FeatureScoring => "Feature Scoring".into(),
            ArtifactType::Html(inner) => format!("{} (HTML)", inner.pretty_name()),
            ArtifactType::Custom(name) => name.clone(),
        }
    }

    /// The built-in category, used to select a validator family. Custom types
    /// carry their category alongside the registration, not on the enum itself.
    pub fn builtin_category(&self) -> Option<ArtifactCategory> {
        use ArtifactCategory::*;
        let cat = match self {
            ArtifactType::MermaidErd
            | ArtifactType::MermaidArchitecture
            | ArtifactType::MermaidSequence
            | ArtifactType::MermaidClass
            | ArtifactType::MermaidState
            | ArtifactType::MermaidFlowchart
            | ArtifactType::MermaidComponent
            | ArtifactType::MermaidGantt
            | ArtifactType::MermaidPie
            | ArtifactType::MermaidJourney
            | ArtifactType::MermaidMindmap
            | ArtifactType::MermaidGitGraph
            | ArtifactType::MermaidTimeline
            | ArtifactType::C4Context
            | ArtifactType::C4Container
            | ArtifactType::C4Component
            | ArtifactType::C4Deployment => DiagramMermaid,
            ArtifactType::CodePrototype => Code,
            ArtifactType::ApiDocs
            | ArtifactType::VisualPrototype
            | ArtifactType::Jira
            | ArtifactType::Workflows
            | ArtifactType::Backlog
            | ArtifactType::Personas
            | ArtifactType::Estimations
            | ArtifactType::FeatureScoring => Doc,
            ArtifactType::Html(_) => DiagramHtml,
            ArtifactType::Custom(_) => return None,
        };
        Some(cat)
    }

    pub fn is_mermaid(&self) -> bool {
        matches!(self.builtin_category(), Some(ArtifactCategory::DiagramMermaid))
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for ArtifactType {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        let quoted = format!("\"{}\"", s);
        if let Ok(builtin) = serde_json::from_str::<ArtifactType>(&quoted) {
            if !matches!(builtin, ArtifactType::Custom(_)) {
                return Ok(builtin);
            }
        }
        if let Some(base) = s.strip_suffix("_html") {
            return ArtifactType::from_str(base).map(|t| ArtifactType::Html(Box::new(t)));
        }
        Ok(ArtifactType::Custom(s.to_string()))
    }
}

/// A runtime-registered artifact kind with its own prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomTypeDefinition {
    pub name: String,
    pub prompt_template: String,
    pub category: ArtifactCategory,
}

/// Closed enum of built-ins plus a runtime table of custom types and their
/// prompt templates. Built-in types are immutable; custom types persist via
/// whatever store [`ArtifactTypeRegistry::load_custom_types`] is given.
#[derive(Default)]
pub struct ArtifactTypeRegistry {
    custom: RwLock<HashMap<String, CustomTypeDefinition>>,
}

impl ArtifactTypeRegistry {
    pub fn new() -> Self {
        Self {
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a name to a built-in or previously registered custom type.
    pub fn resolve(&self, name: &str) -> Result<ArtifactType> {
        if let Ok(t) = ArtifactType::from_str(name) {
            if !matches!(t, ArtifactType::Custom(_)) {
                return Ok(t);
            }
        }
        if self.custom.read().contains_key(name) {
            return Ok(ArtifactType::Custom(name.to_string()));
        }
        Err(ForgeError::NotFound(format!("artifact type '{}' is not registered", name)))
    }

    /// Register a new custom artifact type. The template must contain both
    /// `{meeting_notes}` and `{context}` placeholders, otherwise registration
    /// fails with `invalid_template`.
    pub fn register_custom(
        &self,
        name: &str,
        prompt_template: &str,
        category: ArtifactCategory,
    ) -> Result<()> {
        if !prompt_template.contains("{meeting_notes}") || !prompt_template.contains("{context}")
        {
            return Err(ForgeError::InvalidTemplate(format!(
                "template for '{}' must contain both {{meeting_notes}} and {{context}}",
                name
            )));
        }

        let mut custom = self.custom.write();
        if custom.contains_key(name) {
            return Err(ForgeError::Conflict(format!(
                "custom artifact type '{}' already registered",
                name
            )));
        }
        custom.insert(
            name.to_string(),
            CustomTypeDefinition {
                name: name.to_string(),
                prompt_template: prompt_template.to_string(),
                category,
            },
        );
        Ok(())
    }

    pub fn custom_definition(&self, name: &str) -> Option<CustomTypeDefinition> {
        self.custom.read().get(name).cloned()
    }

    pub fn category_of(&self, artifact_type: &ArtifactType) -> Option<ArtifactCategory> {
        match artifact_type {
            ArtifactType::Custom(name) => self.custom.read().get(name).map(|d| d.category),
            other => other.builtin_category(),
        }
    }

    /// Seed the registry from a previously persisted list, e.g. on startup.
    pub fn load_custom_types(&self, defs: Vec<CustomTypeDefinition>) {
        let mut custom = self.custom.write();
        for def in defs {
            custom.insert(def.name.clone(), def);
        }
    }

    pub fn list_custom(&self) -> Vec<CustomTypeDefinition> {
        self.custom.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_value_roundtrips() {
        let t = ArtifactType::MermaidErd;
        assert_eq!(t.value(), "mermaid_erd");
        assert_eq!(ArtifactType::from_str("mermaid_erd").unwrap(), t);
    }

    #[test]
    fn html_variant_value() {
        let t = ArtifactType::Html(Box::new(ArtifactType::MermaidSequence));
        assert_eq!(t.value(), "mermaid_sequence_html");
    }

    #[test]
    fn custom_registration_requires_placeholders() {
        let registry = ArtifactTypeRegistry::new();
        let err = registry
            .register_custom("risk_matrix", "no placeholders here", ArtifactCategory::Doc)
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidTemplate(_)));

        registry
            .register_custom(
                "risk_matrix",
                "Notes: {meeting_notes}\nContext: {context}",
                ArtifactCategory::Doc,
            )
            .unwrap();
        assert!(registry.resolve("risk_matrix").is_ok());
    }

    #[test]
    fn duplicate_custom_registration_conflicts() {
        let registry = ArtifactTypeRegistry::new();
        registry
            .register_custom("foo", "{meeting_notes} {context}", ArtifactCategory::Doc)
            .unwrap();
        let err = registry
            .register_custom("foo", "{meeting_notes} {context}", ArtifactCategory::Doc)
            .unwrap_err();
        assert!(matches!(err, ForgeError::Conflict(_)));
    }
}
