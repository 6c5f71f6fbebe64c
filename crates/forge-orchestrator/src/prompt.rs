use forge_core::ArtifactType;

/// Built prompt for one provider call: an optional system message (diagram
/// syntax rules) plus the user message (requirements + context, or a custom
/// template's full substitution).
pub struct BuiltPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Diagram-category system prompt: exact syntax rules for the artifact kind
/// plus an explicit "output ONLY the diagram code" directive. Returns `None`
/// for non-diagram categories, which get no system message prepended.
fn diagram_system_prompt(artifact_type: &ArtifactType) -> Option<String> {
    let rules = match artifact_type {
        ArtifactType::MermaidErd => {
            "Use Mermaid erDiagram syntax. Declare at least two entities as `NAME { type name [PK|FK|UK] }` \
             blocks and at least one relationship using a valid cardinality symbol: ||--||, ||--o{, }o--o{, ||--o|."
        }
        ArtifactType::MermaidArchitecture | ArtifactType::MermaidFlowchart => {
            "Use Mermaid flowchart syntax. Start with a direction declaration (TD, TB, BT, LR, or RL), \
             declare at least three nodes with an explicit shape, and connect them with at least two edges."
        }
        ArtifactType::MermaidSequence => {
            "Use Mermaid sequenceDiagram syntax. Declare participants and at least two messages using \
             ->> or -->> arrows."
        }
        ArtifactType::MermaidClass => {
            "Use Mermaid classDiagram syntax. Declare at least two classes, each with a `{ ... }` body \
             listing its members."
        }
        ArtifactType::MermaidState => {
            "Use Mermaid stateDiagram-v2 syntax starting with `stateDiagram-v2` and declare at least two \
             state transitions with `-->`."
        }
        ArtifactType::MermaidComponent => {
            "Use Mermaid flowchart syntax with subgraphs representing components, each containing at \
             least one node, connected by at least two edges."
        }
        ArtifactType::MermaidGantt => {
            "Use Mermaid gantt syntax. Include a `title` line and a `dateFormat` line. Never use the word \
             'depend' anywhere in a task line. Each task line must be `Name :id[, startRef], duration`."
        }
        ArtifactType::MermaidPie => "Use Mermaid pie chart syntax starting with `pie` followed by `\"label\" : value` entries.",
        ArtifactType::MermaidJourney => "Use Mermaid journey syntax with sections and `Task: score: Actor` entries.",
        ArtifactType::MermaidMindmap => "Use Mermaid mindmap syntax with a single root and indented child nodes.",
        ArtifactType::MermaidGitGraph => "Use Mermaid gitGraph syntax with `commit`, `branch`, `checkout`, and `merge` statements.",
        ArtifactType::MermaidTimeline => "Use Mermaid timeline syntax starting with `timeline` and `section` groupings of dated entries.",
        ArtifactType::C4Context => "Use Mermaid C4Context syntax with Person/System/System_Ext declarations and Rel() relationships.",
        ArtifactType::C4Container => "Use Mermaid C4Container syntax with Container() declarations grouped by System_Boundary and Rel() relationships.",
        ArtifactType::C4Component => "Use Mermaid C4Component syntax with Component() declarations and Rel() relationships.",
        ArtifactType::C4Deployment => "Use Mermaid C4Deployment syntax with Deployment_Node() nesting and Rel() relationships.",
        _ => return None,
    };
    Some(format!(
        "{rules}\n\nOutput ONLY the diagram code. Do not include explanations, markdown fences, or any text before or after the diagram."
    ))
}

/// Default prompt shape: requirements + assembled context + a fixed
/// instructions block.
fn default_user_prompt(pretty_type: &str, sanitized_notes: &str, sanitized_context: &str) -> String {
    format!(
        "Generate a {pretty_type}\n\n\
         ## Requirements\n{sanitized_notes}\n\n\
         ## Project Context (from codebase)\n{sanitized_context}\n\n\
         ## Instructions\n\
         1. Complete and production-ready\n\
         2. Follow best practices\n\
         3. Include necessary details\n\
         4. Validate syntax."
    )
}

/// Builds the prompt for one generation attempt. When `custom_template` is
/// set (a registered custom artifact type's template), it replaces the
/// default prompt shape entirely via `{meeting_notes}`/`{context}`
/// substitution; the diagram system prompt (if any) is still prepended.
/// `include_tests` only has an effect for `ArtifactType::CodePrototype`: it
/// asks for an `=== IMPLEMENTATION ===` / `=== TESTS ===` separator, which
/// the code validator then requires.
pub fn build_prompt(
    meeting_notes: &str,
    assembled_context: &str,
    artifact_type: &ArtifactType,
    custom_template: Option<&str>,
    include_tests: bool,
) -> BuiltPrompt {
    let mut user = match custom_template {
        Some(template) => template
            .replace("{meeting_notes}", meeting_notes)
            .replace("{context}", assembled_context),
        None => default_user_prompt(&artifact_type.pretty_name(), meeting_notes, assembled_context),
    };

    if include_tests && matches!(artifact_type, ArtifactType::CodePrototype) {
        user.push_str(
            "\n5. Separate implementation from tests using exactly two lines, `=== IMPLEMENTATION ===` \
             followed later by `=== TESTS ===`, each on its own line.",
        );
    }

    BuiltPrompt {
        system: diagram_system_prompt(artifact_type),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagram_prompt_includes_output_only_directive() {
        let prompt = build_prompt("notes", "ctx", &ArtifactType::MermaidErd, None, false);
        assert!(prompt.system.unwrap().contains("Output ONLY the diagram code"));
        assert!(prompt.user.contains("## Requirements"));
    }

    #[test]
    fn doc_type_has_no_system_prompt() {
        let prompt = build_prompt("notes", "ctx", &ArtifactType::ApiDocs, None, false);
        assert!(prompt.system.is_none());
    }

    #[test]
    fn custom_template_replaces_default_shape_entirely() {
        let template = "Custom: {meeting_notes} / {context}";
        let prompt = build_prompt(
            "notes",
            "ctx",
            &ArtifactType::Custom("risk_matrix".into()),
            Some(template),
            false,
        );
        assert_eq!(prompt.user, "Custom: notes / ctx");
    }

    #[test]
    fn include_tests_appends_separator_instruction_for_code_prototype() {
        let prompt = build_prompt("notes", "ctx", &ArtifactType::CodePrototype, None, true);
        assert!(prompt.user.contains("=== IMPLEMENTATION ==="));
        assert!(prompt.user.contains("=== TESTS ==="));
    }

    #[test]
    fn include_tests_has_no_effect_outside_code_prototype() {
        let prompt = build_prompt("notes", "ctx", &ArtifactType::MermaidErd, None, true);
        assert!(!prompt.user.contains("IMPLEMENTATION"));
    }
}
