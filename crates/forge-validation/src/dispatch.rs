use forge_core::{ArtifactCategory, ArtifactType, ArtifactTypeRegistry, ValidationResult};

use crate::code::validate_code;
use crate::html::validate_html;
use crate::mermaid::validate_mermaid;
use crate::doc::validate_doc;

/// Routes content to the validator family for `artifact_type`'s category and
/// scores it against `threshold`. Custom types resolve their category
/// through `registry`; a custom type with no registered category always
/// fails closed rather than silently skipping validation. `include_tests`
/// only affects `ArtifactType::CodePrototype`: when set, the code validator
/// requires an `=== IMPLEMENTATION ===` / `=== TESTS ===` separator.
pub fn validate_content(
    registry: &ArtifactTypeRegistry,
    artifact_type: &ArtifactType,
    content: &str,
    threshold: u8,
    include_tests: bool,
) -> ValidationResult {
    match registry.category_of(artifact_type) {
        Some(ArtifactCategory::DiagramMermaid) => validate_mermaid(artifact_type, content, threshold),
        Some(ArtifactCategory::DiagramHtml) => validate_html(content, threshold),
        Some(ArtifactCategory::Code) => validate_code(content, threshold, include_tests),
        Some(ArtifactCategory::Doc) => validate_doc(artifact_type, content, threshold),
        None => ValidationResult::new(
            0,
            threshold,
            vec![format!(
                "artifact type '{}' has no registered category to validate against",
                artifact_type.value()
            )],
            true,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_mermaid_types_to_mermaid_validator() {
        let registry = ArtifactTypeRegistry::new();
        let content = "erDiagram\n  A {\n    string id PK\n  }\n  B {\n    string id PK\n  }\n  A ||--o{ B : has";
        let result = validate_content(&registry, &ArtifactType::MermaidErd, content, 80, false);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn routes_html_companion_to_html_validator() {
        let registry = ArtifactTypeRegistry::new();
        let content = "<html><head><style>div{color:red}</style></head><body><div>ok</div></body></html>";
        let artifact_type = ArtifactType::Html(Box::new(ArtifactType::MermaidErd));
        let result = validate_content(&registry, &artifact_type, content, 80, false);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn unregistered_custom_type_fails_closed() {
        let registry = ArtifactTypeRegistry::new();
        let artifact_type = ArtifactType::Custom("risk_matrix".to_string());
        let result = validate_content(&registry, &artifact_type, "anything", 80, false);
        assert!(!result.is_valid);
    }
}
