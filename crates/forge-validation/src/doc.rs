use forge_core::{ArtifactType, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;

const PLACEHOLDER_MARKERS: &[&str] = &["{{", "}}", "[INSERT", "[TODO", "[TBD", "lorem ipsum"];
const STRUCTURED_MIN_LENGTH: usize = 100;

static OPENAPI_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mi)^\s*(openapi|swagger)\s*:").unwrap());
static ENDPOINT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(GET|POST|PUT|DELETE|PATCH)\s+/").unwrap());
static USER_STORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)as an?\s+.+?,?\s*i want\s+.+?,?\s*so that").unwrap());
static ACCEPTANCE_CRITERIA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mi)acceptance criteria").unwrap());
static HEADER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#{1,6}\s+\S").unwrap());
static NUMBERED_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(\d+[.)]|[-*])\s+\S").unwrap());

/// Validates doc-family artifacts, dispatching to the per-type structural
/// rule §4.4 names: OpenAPI/endpoint markers for API docs, the "as a / I
/// want / so that" shape for JIRA stories, and structured-content (headers
/// or numbered lists) plus a length floor for everything else in the
/// doc category (workflows, backlog, personas, estimations, feature
/// scoring, visual prototypes).
pub fn validate_doc(artifact_type: &ArtifactType, content: &str, threshold: u8) -> ValidationResult {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return ValidationResult::new(0, threshold, vec!["content is empty".into()], true);
    }

    match artifact_type {
        ArtifactType::ApiDocs => validate_api_docs(trimmed, threshold),
        ArtifactType::Jira => validate_jira(trimmed, threshold),
        _ => validate_structured(trimmed, threshold),
    }
}

fn validate_api_docs(trimmed: &str, threshold: u8) -> ValidationResult {
    let mut score: i32 = 100;
    let mut errors = Vec::new();
    let mut render_blocking = false;

    let has_openapi = OPENAPI_DECLARATION.is_match(trimmed);
    let has_endpoints = ENDPOINT_MARKER.is_match(trimmed);
    if !has_openapi && !has_endpoints {
        errors.push("no OpenAPI/Swagger declaration and no recognizable endpoint markers (GET/POST/PUT/DELETE)".into());
        score -= 50;
        render_blocking = true;
    }

    apply_common_penalties(trimmed, &mut score, &mut errors, &mut render_blocking);
    ValidationResult::new(score, threshold, errors, render_blocking)
}

fn validate_jira(trimmed: &str, threshold: u8) -> ValidationResult {
    let mut score: i32 = 100;
    let mut errors = Vec::new();
    let mut render_blocking = false;

    if !USER_STORY.is_match(trimmed) {
        errors.push("missing 'as a/an ... I want ... so that' story structure".into());
        score -= 50;
        render_blocking = true;
    }

    if !ACCEPTANCE_CRITERIA.is_match(trimmed) {
        errors.push("missing acceptance criteria section".into());
        score -= 15;
    }

    apply_common_penalties(trimmed, &mut score, &mut errors, &mut render_blocking);
    ValidationResult::new(score, threshold, errors, render_blocking)
}

fn validate_structured(trimmed: &str, threshold: u8) -> ValidationResult {
    let mut score: i32 = 100;
    let mut errors = Vec::new();
    let mut render_blocking = false;

    if trimmed.len() < STRUCTURED_MIN_LENGTH {
        errors.push(format!(
            "content is only {} characters, below the {} minimum",
            trimmed.len(),
            STRUCTURED_MIN_LENGTH
        ));
        score -= 40;
        render_blocking = true;
    }

    if !HEADER_LINE.is_match(trimmed) && !NUMBERED_LIST.is_match(trimmed) {
        errors.push("content is unstructured prose: no markdown headers or numbered/bulleted list found".into());
        score -= 45;
        render_blocking = true;
    }

    apply_common_penalties(trimmed, &mut score, &mut errors, &mut render_blocking);
    ValidationResult::new(score, threshold, errors, render_blocking)
}

fn apply_common_penalties(trimmed: &str, score: &mut i32, errors: &mut Vec<String>, render_blocking: &mut bool) {
    if trimmed.contains("```") {
        errors.push("content still contains a markdown code fence".to_string());
        *score -= 20;
    }

    let lower = trimmed.to_lowercase();
    for marker in PLACEHOLDER_MARKERS {
        if lower.contains(&marker.to_lowercase()) {
            errors.push(format!("unfilled template placeholder '{}' left in content", marker));
            *score -= 30;
            *render_blocking = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_complete_backlog_passes() {
        let content = "## Backlog\n\n1. Build login flow with email + password\n2. Add password reset email\n3. Add rate limiting on login attempts and lock accounts after five failures";
        let result = validate_doc(&ArtifactType::Backlog, content, 80);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn unstructured_prose_is_render_blocking() {
        let content = "a".repeat(150);
        let result = validate_doc(&ArtifactType::Backlog, &content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn too_short_is_render_blocking() {
        let result = validate_doc(&ArtifactType::Backlog, "## Backlog: TBD", 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn leftover_placeholder_is_render_blocking() {
        let content = "## Estimations\n\n1. Story: {{story_name}} - {{points}} points, owner [INSERT NAME HERE]\n2. Story: login flow - 5 points";
        let result = validate_doc(&ArtifactType::Estimations, content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn api_docs_with_openapi_declaration_passes() {
        let content = "openapi: 3.0.0\ninfo:\n  title: Orders API\npaths:\n  /orders:\n    get:\n      summary: list orders";
        let result = validate_doc(&ArtifactType::ApiDocs, content, 80);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn api_docs_with_endpoint_markers_passes() {
        let content = "# Orders API\n\nGET /orders - list all orders\nPOST /orders - create an order\nDELETE /orders/{id} - remove an order";
        let result = validate_doc(&ArtifactType::ApiDocs, content, 80);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn api_docs_without_markers_is_render_blocking() {
        let content = "This describes the orders system in prose without any endpoint markers or schema declarations of any kind whatsoever.";
        let result = validate_doc(&ArtifactType::ApiDocs, content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn jira_story_with_acceptance_criteria_passes() {
        let content = "As a customer, I want to reset my password so that I can regain access to my account.\n\nAcceptance Criteria:\n- Reset link expires after 1 hour\n- Email is sent within 30 seconds";
        let result = validate_doc(&ArtifactType::Jira, content, 80);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn jira_story_missing_structure_is_render_blocking() {
        let content = "The user should be able to reset their password somehow, we need to figure out the details later on.";
        let result = validate_doc(&ArtifactType::Jira, content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn jira_story_without_acceptance_criteria_is_penalized_but_not_blocking() {
        let content = "As a customer, I want to reset my password so that I can regain access to my account without contacting support.";
        let result = validate_doc(&ArtifactType::Jira, content, 80);
        assert!(result.errors.iter().any(|e| e.contains("acceptance criteria")));
    }
}
