use forge_core::ValidationResult;

const MERMAID_HEADERS: &[&str] = &[
    "erDiagram",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "gantt",
    "gitGraph",
];

/// Validates an HTML prototype or the HTML companion rendered alongside a
/// mermaid diagram: must contain `<html`, `<body`, at least one of
/// `<script>`/`<style>`, at least five tags total, every opened tag among
/// [`TRACKED_TAGS`] must close, and — since this is meant to be a rendered
/// page, not a diagram source — it must not embed raw Mermaid diagram
/// content inline.
pub fn validate_html(content: &str, threshold: u8) -> ValidationResult {
    let mut score: i32 = 100;
    let mut errors = Vec::new();
    let mut render_blocking = false;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return ValidationResult::new(0, threshold, vec!["content is empty".into()], true);
    }

    if trimmed.contains("```") {
        errors.push("content still contains a markdown code fence".to_string());
        score -= 30;
        render_blocking = true;
    }

    let lower = trimmed.to_lowercase();
    if !lower.contains("<html") {
        errors.push("missing <html> root element".to_string());
        score -= 40;
        render_blocking = true;
    }

    if !lower.contains("<body") {
        errors.push("missing <body> element".to_string());
        score -= 30;
        render_blocking = true;
    }

    if !lower.contains("<script") && !lower.contains("<style") {
        errors.push("missing a <script> or <style> block".to_string());
        score -= 20;
        render_blocking = true;
    }

    let total_tags = count_occurrences(&lower, "<") - count_occurrences(&lower, "</");
    if total_tags < 5 {
        errors.push(format!("only {total_tags} tags found, needs at least 5"));
        score -= 25;
        render_blocking = true;
    }

    for tag in TRACKED_TAGS {
        let opens = count_occurrences(&lower, &format!("<{}", tag));
        let closes = count_occurrences(&lower, &format!("</{}>", tag));
        if opens != closes {
            errors.push(format!(
                "unbalanced <{tag}>: {opens} opening vs {closes} closing"
            ));
            score -= 20;
            render_blocking = true;
        }
    }

    for header in MERMAID_HEADERS {
        if content.contains(header) {
            errors.push(format!(
                "HTML body embeds raw mermaid diagram content ('{header}'); it should be rendered, not inlined as source"
            ));
            score -= 30;
            render_blocking = true;
        }
    }

    ValidationResult::new(score, threshold, errors, render_blocking)
}

const TRACKED_TAGS: &[&str] = &["html", "head", "body", "div", "script", "style"];

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_html_passes() {
        let content = "<html><head><style>body{}</style></head><body><div>ok</div></body></html>";
        let result = validate_html(content, 80);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn missing_html_root_is_render_blocking() {
        let content = "<div>no root here</div>";
        let result = validate_html(content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn unclosed_div_is_render_blocking() {
        let content = "<html><body><div>unclosed</body></html>";
        let result = validate_html(content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn missing_script_or_style_is_render_blocking() {
        let content = "<html><head></head><body><div>one</div><div>two</div></body></html>";
        let result = validate_html(content, 80);
        assert!(!result.is_valid);
    }

    #[test]
    fn embedded_mermaid_source_is_render_blocking() {
        let content = "<html><head><style>body{}</style></head><body><div>erDiagram\nA ||--o{ B : has</div></body></html>";
        let result = validate_html(content, 80);
        assert!(!result.is_valid);
    }
}
