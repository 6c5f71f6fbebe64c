use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\n|\n```$|^```$").unwrap());
static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BAD_ARROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|>").unwrap());
static PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^\s*(here('s| is)|sure[,!]?|certainly|i('ll| will) (generate|create)|below is|this (is|diagram)).*\n").unwrap()
});
static EPILOGUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)\n\s*(let me know .*|i hope .*|feel free .*|this (diagram|code) (should|provides) .*)\s*$").unwrap()
});
static ERD_CLASS_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{").unwrap());
static ERD_METHOD_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[+\-#~][A-Za-z_][A-Za-z0-9_]*\([^)]*\).*$\n?").unwrap());
static ERD_FIELD_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[+\-#~]?([A-Za-z_][A-Za-z0-9_<>\[\]]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap());

const MAX_ITERATIONS: u32 = 3;

/// Strips common model-output noise until two consecutive passes produce the
/// same string, or `MAX_ITERATIONS` is hit (§4.4: "multi-pass, up to 3,
/// with convergence detection"). Each pass is a pure, independently testable
/// step: fence stripping, preamble/epilogue removal, arrow-syntax fixing,
/// and — for content that looks like a class diagram mislabeled as an ERD —
/// best-effort coercion to ERD syntax.
pub fn cleanup(raw: &str) -> String {
    let mut current = raw.trim().to_string();

    for _ in 0..MAX_ITERATIONS {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
    current
}

fn clean_pass(input: &str) -> String {
    let mut out = input.trim().to_string();
    out = CODE_FENCE.replace_all(&out, "").trim().to_string();
    out = PREAMBLE.replace_all(&out, "").trim().to_string();
    out = EPILOGUE.replace_all(&out, "").trim().to_string();
    out = BAD_ARROW.replace_all(&out, ">").to_string();
    out = TRAILING_WS.replace_all(&out, "\n").to_string();
    out
}

/// Coerces a `classDiagram`-shaped body into `erDiagram` syntax when a model
/// confuses the two: `class NAME { +field type }` becomes `NAME { type
/// field }`, method lines (which have no ERD equivalent) are dropped. Returns
/// the input unchanged if it does not look like class-diagram syntax, or if
/// no entity headers are found after coercion (signaling the caller should
/// treat this as a validation error rather than silently emitting nothing).
pub fn coerce_erd_from_class_diagram(body: &str) -> String {
    if !ERD_CLASS_HEADER.is_match(body) {
        return body.to_string();
    }

    let without_methods = ERD_METHOD_LINE.replace_all(body, "");
    let mut out = ERD_CLASS_HEADER
        .replace_all(&without_methods, |caps: &regex::Captures| format!("{} {{", &caps[1]))
        .to_string();

    out = ERD_FIELD_LINE
        .replace_all(&out, |caps: &regex::Captures| format!("  {} {}", &caps[1], &caps[2]))
        .to_string();

    out = out.replace("erDiagram", "").trim().to_string();
    format!("erDiagram\n{out}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_fence_wrapper() {
        let raw = "```mermaid\nerDiagram\n  A ||--o{ B : has\n```";
        assert_eq!(cleanup(raw), "erDiagram\n  A ||--o{ B : has");
    }

    #[test]
    fn strips_doubly_nested_fence_wrapper() {
        let raw = "```\n```mermaid\nerDiagram\n```\n```";
        assert_eq!(cleanup(raw), "erDiagram");
    }

    #[test]
    fn converges_on_already_clean_input() {
        let raw = "erDiagram\n  A ||--o{ B : has";
        assert_eq!(cleanup(raw), raw);
    }

    #[test]
    fn bails_out_after_max_iterations_without_panicking() {
        let pathological = "```".repeat(20);
        let _ = cleanup(&pathological);
    }

    #[test]
    fn strips_ai_preamble_and_epilogue() {
        let raw = "Here is the diagram you requested:\nerDiagram\n  A ||--o{ B : has\nLet me know if you need any changes!";
        assert_eq!(cleanup(raw), "erDiagram\n  A ||--o{ B : has");
    }

    #[test]
    fn fixes_bad_arrow_syntax() {
        let raw = "flowchart TD\n  A |> B";
        assert_eq!(cleanup(raw), "flowchart TD\n  A > B");
    }

    #[test]
    fn coerces_class_diagram_to_erd() {
        let body = "class User {\n  +id int\n  +login()\n}\nclass Order {\n  +id int\n}";
        let coerced = coerce_erd_from_class_diagram(body);
        assert!(coerced.starts_with("erDiagram"));
        assert!(coerced.contains("User {"));
        assert!(coerced.contains("id int"));
        assert!(!coerced.contains("login()"));
    }

    #[test]
    fn leaves_non_class_diagram_body_unchanged() {
        let body = "erDiagram\n  A ||--o{ B : has";
        assert_eq!(coerce_erd_from_class_diagram(body), body);
    }
}
