use forge_core::ValidationResult;
use once_cell::sync::Lazy;
use regex::Regex;

const IMPLEMENTATION_MARKER: &str = "=== IMPLEMENTATION ===";
const TESTS_MARKER: &str = "=== TESTS ===";

static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(pub\s+)?(async\s+)?(class|struct|interface|fn|def|function|func)\s+[A-Za-z_]").unwrap()
});
static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(use|import|from|require|#include|using)\b").unwrap());

/// Validates generated code/prototype artifacts: a class-or-function
/// definition plus an import/using line (§4.4's minimum "this is plausibly a
/// program" bar), brace/bracket/paren balance, and no leftover fence markers
/// from a cleanup pass that failed to converge. When `expect_test_separator`
/// is set the content must also carry an `=== IMPLEMENTATION ===` /
/// `=== TESTS ===` pair, in that order. Deliberately does not attempt to
/// parse or lint the language itself — that is the job of whatever the
/// caller does with the artifact afterward.
pub fn validate_code(content: &str, threshold: u8, expect_test_separator: bool) -> ValidationResult {
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

    if !DEFINITION.is_match(trimmed) {
        errors.push("no class or function definition found".to_string());
        score -= 35;
        render_blocking = true;
    }

    if !IMPORT.is_match(trimmed) {
        errors.push("no import/using line found".to_string());
        score -= 15;
    }

    if let Some(err) = first_unbalanced(trimmed) {
        errors.push(err);
        score -= 40;
        render_blocking = true;
    }

    if trimmed.len() < 20 {
        errors.push("code body is implausibly short".to_string());
        score -= 20;
    }

    if expect_test_separator {
        match (trimmed.find(IMPLEMENTATION_MARKER), trimmed.find(TESTS_MARKER)) {
            (Some(impl_pos), Some(tests_pos)) if impl_pos < tests_pos => {}
            _ => {
                errors.push(format!(
                    "test generation was requested but '{IMPLEMENTATION_MARKER}' / '{TESTS_MARKER}' separators are missing or out of order"
                ));
                score -= 30;
                render_blocking = true;
            }
        }
    }

    ValidationResult::new(score, threshold, errors, render_blocking)
}

/// Returns a description of the first bracket mismatch found, ignoring
/// brackets inside single/double-quoted string literals and line comments.
fn first_unbalanced(content: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
                continue;
            }
            if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '/' if chars.peek() == Some(&'/') => in_line_comment = true,
            '{' | '[' | '(' => stack.push(c),
            '}' | ']' | ')' => {
                let expected = match c {
                    '}' => '{',
                    ']' => '[',
                    ')' => '(',
                    _ => unreachable!(),
                };
                match stack.pop() {
                    Some(open) if open == expected => {}
                    _ => return Some(format!("unmatched closing '{}'", c)),
                }
            }
            _ => {}
        }
    }

    stack.last().map(|open| format!("unclosed '{}'", open))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_code_passes() {
        let content = "use std::collections::HashMap;\n\nfn main() {\n    let v = vec![1, 2, 3];\n    println!(\"{:?}\", v);\n}";
        let result = validate_code(content, 80, false);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn unclosed_brace_is_render_blocking() {
        let content = "use std::io;\nfn main() {\n    let v = vec![1, 2, 3];";
        let result = validate_code(content, 80, false);
        assert!(!result.is_valid);
    }

    #[test]
    fn braces_inside_string_literal_are_ignored() {
        let content = "import re\n\ndef greet():\n    return \"hello {name}\"";
        let result = validate_code(content, 80, false);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn missing_definition_is_render_blocking() {
        let content = "use std::io;\n\nlet x = 1;\nlet y = 2;\nprintln!(\"{}\", x + y);";
        let result = validate_code(content, 80, false);
        assert!(!result.is_valid);
    }

    #[test]
    fn missing_import_is_penalized_but_not_blocking() {
        let content = "fn main() {\n    println!(\"hello\");\n}";
        let result = validate_code(content, 80, false);
        assert!(result.errors.iter().any(|e| e.contains("import")));
    }

    #[test]
    fn test_separator_required_when_requested() {
        let content = "use std::io;\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}";
        let result = validate_code(content, 80, true);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_separator_present_in_order_passes() {
        let content = "use std::io;\n\n=== IMPLEMENTATION ===\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\n=== TESTS ===\nfn test_add() {\n    assert_eq!(add(1, 2), 3);\n}";
        let result = validate_code(content, 80, true);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_separator_out_of_order_is_render_blocking() {
        let content = "use std::io;\n\n=== TESTS ===\nfn test_add() {}\n\n=== IMPLEMENTATION ===\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}";
        let result = validate_code(content, 80, true);
        assert!(!result.is_valid);
    }
}
