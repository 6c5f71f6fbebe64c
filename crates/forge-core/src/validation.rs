use serde::{Deserialize, Serialize};

/// Outcome of validating one piece of artifact content against its
/// type-specific rules (see `forge-validation`).
///
/// Invariant: `is_valid` implies `score >= threshold` for whatever threshold
/// the caller configured, AND the content passed every structural check —
/// the validator never sets `is_valid` from the score alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub score: u8,
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Clamp `score` to `[0, 100]` and derive `is_valid` from the threshold
    /// and whether any render-blocking error was recorded.
    pub fn new(score: i32, threshold: u8, errors: Vec<String>, render_blocking: bool) -> Self {
        let score = score.clamp(0, 100) as u8;
        Self {
            is_valid: score >= threshold && !render_blocking,
            score,
            errors,
        }
    }
}
