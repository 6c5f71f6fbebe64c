use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{ModelId, Provider};

/// A single model/provider attempt recorded during a generation call, in the
/// order it was tried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub model: String,
    pub provider: Provider,
    pub content: Option<String>,
    pub score: Option<u8>,
    pub errors: Vec<String>,
    pub retry_index: u32,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Free-form side notes, e.g. "meeting_notes was empty, proceeding with context only".
    #[serde(default)]
    pub notes: Option<String>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// The non-ambiguous internal result of a generation attempt, per the
/// "eliminate success=true/is_valid=false ambiguity" design guidance: callers
/// of the orchestrator match on this instead of inspecting two booleans.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// An attempt reached the validation threshold.
    Ok {
        content: String,
        model_used: ModelId,
        score: u8,
    },
    /// Nothing reached the threshold; the best-scoring attempt is returned
    /// anyway so the caller has something to show.
    OkWithWarning {
        best_content: String,
        model_used: ModelId,
        score: u8,
        warning: String,
    },
    /// No candidate produced any content at all.
    Err { kind: GenerationErrorKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    NoModelsAvailable,
    AllAttemptsFailed,
}

/// The flat, serializable shape callers outside the orchestrator receive.
/// Constructed from a [`GenerationOutcome`] plus the attempts list by the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub content: Option<String>,
    pub model_used: Option<String>,
    pub provider: Option<Provider>,
    pub score: Option<u8>,
    pub is_valid: bool,
    pub attempts: Vec<Attempt>,
    pub warning: Option<String>,
    pub artifact_id: Option<String>,
    pub error_type: Option<GenerationErrorKind>,
}

impl GenerationResult {
    pub fn from_outcome(
        outcome: GenerationOutcome,
        attempts: Vec<Attempt>,
        artifact_id: Option<String>,
    ) -> Self {
        match outcome {
            GenerationOutcome::Ok {
                content,
                model_used,
                score,
            } => Self {
                success: true,
                content: Some(content),
                model_used: Some(model_used.as_str()),
                provider: Some(model_used.provider),
                score: Some(score),
                is_valid: true,
                attempts,
                warning: None,
                artifact_id,
                error_type: None,
            },
            GenerationOutcome::OkWithWarning {
                best_content,
                model_used,
                score,
                warning,
            } => Self {
                success: true,
                content: Some(best_content),
                model_used: Some(model_used.as_str()),
                provider: Some(model_used.provider),
                score: Some(score),
                is_valid: false,
                attempts,
                warning: Some(warning),
                artifact_id: None,
                error_type: None,
            },
            GenerationOutcome::Err { kind } => Self {
                success: false,
                content: None,
                model_used: None,
                provider: None,
                score: None,
                is_valid: false,
                attempts,
                warning: None,
                artifact_id: None,
                error_type: Some(kind),
            },
        }
    }
}
