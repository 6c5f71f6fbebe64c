use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sources consulted while assembling a [`Context`]. Each is optional and
/// independently best-effort (see `forge-context`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSources {
    pub rag: Option<serde_json::Value>,
    pub kg: Option<serde_json::Value>,
    pub patterns: Option<serde_json::Value>,
}

/// The assembled, sanitized prompt context for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub context_id: Uuid,
    pub meeting_notes: String,
    pub assembled: String,
    pub sources: ContextSources,
    pub created_at: DateTime<Utc>,
}

impl Context {
    pub fn is_degraded(&self) -> bool {
        matches!(self.sources.rag, None)
            && matches!(self.sources.kg, None)
            && matches!(self.sources.patterns, None)
    }
}
