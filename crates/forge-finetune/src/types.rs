use chrono::{DateTime, Utc};
use forge_core::ArtifactType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a pool entry's `(prompt, response)` pair came from. Synthetic
/// entries are generated content accepted into the pool; real entries came
/// from an actual request. Graduation bars only count real entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    Real,
    Synthetic,
}

/// One admitted `(prompt, response, score, artifact_type, base_model)` tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTunePoolEntry {
    pub id: Uuid,
    #[serde(with = "artifact_type_value")]
    pub artifact_type: ArtifactType,
    pub prompt: String,
    pub response: String,
    pub score: u8,
    pub base_model: String,
    pub source: ExampleSource,
    pub created_at: DateTime<Utc>,
}

impl FineTunePoolEntry {
    pub fn new(
        artifact_type: ArtifactType,
        prompt: impl Into<String>,
        response: impl Into<String>,
        score: u8,
        base_model: impl Into<String>,
        source: ExampleSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact_type,
            prompt: prompt.into(),
            response: response.into(),
            score,
            base_model: base_model.into(),
            source,
            created_at: Utc::now(),
        }
    }
}

/// Summary returned by `get_source_breakdown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceBreakdown {
    pub real: usize,
    pub synthetic: usize,
    pub total: usize,
    /// `synthetic * 100 / total`, rounded down. Zero when the pool is empty.
    pub synthetic_pct: u8,
    pub ready_for_training: bool,
    pub ready_for_graduation: bool,
    pub needs_bootstrap: bool,
}

mod artifact_type_value {
    use forge_core::ArtifactType;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(t: &ArtifactType, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.value())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ArtifactType, D::Error> {
        let s = String::deserialize(d)?;
        ArtifactType::from_str(&s).map_err(serde::de::Error::custom)
    }
}
