use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::artifact_type::ArtifactType;

/// Known model providers. `Ollama` and `HuggingFace` run locally; the rest
/// are cloud HTTPS providers gated on an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    HuggingFace,
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
}

impl Provider {
    pub fn is_local(&self) -> bool {
        matches!(self, Provider::Ollama | Provider::HuggingFace)
    }

    pub fn is_cloud(&self) -> bool {
        !self.is_local()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::HuggingFace => "huggingface",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(Provider::Ollama),
            "huggingface" | "hf" => Ok(Provider::HuggingFace),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            "groq" => Ok(Provider::Groq),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A fully-qualified `<provider>:<name>` identifier. Preserves whatever came
/// after the first colon verbatim (Ollama tags such as `llama3:8b` contain
/// colons of their own), so `name` may itself contain `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId {
    pub provider: Provider,
    pub name: String,
}

impl ModelId {
    pub fn new(provider: Provider, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }

    /// Parse a possibly-bare model identifier. Bare names (`llama3`) are
    /// qualified with `default_provider`. Already-qualified ids are preserved
    /// as-is, EXCEPT that `foo:bar` is only treated as provider-qualified
    /// when `foo` parses as a known cloud provider or `ollama`/`huggingface`;
    /// otherwise the whole string is an Ollama tag (`ollama:foo:bar`), since
    /// Ollama allows tags that look like provider names.
    pub fn normalize(raw: &str, default_provider: Provider) -> Self {
        if let Some((head, rest)) = raw.split_once(':') {
            if let Ok(provider) = head.parse::<Provider>() {
                return Self::new(provider, rest.to_string());
            }
            return Self::new(Provider::Ollama, raw.to_string());
        }
        Self::new(default_provider, raw.to_string())
    }

    pub fn as_str(&self) -> String {
        format!("{}:{}", self.provider, self.name)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("model id '{}' is missing a provider prefix", s))?;
        let provider = head.parse::<Provider>()?;
        Ok(Self::new(provider, rest.to_string()))
    }
}

impl TryFrom<String> for ModelId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.as_str()
    }
}

/// Lifecycle status of a model as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Known,
    Downloading,
    Downloaded,
    Available,
    NoApiKey,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: ModelId,
    pub name: String,
    pub provider: Provider,
    pub status: ModelStatus,
    pub is_fine_tuned: bool,
    pub capabilities: HashSet<ArtifactType>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ModelInfo {
    pub fn new(id: ModelId, name: impl Into<String>) -> Self {
        let provider = id.provider;
        Self {
            id,
            name: name.into(),
            provider,
            status: ModelStatus::Known,
            is_fine_tuned: false,
            capabilities: HashSet::new(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Ordered candidate list for a single artifact type.
///
/// Invariant: `primary_model_id` must never appear in `fallback_model_ids`
/// after any update; enforced by whoever mutates a routing
/// (see `forge-registry`'s `ModelRouter::update_routing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRouting {
    pub artifact_type: ArtifactType,
    pub primary_model_id: ModelId,
    pub fallback_model_ids: Vec<ModelId>,
    pub enabled: bool,
}

impl ModelRouting {
    pub fn new(artifact_type: ArtifactType, primary: ModelId, fallbacks: Vec<ModelId>) -> Self {
        Self {
            artifact_type,
            primary_model_id: primary,
            fallback_model_ids: fallbacks,
            enabled: true,
        }
    }

    /// `true` iff the primary does not also appear among the fallbacks.
    pub fn is_consistent(&self) -> bool {
        !self.fallback_model_ids.contains(&self.primary_model_id)
    }

    /// Ordered, deduplicated `[primary, ...fallbacks]`.
    pub fn ordered_candidates(&self) -> Vec<ModelId> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(1 + self.fallback_model_ids.len());
        for id in std::iter::once(self.primary_model_id.clone())
            .chain(self.fallback_model_ids.iter().cloned())
        {
            if seen.insert(id.clone()) {
                out.push(id);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_bare_name_uses_default_provider() {
        let id = ModelId::normalize("llama3", Provider::Ollama);
        assert_eq!(id, ModelId::new(Provider::Ollama, "llama3"));
    }

    #[test]
    fn normalize_qualified_cloud_id_is_preserved() {
        let id = ModelId::normalize("anthropic:claude-3-5-sonnet", Provider::Ollama);
        assert_eq!(id.provider, Provider::Anthropic);
        assert_eq!(id.name, "claude-3-5-sonnet");
    }

    #[test]
    fn normalize_unknown_namespace_falls_back_to_ollama_tag() {
        // "foo" is not a known provider, so the whole string is an Ollama tag.
        let id = ModelId::normalize("foo:bar", Provider::Ollama);
        assert_eq!(id.provider, Provider::Ollama);
        assert_eq!(id.name, "foo:bar");
    }

    #[test]
    fn normalize_ollama_tag_with_colon_is_unambiguous() {
        // "llama3" is not a provider name, so the whole string is the Ollama tag.
        let id = ModelId::normalize("llama3:8b", Provider::Ollama);
        assert_eq!(id.provider, Provider::Ollama);
        assert_eq!(id.name, "llama3:8b");
    }

    #[test]
    fn routing_consistency_detects_overlap() {
        let primary = ModelId::new(Provider::Ollama, "llama3");
        let routing = ModelRouting::new(
            ArtifactType::MermaidErd,
            primary.clone(),
            vec![primary],
        );
        assert!(!routing.is_consistent());
    }

    #[test]
    fn ordered_candidates_dedupe() {
        let primary = ModelId::new(Provider::Ollama, "llama3");
        let fallback = ModelId::new(Provider::Ollama, "mistral");
        let routing = ModelRouting::new(
            ArtifactType::MermaidErd,
            primary.clone(),
            vec![fallback.clone(), fallback.clone()],
        );
        assert_eq!(routing.ordered_candidates(), vec![primary, fallback]);
    }
}
