use std::sync::Arc;
use std::time::Duration;

use forge_core::config_manager::AppConfig;
use forge_core::{ArtifactType, ForgeError, ModelId, ModelInfo, ModelRouting, ModelStatus, Result};
use forge_providers::LLMProviderFactory;
use tokio::task::JoinSet;

use crate::store::RegistryStore;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Wraps [`RegistryStore`] with the router operations: availability probing,
/// routing updates that preserve the primary/fallback-disjointness
/// invariant, and promotion of a model that keeps succeeding to the primary
/// slot.
pub struct ModelRouter {
    store: RegistryStore,
    config: Arc<AppConfig>,
}

impl ModelRouter {
    pub fn new(store: RegistryStore, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// Probe every known model's provider for availability and persist the
    /// resulting status. Cloud providers without a configured key are marked
    /// `NoApiKey` without a network call; cloud providers with a key are
    /// trusted present rather than charged for a live ping. Local providers
    /// (Ollama, HuggingFace) are probed concurrently, each bounded to
    /// [`PROBE_TIMEOUT`] so one unreachable daemon can't stall the refresh.
    pub async fn probe_all(&self) -> Result<()> {
        let infos = self.store.list_models();
        let mut set = JoinSet::new();
        for info in infos {
            let config = Arc::clone(&self.config);
            set.spawn(async move {
                let status = Self::probe_one(&info.id, &config).await;
                (info, status)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (mut info, status) = joined.map_err(|e| ForgeError::InvalidOperation(e.to_string()))?;
            info.status = status;
            self.store.upsert_model(info)?;
        }
        Ok(())
    }

    async fn probe_one(id: &ModelId, config: &AppConfig) -> ModelStatus {
        if id.provider.is_cloud() {
            return if config.credentials.has_key(id.provider) {
                ModelStatus::Available
            } else {
                ModelStatus::NoApiKey
            };
        }
        match LLMProviderFactory::build(id, config) {
            Ok(provider) => match tokio::time::timeout(PROBE_TIMEOUT, provider.is_available()).await {
                Ok(true) => ModelStatus::Available,
                Ok(false) | Err(_) => ModelStatus::Error,
            },
            Err(_) => ModelStatus::Error,
        }
    }

    pub fn register_model(&self, info: ModelInfo) -> Result<()> {
        self.store.upsert_model(info)
    }

    pub fn routing_for(&self, artifact_type: &ArtifactType) -> Option<ModelRouting> {
        self.store.routing(artifact_type)
    }

    /// Replace the routing for an artifact type. Rejected if the update
    /// would let the primary model also appear among the fallbacks.
    pub fn update_routing(&self, routing: ModelRouting) -> Result<()> {
        if !routing.is_consistent() {
            return Err(ForgeError::RoutingConflict(format!(
                "primary model {} also present in fallbacks for {}",
                routing.primary_model_id,
                routing.artifact_type.value()
            )));
        }
        self.store.set_routing(routing)
    }

    /// Move `model_id` to the primary slot for `artifact_type`, demoting the
    /// previous primary to the front of the fallback list. No-op if
    /// `model_id` is already primary.
    pub fn promote(&self, artifact_type: &ArtifactType, model_id: &ModelId) -> Result<()> {
        let mut routing = self.store.routing(artifact_type).ok_or_else(|| {
            ForgeError::NotFound(format!("no routing for {}", artifact_type.value()))
        })?;

        if &routing.primary_model_id == model_id {
            return Ok(());
        }

        let previous_primary = routing.primary_model_id.clone();
        routing.fallback_model_ids.retain(|id| id != model_id);
        routing.fallback_model_ids.insert(0, previous_primary);
        routing.primary_model_id = model_id.clone();

        self.update_routing(routing)
    }

    /// Ordered candidate list for an artifact type, honoring the
    /// preferred-cloud short-circuit: when the primary is a cloud model that
    /// last probed `Available`, skip the fallback chain entirely and try only
    /// the primary, since a known-good cloud model is assumed to outperform
    /// probing every local fallback first.
    pub fn candidates_for(&self, artifact_type: &ArtifactType) -> Result<Vec<ModelId>> {
        let routing = self.store.routing(artifact_type).ok_or_else(|| {
            ForgeError::NoModelsAvailable(artifact_type.value())
        })?;

        if !routing.enabled {
            return Err(ForgeError::NoModelsAvailable(artifact_type.value()));
        }

        let primary_info = self.store.model(&routing.primary_model_id);
        let primary_is_preferred_cloud = primary_info
            .as_ref()
            .is_some_and(|i| i.provider.is_cloud() && i.status == ModelStatus::Available);

        if primary_is_preferred_cloud {
            return Ok(vec![routing.primary_model_id]);
        }

        Ok(routing.ordered_candidates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::Provider;

    fn router() -> ModelRouter {
        ModelRouter::new(RegistryStore::new(), Arc::new(AppConfig::default()))
    }

    #[test]
    fn update_routing_rejects_primary_in_fallbacks() {
        let router = router();
        let primary = ModelId::new(Provider::Ollama, "llama3");
        let routing = ModelRouting::new(ArtifactType::MermaidErd, primary.clone(), vec![primary]);
        assert!(router.update_routing(routing).is_err());
    }

    #[test]
    fn promote_moves_model_to_primary_and_keeps_consistency() {
        let router = router();
        let primary = ModelId::new(Provider::Ollama, "llama3");
        let fallback = ModelId::new(Provider::Ollama, "mistral");
        let routing = ModelRouting::new(
            ArtifactType::MermaidErd,
            primary.clone(),
            vec![fallback.clone()],
        );
        router.update_routing(routing).unwrap();

        router.promote(&ArtifactType::MermaidErd, &fallback).unwrap();

        let updated = router.routing_for(&ArtifactType::MermaidErd).unwrap();
        assert_eq!(updated.primary_model_id, fallback);
        assert!(updated.is_consistent());
        assert_eq!(updated.fallback_model_ids, vec![primary]);
    }

    #[test]
    fn candidates_for_missing_routing_errors() {
        let router = router();
        assert!(router.candidates_for(&ArtifactType::MermaidErd).is_err());
    }

    #[test]
    fn preferred_cloud_primary_short_circuits_fallbacks() {
        let router = router();
        let primary = ModelId::new(Provider::Anthropic, "claude-3-5-sonnet-20241022");
        let fallback = ModelId::new(Provider::Ollama, "llama3");
        let routing = ModelRouting::new(
            ArtifactType::MermaidErd,
            primary.clone(),
            vec![fallback],
        );
        router.update_routing(routing).unwrap();

        let mut info = ModelInfo::new(primary.clone(), "Claude 3.5 Sonnet");
        info.status = ModelStatus::Available;
        router.register_model(info).unwrap();

        let candidates = router.candidates_for(&ArtifactType::MermaidErd).unwrap();
        assert_eq!(candidates, vec![primary]);
    }
}
