use std::path::PathBuf;
use std::sync::Arc;

use forge_core::config_manager::AppConfig;
use forge_core::{ArtifactTypeRegistry, ConfigManager, CustomTypeDefinition, Result};
use forge_context::ContextBuilder;
use forge_finetune::FineTunePool;
use forge_finetune_worker::JobStore;
use forge_graph::ArtifactGraph;
use forge_orchestrator::{GenerationOrchestrator, SprintPackageGenerator};
use forge_registry::{ModelRouter, RegistryStore};

/// Composition root wiring every service the CLI dispatches into, loaded
/// once per invocation. No module-level mutable state: every service is an
/// explicit field here, constructed from one shared `AppConfig`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub artifact_registry: Arc<ArtifactTypeRegistry>,
    pub router: Arc<ModelRouter>,
    pub pool: Arc<FineTunePool>,
    pub graph: Arc<ArtifactGraph>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub sprint: Arc<SprintPackageGenerator>,
    pub job_store: Arc<JobStore>,
    pub custom_types_path: PathBuf,
}

impl AppState {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let manager = ConfigManager::load().map_err(|e| {
            forge_core::ForgeError::Configuration(e.to_string())
        })?;
        let config = Arc::new(manager.config().clone());

        let artifact_registry = Arc::new(ArtifactTypeRegistry::new());
        let custom_types_path = data_dir.join("custom_types.json");
        if let Ok(content) = std::fs::read_to_string(&custom_types_path) {
            if let Ok(defs) = serde_json::from_str::<Vec<CustomTypeDefinition>>(&content) {
                artifact_registry.load_custom_types(defs);
            }
        }

        let store = RegistryStore::load(data_dir.join("registry.json"))?;
        let router = Arc::new(ModelRouter::new(store, config.clone()));

        let pool = Arc::new(FineTunePool::new(data_dir.join("pools"), config.finetune.clone())?);
        let graph = Arc::new(ArtifactGraph::load(data_dir.join("graph.json"))?);

        let context_builder = Arc::new(ContextBuilder::new(config.context.clone()));

        let orchestrator = Arc::new(
            GenerationOrchestrator::new(
                context_builder,
                router.clone(),
                artifact_registry.clone(),
                pool.clone(),
                config.clone(),
            )
            .with_graph(graph.clone()),
        );

        let sprint = Arc::new(SprintPackageGenerator::new(orchestrator.clone(), graph.clone()));

        let job_store = Arc::new(JobStore::new(data_dir.join("jobs"))?);

        Ok(Self {
            config,
            artifact_registry,
            router,
            pool,
            graph,
            orchestrator,
            sprint,
            job_store,
            custom_types_path,
        })
    }

    /// Persist a newly registered custom artifact type so subsequent CLI
    /// invocations pick it up on startup.
    pub fn persist_custom_types(&self) -> Result<()> {
        let defs = self.artifact_registry.list_custom();
        let content = serde_json::to_string_pretty(&defs)?;
        let tmp = self.custom_types_path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.custom_types_path)?;
        Ok(())
    }
}
