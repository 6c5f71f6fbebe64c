use std::collections::HashMap;
use std::path::{Path, PathBuf};

use forge_core::{ArtifactType, ModelId, ModelInfo, ModelRouting, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistrySnapshot {
    models: HashMap<String, ModelInfo>,
    routings: HashMap<String, ModelRouting>,
}

/// Persisted registry state: known models keyed by `ModelId::as_str()`, and
/// the current routing per artifact type, keyed by `ArtifactType::value()`.
pub struct RegistryStore {
    models: RwLock<HashMap<String, ModelInfo>>,
    routings: RwLock<HashMap<String, ModelRouting>>,
    path: Option<PathBuf>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            routings: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                models: RwLock::new(HashMap::new()),
                routings: RwLock::new(HashMap::new()),
                path: Some(path),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&content)?;
        Ok(Self {
            models: RwLock::new(snapshot.models),
            routings: RwLock::new(snapshot.routings),
            path: Some(path),
        })
    }

    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let snapshot = RegistrySnapshot {
            models: self.models.read().clone(),
            routings: self.routings.read().clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn upsert_model(&self, info: ModelInfo) -> Result<()> {
        self.models.write().insert(info.id.as_str(), info);
        self.persist()
    }

    pub fn model(&self, id: &ModelId) -> Option<ModelInfo> {
        self.models.read().get(&id.as_str()).cloned()
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.models.read().values().cloned().collect()
    }

    pub fn routing(&self, artifact_type: &ArtifactType) -> Option<ModelRouting> {
        self.routings.read().get(&artifact_type.value()).cloned()
    }

    pub fn set_routing(&self, routing: ModelRouting) -> Result<()> {
        self.routings
            .write()
            .insert(routing.artifact_type.value(), routing);
        self.persist()
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}
