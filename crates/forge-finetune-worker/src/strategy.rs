use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_core::{ForgeError, Result};

use crate::job::TrainingJob;

/// Shared between the worker loop and a running strategy; checked between
/// epochs/steps so a job can be cancelled cleanly.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            return Err(ForgeError::InvalidOperation("training cancelled".into()));
        }
        Ok(())
    }
}

/// The name and capability set of a model produced by a successful training
/// run, enough for the worker to register it in the model registry.
pub struct TrainedModel {
    pub model_name: String,
    pub is_fine_tuned: bool,
}

/// One training backend. `ollama_strategy` and `huggingface_strategy`
/// implement this for the Ollama and HuggingFace training paths; the worker picks
/// one per job based on `TrainingJob::use_huggingface`.
pub trait TrainingStrategy {
    fn train(&self, job: &TrainingJob, dataset_path: &Path, cancel: &CancelFlag) -> Result<TrainedModel>;
}
