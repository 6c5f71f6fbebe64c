use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use forge_core::config_manager::FineTuneConfig;
use forge_core::{ForgeError, ModelId, ModelInfo, ModelRouting, ModelStatus, Provider, Result};
use forge_finetune::FineTunePool;
use forge_registry::ModelRouter;
use tracing::{error, info, warn};

use crate::dataset::{dataset_path, validate_dataset_file, write_jsonl};
use crate::huggingface_strategy::HuggingFaceLoraStrategy;
use crate::job::{error_log_path, JobStatus, JobStore, TrainingJob};
use crate::ollama_strategy::OllamaModelfileStrategy;
use crate::strategy::{CancelFlag, TrainingStrategy};

/// Background worker that polls `jobs_dir` at `poll_interval`, running as a
/// separate OS process. All cross-process state is JSON files replaced
/// atomically; this struct holds no state the request-serving process needs
/// to know about beyond what's on disk.
pub struct FineTuneWorker {
    job_store: JobStore,
    jobs_dir: PathBuf,
    pool: Arc<FineTunePool>,
    router: Arc<ModelRouter>,
    finetune_config: FineTuneConfig,
    poll_interval: Duration,
}

impl FineTuneWorker {
    pub fn new(
        jobs_dir: impl Into<PathBuf>,
        pool: Arc<FineTunePool>,
        router: Arc<ModelRouter>,
        finetune_config: FineTuneConfig,
    ) -> Result<Self> {
        let jobs_dir = jobs_dir.into();
        let job_store = JobStore::new(&jobs_dir)?;
        Ok(Self {
            job_store,
            jobs_dir,
            pool,
            router,
            finetune_config,
            poll_interval: Duration::from_secs(60),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs until `cancel` is set, polling once per `poll_interval`.
    pub async fn run(&self, cancel: CancelFlag) -> Result<()> {
        loop {
            if let Err(e) = self.poll_once(&cancel) {
                error!(error = %e, "fine-tune worker poll failed");
            }
            if cancel.is_set() {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Processes every queued job currently on disk once. Returns the number
    /// of jobs processed (completed, failed, or cancelled).
    pub fn poll_once(&self, cancel: &CancelFlag) -> Result<usize> {
        let queued = self.job_store.queued_jobs()?;
        let mut processed = 0;
        for job in queued {
            if cancel.is_set() {
                break;
            }
            self.process_job(job, cancel)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn process_job(&self, mut job: TrainingJob, cancel: &CancelFlag) -> Result<()> {
        if job.training_examples.len() < self.finetune_config.incremental_batch_threshold {
            warn!(
                artifact_type = %job.artifact_type.value(),
                "job has fewer examples than the batch threshold, skipping for now"
            );
            return Ok(());
        }

        job.status = JobStatus::Preparing;
        self.job_store.save(&job)?;

        let data_path = dataset_path(&self.jobs_dir, &job.id);
        if let Err(e) = write_jsonl(&job.training_examples, &data_path) {
            return self.fail(job, e);
        }
        if let Err(e) = validate_dataset_file(&data_path) {
            return self.fail(job, e);
        }

        job.status = JobStatus::Training;
        self.job_store.save(&job)?;

        let trained = if job.use_huggingface {
            let strategy = HuggingFaceLoraStrategy::new(self.finetune_config.clone());
            strategy.train(&job, &data_path, cancel)
        } else {
            let strategy = OllamaModelfileStrategy::new();
            strategy.train(&job, &data_path, cancel)
        };

        let trained = match trained {
            Ok(t) => t,
            Err(e) => {
                if cancel.is_set() {
                    job.status = JobStatus::Cancelled;
                    job.updated_at = chrono::Utc::now();
                    self.job_store.save(&job)?;
                    return Ok(());
                }
                return self.fail(job, e);
            }
        };

        self.register_trained_model(&job, &trained.model_name)?;

        job.mark_completed(trained.model_name);
        self.job_store.save(&job)?;
        self.pool.clear_pool(&job.artifact_type)?;

        info!(
            artifact_type = %job.artifact_type.value(),
            model = %job.fine_tuned_model_name.as_deref().unwrap_or(""),
            "fine-tune job completed"
        );
        Ok(())
    }

    fn fail(&self, mut job: TrainingJob, err: ForgeError) -> Result<()> {
        let log_path = error_log_path(&self.jobs_dir, &job.id);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&log_path, format!("{err:?}"))?;

        job.mark_failed(err.to_string(), format!("{err:?}"));
        self.job_store.save(&job)?;
        error!(artifact_type = %job.artifact_type.value(), error = %job.error.as_deref().unwrap_or(""), "fine-tune job failed");
        Ok(())
    }

    /// Post-training effects: register the model, set it primary for the
    /// artifact type, demote the prior primary to the head of fallbacks.
    fn register_trained_model(&self, job: &TrainingJob, model_name: &str) -> Result<()> {
        let provider = if job.use_huggingface {
            Provider::HuggingFace
        } else {
            Provider::Ollama
        };
        let model_id = ModelId::new(provider, model_name);

        let mut info = ModelInfo::new(model_id.clone(), model_name.to_string());
        info.status = ModelStatus::Available;
        info.is_fine_tuned = true;
        info.capabilities.insert(job.artifact_type.clone());
        info.metadata = serde_json::json!({
            "base_model": job.base_model,
            "artifact_type": job.artifact_type.value(),
            "created_at": chrono::Utc::now().to_rfc3339(),
            "status": "ready",
        });
        self.router.register_model(info)?;

        let routing = match self.router.routing_for(&job.artifact_type) {
            Some(mut existing) => {
                if existing.primary_model_id != model_id {
                    existing.fallback_model_ids.retain(|id| id != &model_id);
                    existing.fallback_model_ids.insert(0, existing.primary_model_id.clone());
                    existing.primary_model_id = model_id.clone();
                }
                existing
            }
            None => ModelRouting::new(job.artifact_type.clone(), model_id, vec![]),
        };
        self.router.update_routing(routing)
    }
}
