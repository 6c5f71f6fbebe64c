use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forge_core::{ArtifactType, ForgeError, Result};
use forge_finetune::FineTunePoolEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Preparing,
    Training,
    Completed,
    Failed,
    Cancelled,
}

/// One fine-tuning job, embedding the training examples it was scheduled
/// with: each job file holds `TrainingJob` plus an embedded
/// `training_examples` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id: Uuid,
    pub artifact_type: ArtifactType,
    pub base_model: String,
    pub use_huggingface: bool,
    pub status: JobStatus,
    pub training_examples: Vec<FineTunePoolEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
    pub error_traceback: Option<String>,
    pub fine_tuned_model_name: Option<String>,
    #[serde(default)]
    pub cancel_requested: bool,
}

impl TrainingJob {
    pub fn new(
        artifact_type: ArtifactType,
        base_model: impl Into<String>,
        use_huggingface: bool,
        training_examples: Vec<FineTunePoolEntry>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            artifact_type,
            base_model: base_model.into(),
            use_huggingface,
            status: JobStatus::Queued,
            training_examples,
            created_at: now,
            updated_at: now,
            error: None,
            error_traceback: None,
            fine_tuned_model_name: None,
            cancel_requested: false,
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, traceback: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.error_traceback = Some(traceback.into());
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, fine_tuned_model_name: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.fine_tuned_model_name = Some(fine_tuned_model_name.into());
        self.updated_at = Utc::now();
    }

    /// Valid from `queued|preparing|training`.
    pub fn request_cancel(&mut self) -> Result<()> {
        match self.status {
            JobStatus::Queued | JobStatus::Preparing | JobStatus::Training => {
                self.cancel_requested = true;
                Ok(())
            }
            other => Err(ForgeError::InvalidOperation(format!(
                "cannot cancel a job in status {other:?}"
            ))),
        }
    }
}

/// One job file per `TrainingJob`, persisted under `jobs_dir` and replaced
/// atomically (write-to-temp + rename) on every status transition.
pub struct JobStore {
    jobs_dir: PathBuf,
}

impl JobStore {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Result<Self> {
        let jobs_dir = jobs_dir.into();
        fs::create_dir_all(&jobs_dir)?;
        Ok(Self { jobs_dir })
    }

    fn job_path(&self, id: &Uuid) -> PathBuf {
        self.jobs_dir.join(format!("{id}.json"))
    }

    pub fn submit(&self, job: &TrainingJob) -> Result<()> {
        self.save(job)
    }

    pub fn save(&self, job: &TrainingJob) -> Result<()> {
        let path = self.job_path(&job.id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(job)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Jobs still in `queued` status, oldest first, read fresh from disk
    /// each call: a batch consumes exactly the examples present in the pool
    /// at the moment the worker opens the job.
    pub fn queued_jobs(&self) -> Result<Vec<TrainingJob>> {
        let mut jobs = Vec::new();
        let Ok(dir) = fs::read_dir(&self.jobs_dir) else {
            return Ok(jobs);
        };
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let job: TrainingJob = serde_json::from_str(&content)?;
            if job.status == JobStatus::Queued {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    pub fn load(&self, id: &Uuid) -> Result<TrainingJob> {
        let path = self.job_path(id);
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All jobs regardless of status, newest first. Backs the `list_jobs`
    /// surface.
    pub fn list_all(&self) -> Result<Vec<TrainingJob>> {
        let mut jobs = Vec::new();
        let Ok(dir) = fs::read_dir(&self.jobs_dir) else {
            return Ok(jobs);
        };
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let job: TrainingJob = serde_json::from_str(&content)?;
            jobs.push(job);
        }
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        Ok(jobs)
    }
}

pub fn error_log_path(jobs_dir: &Path, job_id: &Uuid) -> PathBuf {
    jobs_dir.join("errors").join(format!("{job_id}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;
    use tempfile::tempdir;

    #[test]
    fn queued_jobs_come_back_oldest_first() {
        let dir = tempdir().unwrap();
        let store = JobStore::new(dir.path()).unwrap();
        let older = TrainingJob::new(ArtifactType::MermaidErd, "llama3", false, vec![]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer = TrainingJob::new(ArtifactType::MermaidErd, "llama3", false, vec![]);
        store.submit(&newer).unwrap();
        store.submit(&older).unwrap();

        let jobs = store.queued_jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, older.id);
        assert_eq!(jobs[1].id, newer.id);
    }

    #[test]
    fn cancel_rejected_once_completed() {
        let mut job = TrainingJob::new(ArtifactType::MermaidErd, "llama3", false, vec![]);
        job.mark_completed("model-name");
        assert!(job.request_cancel().is_err());
    }

    #[test]
    fn cancel_allowed_while_queued() {
        let mut job = TrainingJob::new(ArtifactType::MermaidErd, "llama3", false, vec![]);
        assert!(job.request_cancel().is_ok());
        assert!(job.cancel_requested);
    }
}
