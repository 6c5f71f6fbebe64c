use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use forge_core::config_manager::FineTuneConfig;
use forge_core::{ArtifactType, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::types::{ExampleSource, FineTunePoolEntry, SourceBreakdown};

/// A schedule-or-skip decision returned by [`FineTunePool::add_example`] so
/// the caller (the orchestrator) knows whether to kick the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    Scheduled,
    AlreadyLocked,
    BelowThreshold,
}

/// Lock/marker re-schedule guard windows.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(2 * 60 * 60);
const LAST_TRAINED_SUPPRESS_FOR: Duration = Duration::from_secs(60 * 60);

/// One file per artifact type under `base_dir`, plus a lock file and a
/// last-trained marker per type under `base_dir/locks`, guarding against
/// scheduling the same training job twice.
pub struct FineTunePool {
    base_dir: PathBuf,
    config: FineTuneConfig,
    entries: RwLock<HashMap<String, Vec<FineTunePoolEntry>>>,
}

impl FineTunePool {
    pub fn new(base_dir: impl Into<PathBuf>, config: FineTuneConfig) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join("locks"))?;

        let pool = Self {
            base_dir,
            config,
            entries: RwLock::new(HashMap::new()),
        };
        pool.load_all()?;
        Ok(pool)
    }

    fn pool_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.base_dir.join("locks").join(format!("{key}.lock"))
    }

    fn last_trained_path(&self, key: &str) -> PathBuf {
        self.base_dir.join("locks").join(format!("{key}.last_trained"))
    }

    fn load_all(&self) -> Result<()> {
        let mut entries = self.entries.write();
        let Ok(dir) = fs::read_dir(&self.base_dir) else {
            return Ok(());
        };
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)?;
            let parsed: Vec<FineTunePoolEntry> = serde_json::from_str(&content)?;
            entries.insert(stem.to_string(), parsed);
        }
        Ok(())
    }

    fn persist_key(&self, key: &str, rows: &[FineTunePoolEntry]) -> Result<()> {
        let path = self.pool_path(key);
        let tmp = path.with_extension("json.tmp");
        let serialized = serde_json::to_string_pretty(rows)?;
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Reject entries scoring below `pool_min_score`. Otherwise append and,
    /// once the pool reaches `incremental_batch_threshold`, attempt to
    /// schedule a training job (idempotent per the lock/marker guards).
    pub fn add_example(
        &self,
        artifact_type: ArtifactType,
        prompt: impl Into<String>,
        response: impl Into<String>,
        score: u8,
        base_model: impl Into<String>,
        source: ExampleSource,
    ) -> Result<ScheduleDecision> {
        if score < self.config.pool_min_score {
            return Ok(ScheduleDecision::BelowThreshold);
        }

        let key = artifact_type.value();
        let entry = FineTunePoolEntry::new(artifact_type, prompt, response, score, base_model, source);

        let len = {
            let mut entries = self.entries.write();
            let rows = entries.entry(key.clone()).or_default();
            rows.push(entry);
            let len = rows.len();
            self.persist_key(&key, rows)?;
            len
        };

        if len >= self.config.incremental_batch_threshold {
            return self.try_schedule(&key);
        }
        Ok(ScheduleDecision::BelowThreshold)
    }

    fn try_schedule(&self, key: &str) -> Result<ScheduleDecision> {
        let lock_path = self.lock_path(key);
        let last_trained_path = self.last_trained_path(key);

        if let Ok(meta) = fs::metadata(&last_trained_path) {
            if let Ok(modified) = meta.modified() {
                if elapsed_since(modified) < LAST_TRAINED_SUPPRESS_FOR {
                    return Ok(ScheduleDecision::AlreadyLocked);
                }
            }
        }

        if let Ok(meta) = fs::metadata(&lock_path) {
            if let Ok(modified) = meta.modified() {
                if elapsed_since(modified) < LOCK_STALE_AFTER {
                    return Ok(ScheduleDecision::AlreadyLocked);
                }
                warn!(key, "reclaiming stale fine-tune lock");
            }
        }

        fs::write(&lock_path, now_rfc3339())?;
        info!(key, "fine-tune batch threshold reached, scheduling training job");
        Ok(ScheduleDecision::Scheduled)
    }

    /// `{real, synthetic, total, synthetic_pct, ready_for_training,
    /// ready_for_graduation, needs_bootstrap}` for one artifact type.
    pub fn get_source_breakdown(&self, artifact_type: &ArtifactType) -> SourceBreakdown {
        let key = artifact_type.value();
        let entries = self.entries.read();
        let rows = entries.get(&key).map(|v| v.as_slice()).unwrap_or(&[]);

        let real = rows.iter().filter(|e| e.source == ExampleSource::Real).count();
        let synthetic = rows.len() - real;
        let total = rows.len();
        let synthetic_pct = if total == 0 {
            0
        } else {
            ((synthetic * 100) / total) as u8
        };

        SourceBreakdown {
            real,
            synthetic,
            total,
            synthetic_pct,
            ready_for_training: total >= self.config.incremental_batch_threshold,
            ready_for_graduation: real >= self.config.real_graduation_count,
            needs_bootstrap: total < self.config.bootstrap_floor,
        }
    }

    /// Deletes synthetic-sourced entries for `artifact_type`; returns the
    /// number removed.
    pub fn remove_synthetic(&self, artifact_type: &ArtifactType) -> Result<usize> {
        let key = artifact_type.value();
        let mut entries = self.entries.write();
        let rows = entries.entry(key.clone()).or_default();
        let before = rows.len();
        rows.retain(|e| e.source != ExampleSource::Synthetic);
        let removed = before - rows.len();
        if removed > 0 {
            self.persist_key(&key, rows)?;
        }
        Ok(removed)
    }

    /// Invoked by the fine-tuning worker after a successful training run:
    /// empties the pool and records the last-trained marker so a fresh
    /// batch of the same size doesn't immediately re-schedule.
    pub fn clear_pool(&self, artifact_type: &ArtifactType) -> Result<()> {
        let key = artifact_type.value();
        {
            let mut entries = self.entries.write();
            entries.insert(key.clone(), Vec::new());
            self.persist_key(&key, &[])?;
        }
        fs::write(self.last_trained_path(&key), now_rfc3339())?;
        let _ = fs::remove_file(self.lock_path(&key));
        Ok(())
    }

    pub fn entries_for(&self, artifact_type: &ArtifactType) -> Vec<FineTunePoolEntry> {
        self.entries
            .read()
            .get(&artifact_type.value())
            .cloned()
            .unwrap_or_default()
    }
}

fn elapsed_since(t: SystemTime) -> Duration {
    SystemTime::now().duration_since(t).unwrap_or(Duration::ZERO)
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;
    use tempfile::tempdir;

    fn config() -> FineTuneConfig {
        FineTuneConfig {
            pool_min_score: 85,
            incremental_batch_threshold: 3,
            check_interval_s: 60,
            hf_training_enabled: false,
            hf_lora_rank: 16,
            hf_gradient_accumulation: 8,
            real_graduation_count: 5,
            bootstrap_floor: 2,
        }
    }

    #[test]
    fn rejects_entries_below_threshold() {
        let dir = tempdir().unwrap();
        let pool = FineTunePool::new(dir.path(), config()).unwrap();
        let decision = pool
            .add_example(ArtifactType::MermaidErd, "p", "r", 70, "llama3", ExampleSource::Real)
            .unwrap();
        assert_eq!(decision, ScheduleDecision::BelowThreshold);
        assert_eq!(pool.get_source_breakdown(&ArtifactType::MermaidErd).total, 0);
    }

    #[test]
    fn schedules_once_threshold_reached_then_suppresses_reschedule() {
        let dir = tempdir().unwrap();
        let pool = FineTunePool::new(dir.path(), config()).unwrap();
        let t = ArtifactType::MermaidErd;

        pool.add_example(t.clone(), "p1", "r1", 90, "llama3", ExampleSource::Real).unwrap();
        pool.add_example(t.clone(), "p2", "r2", 90, "llama3", ExampleSource::Real).unwrap();
        let decision = pool
            .add_example(t.clone(), "p3", "r3", 90, "llama3", ExampleSource::Real)
            .unwrap();
        assert_eq!(decision, ScheduleDecision::Scheduled);

        let decision2 = pool
            .add_example(t.clone(), "p4", "r4", 90, "llama3", ExampleSource::Real)
            .unwrap();
        assert_eq!(decision2, ScheduleDecision::AlreadyLocked);
    }

    #[test]
    fn clear_pool_empties_and_unlocks() {
        let dir = tempdir().unwrap();
        let pool = FineTunePool::new(dir.path(), config()).unwrap();
        let t = ArtifactType::MermaidErd;
        pool.add_example(t.clone(), "p", "r", 90, "llama3", ExampleSource::Real).unwrap();

        pool.clear_pool(&t).unwrap();
        assert_eq!(pool.get_source_breakdown(&t).total, 0);
    }

    #[test]
    fn source_breakdown_counts_real_and_synthetic() {
        let dir = tempdir().unwrap();
        let pool = FineTunePool::new(dir.path(), config()).unwrap();
        let t = ArtifactType::MermaidErd;
        pool.add_example(t.clone(), "p1", "r1", 90, "llama3", ExampleSource::Real).unwrap();
        pool.add_example(t.clone(), "p2", "r2", 90, "llama3", ExampleSource::Synthetic).unwrap();

        let breakdown = pool.get_source_breakdown(&t);
        assert_eq!(breakdown.real, 1);
        assert_eq!(breakdown.synthetic, 1);
        assert_eq!(breakdown.total, 2);
        assert_eq!(breakdown.synthetic_pct, 50);
        assert!(breakdown.needs_bootstrap);
    }

    #[test]
    fn remove_synthetic_deletes_only_synthetic_entries() {
        let dir = tempdir().unwrap();
        let pool = FineTunePool::new(dir.path(), config()).unwrap();
        let t = ArtifactType::MermaidErd;
        pool.add_example(t.clone(), "p1", "r1", 90, "llama3", ExampleSource::Real).unwrap();
        pool.add_example(t.clone(), "p2", "r2", 90, "llama3", ExampleSource::Synthetic).unwrap();

        let removed = pool.remove_synthetic(&t).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(pool.get_source_breakdown(&t).total, 1);
    }

    #[test]
    fn reloads_persisted_pool_from_disk() {
        let dir = tempdir().unwrap();
        let t = ArtifactType::MermaidErd;
        {
            let pool = FineTunePool::new(dir.path(), config()).unwrap();
            pool.add_example(t.clone(), "p1", "r1", 90, "llama3", ExampleSource::Real).unwrap();
        }
        let reloaded = FineTunePool::new(dir.path(), config()).unwrap();
        assert_eq!(reloaded.get_source_breakdown(&t).total, 1);
    }
}
