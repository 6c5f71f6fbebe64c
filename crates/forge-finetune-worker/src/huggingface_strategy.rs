use std::path::Path;
use std::process::Command;

use forge_core::config_manager::FineTuneConfig;
use forge_core::{ForgeError, Result};
use serde::Serialize;

use crate::job::TrainingJob;
use crate::strategy::{CancelFlag, TrainedModel, TrainingStrategy};

const LORA_TARGET_MODULES: &[&str] = &["q_proj", "v_proj", "k_proj", "o_proj"];
const WARMUP_RATIO: f32 = 0.03;
const BATCH_SIZE: u32 = 1;
const LR_SCHEDULER: &str = "cosine";
const OPTIMIZER: &str = "paged_adamw_8bit";

#[derive(Serialize)]
struct LoraTrainingSpec<'a> {
    base_model: &'a str,
    dataset_path: String,
    output_dir: String,
    load_in_4bit: bool,
    gradient_checkpointing: bool,
    lora_rank: u32,
    lora_target_modules: &'a [&'a str],
    per_device_train_batch_size: u32,
    gradient_accumulation_steps: u32,
    warmup_ratio: f32,
    lr_scheduler_type: &'a str,
    optimizer: &'a str,
}

/// LoRA/QLoRA path selected when `use_huggingface=true` and the base model
/// is a HF repo. Shells out to an external training script so this crate
/// doesn't have to carry a CUDA/transformers dependency; the script receives
/// the full training spec as a JSON file.
pub struct HuggingFaceLoraStrategy {
    training_script: String,
    python_binary: String,
    config: FineTuneConfig,
}

impl HuggingFaceLoraStrategy {
    pub fn new(config: FineTuneConfig) -> Self {
        Self {
            training_script: "scripts/train_lora.py".to_string(),
            python_binary: "python3".to_string(),
            config,
        }
    }

    fn spec(&self, job: &TrainingJob, dataset_path: &Path) -> LoraTrainingSpec<'_> {
        LoraTrainingSpec {
            base_model: &job.base_model,
            dataset_path: dataset_path.display().to_string(),
            output_dir: format!("models/{}_{}", job.artifact_type.value(), job.id),
            load_in_4bit: true,
            gradient_checkpointing: true,
            lora_rank: self.config.hf_lora_rank,
            lora_target_modules: LORA_TARGET_MODULES,
            per_device_train_batch_size: BATCH_SIZE,
            gradient_accumulation_steps: self.config.hf_gradient_accumulation,
            warmup_ratio: WARMUP_RATIO,
            lr_scheduler_type: LR_SCHEDULER,
            optimizer: OPTIMIZER,
        }
    }
}

impl TrainingStrategy for HuggingFaceLoraStrategy {
    fn train(&self, job: &TrainingJob, dataset_path: &Path, cancel: &CancelFlag) -> Result<TrainedModel> {
        cancel.check()?;

        let spec = self.spec(job, dataset_path);
        let spec_path = dataset_path.with_extension("lora_spec.json");
        std::fs::write(&spec_path, serde_json::to_string_pretty(&spec)?)?;

        cancel.check()?;

        let output = Command::new(&self.python_binary)
            .arg(&self.training_script)
            .arg("--spec")
            .arg(&spec_path)
            .output()
            .map_err(|e| ForgeError::TrainingFailed(format!("failed to spawn LoRA trainer: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("out of memory") || stderr.to_lowercase().contains("cuda oom") {
                return Err(ForgeError::Oom(format!(
                    "LoRA training for {} ran out of GPU memory; consider a smaller base model or reducing gradient_accumulation_steps: {stderr}",
                    job.artifact_type.value()
                )));
            }
            return Err(ForgeError::TrainingFailed(format!(
                "LoRA trainer exited with {}: {stderr}",
                output.status
            )));
        }

        Ok(TrainedModel {
            model_name: format!("{}-lora", spec.output_dir),
            is_fine_tuned: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;

    #[test]
    fn spec_carries_required_lora_hyperparameters() {
        let config = FineTuneConfig {
            pool_min_score: 85,
            incremental_batch_threshold: 50,
            check_interval_s: 60,
            hf_training_enabled: true,
            hf_lora_rank: 16,
            hf_gradient_accumulation: 8,
            real_graduation_count: 200,
            bootstrap_floor: 20,
        };
        let strategy = HuggingFaceLoraStrategy::new(config);
        let job = crate::job::TrainingJob::new(ArtifactType::MermaidErd, "meta-llama/Llama-3-8B", true, vec![]);
        let spec = strategy.spec(&job, Path::new("/tmp/dataset.jsonl"));

        assert_eq!(spec.lora_rank, 16);
        assert_eq!(spec.gradient_accumulation_steps, 8);
        assert_eq!(spec.lora_target_modules, LORA_TARGET_MODULES);
        assert!(spec.load_in_4bit);
        assert!(spec.gradient_checkpointing);
    }
}
