use std::fs;
use std::path::Path;
use std::process::Command;

use forge_core::{ForgeError, Result};

use crate::job::TrainingJob;
use crate::strategy::{CancelFlag, TrainedModel, TrainingStrategy};

const TOP_K_EXAMPLES: usize = 8;

/// CPU-friendly default path: bakes the top-K training examples into a
/// Modelfile system message and asks Ollama to build a derived model from
/// it, rather than running gradient-based training.
pub struct OllamaModelfileStrategy {
    ollama_binary: String,
}

impl OllamaModelfileStrategy {
    pub fn new() -> Self {
        Self {
            ollama_binary: "ollama".to_string(),
        }
    }

    fn model_name(&self, job: &TrainingJob) -> String {
        let sanitized_base = sanitize(&job.base_model);
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        format!("{}_{}_ft_{}", job.artifact_type.value(), sanitized_base, timestamp)
    }

    fn write_modelfile(&self, job: &TrainingJob, path: &Path) -> Result<()> {
        let mut system_prompt = format!(
            "You generate {} artifacts. Study these accepted examples and match their style and structure:\n\n",
            job.artifact_type.pretty_name()
        );
        for (i, example) in job.training_examples.iter().take(TOP_K_EXAMPLES).enumerate() {
            system_prompt.push_str(&format!(
                "### Example {}\nPrompt: {}\nResponse:\n{}\n\n",
                i + 1,
                truncate(&example.prompt, 400),
                truncate(&example.response, 1200),
            ));
        }

        let modelfile = format!(
            "FROM {}\nSYSTEM \"\"\"{}\"\"\"\nPARAMETER temperature 0.2\nPARAMETER num_ctx 8192\n",
            job.base_model, escape_triple_quotes(&system_prompt),
        );
        fs::write(path, modelfile)?;
        Ok(())
    }
}

impl Default for OllamaModelfileStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingStrategy for OllamaModelfileStrategy {
    fn train(&self, job: &TrainingJob, dataset_path: &Path, cancel: &CancelFlag) -> Result<TrainedModel> {
        cancel.check()?;

        let modelfile_path = dataset_path.with_extension("modelfile");
        self.write_modelfile(job, &modelfile_path)?;

        cancel.check()?;

        let model_name = self.model_name(job);
        let output = Command::new(&self.ollama_binary)
            .arg("create")
            .arg(&model_name)
            .arg("-f")
            .arg(&modelfile_path)
            .output()
            .map_err(|e| ForgeError::TrainingFailed(format!("failed to spawn ollama create: {e}")))?;

        if !output.status.success() {
            return Err(ForgeError::TrainingFailed(format!(
                "ollama create exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(TrainedModel {
            model_name,
            is_fine_tuned: true,
        })
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

fn escape_triple_quotes(s: &str) -> String {
    s.replace("\"\"\"", "'''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;
    use forge_finetune::ExampleSource;

    #[test]
    fn model_name_follows_spec_shape() {
        let job = crate::job::TrainingJob::new(
            ArtifactType::MermaidErd,
            "llama3:8b",
            false,
            vec![forge_finetune::FineTunePoolEntry::new(
                ArtifactType::MermaidErd,
                "p",
                "r",
                90,
                "llama3:8b",
                ExampleSource::Real,
            )],
        );
        let strategy = OllamaModelfileStrategy::new();
        let name = strategy.model_name(&job);
        assert!(name.starts_with("mermaid_erd_llama3_8b_ft_"));
    }

    #[test]
    fn sanitize_replaces_non_alphanumeric() {
        assert_eq!(sanitize("llama3:8b"), "llama3_8b");
    }
}
