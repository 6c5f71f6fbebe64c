use std::fs;
use std::path::{Path, PathBuf};

use forge_core::ForgeError;
use forge_finetune::FineTunePoolEntry;
use serde::Serialize;

#[derive(Serialize)]
struct JsonlRecord<'a> {
    prompt: &'a str,
    completion: &'a str,
}

/// Writes one `(prompt, completion)` JSON object per line, used by both
/// training paths to build their dataset file.
pub fn write_jsonl(examples: &[FineTunePoolEntry], path: &Path) -> Result<(), ForgeError> {
    let mut lines = Vec::with_capacity(examples.len());
    for example in examples {
        let record = JsonlRecord {
            prompt: &example.prompt,
            completion: &example.response,
        };
        lines.push(serde_json::to_string(&record)?);
    }
    let body = lines.join("\n");
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Dataset validation precondition required before any training starts
/// before any training starts: the file must exist, be non-empty, every line must
/// parse as JSON, and there must be at least one line.
pub fn validate_dataset_file(path: &Path) -> Result<usize, ForgeError> {
    if !path.exists() {
        return Err(ForgeError::DatasetValidationFailed(format!(
            "dataset file {} does not exist",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(ForgeError::DatasetValidationFailed(format!(
            "dataset file {} is empty",
            path.display()
        )));
    }

    let mut count = 0;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            ForgeError::DatasetValidationFailed(format!("line {} is not valid JSON: {}", i + 1, e))
        })?;
        count += 1;
    }

    if count == 0 {
        return Err(ForgeError::DatasetValidationFailed(format!(
            "dataset file {} has no parseable lines",
            path.display()
        )));
    }

    Ok(count)
}

pub fn dataset_path(job_dir: &Path, job_id: &uuid::Uuid) -> PathBuf {
    job_dir.join(format!("{job_id}.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;
    use forge_finetune::ExampleSource;
    use tempfile::tempdir;

    fn entry() -> FineTunePoolEntry {
        FineTunePoolEntry::new(
            ArtifactType::MermaidErd,
            "generate an erd",
            "erDiagram\n  A ||--o{ B : has",
            90,
            "llama3",
            ExampleSource::Real,
        )
    }

    #[test]
    fn writes_and_validates_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        write_jsonl(&[entry(), entry()], &path).unwrap();
        let count = validate_dataset_file(&path).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn missing_file_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");
        let err = validate_dataset_file(&path).unwrap_err();
        assert!(matches!(err, ForgeError::DatasetValidationFailed(_)));
    }

    #[test]
    fn empty_file_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "").unwrap();
        let err = validate_dataset_file(&path).unwrap_err();
        assert!(matches!(err, ForgeError::DatasetValidationFailed(_)));
    }

    #[test]
    fn malformed_line_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{not json}").unwrap();
        let err = validate_dataset_file(&path).unwrap_err();
        assert!(matches!(err, ForgeError::DatasetValidationFailed(_)));
    }
}
