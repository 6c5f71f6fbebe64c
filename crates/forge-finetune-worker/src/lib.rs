// ABOUTME: Background fine-tuning worker process
// ABOUTME: Polls jobs/, trains per artifact-type/base-model pair, re-routes on completion

pub mod dataset;
pub mod huggingface_strategy;
pub mod job;
pub mod ollama_strategy;
pub mod strategy;
pub mod worker;

pub use job::{JobStatus, JobStore, TrainingJob};
pub use strategy::{CancelFlag, TrainedModel, TrainingStrategy};
pub use worker::FineTuneWorker;
