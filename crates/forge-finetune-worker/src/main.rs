use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use forge_core::ConfigManager;
use forge_finetune::FineTunePool;
use forge_finetune_worker::{CancelFlag, FineTuneWorker};
use forge_registry::{ModelRouter, RegistryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let manager = ConfigManager::load()?;
    let config = Arc::new(manager.config().clone());

    let data_dir = PathBuf::from(".forge");
    let pool = Arc::new(FineTunePool::new(data_dir.join("pools"), config.finetune.clone())?);
    let store = RegistryStore::load(data_dir.join("registry.json"))?;
    let router = Arc::new(ModelRouter::new(store, config.clone()));

    let poll_interval = Duration::from_secs(config.finetune.check_interval_s);
    let worker = FineTuneWorker::new(data_dir.join("jobs"), pool, router, config.finetune.clone())?
        .with_poll_interval(poll_interval);

    tracing::info!(poll_interval_s = poll_interval.as_secs(), "fine-tune worker starting");
    worker.run(CancelFlag::new()).await?;
    Ok(())
}
