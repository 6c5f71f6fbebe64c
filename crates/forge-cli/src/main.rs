mod state;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use forge_core::{ArtifactCategory, ArtifactType, ModelId, ModelInfo, ModelRouting, Provider};
use forge_finetune::ExampleSource;
use forge_finetune_worker::{JobStatus, TrainingJob};
use forge_graph::{static_dependencies, ArtifactNode};
use forge_orchestrator::{GenerationOptions, PackageSelection, SprintPreset};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use state::AppState;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Artifact Forge CLI - tiered multi-model artifact generation", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Data directory for registry/pool/graph/job state
    #[arg(long, global = true, env = "FORGE_DATA_DIR", default_value = ".forge")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a single artifact
    Generate {
        /// Artifact type, e.g. mermaid_erd, api_docs, or a registered custom name
        artifact_type: String,

        /// Meeting notes / requirements text
        #[arg(short, long, conflicts_with = "notes_file")]
        notes: Option<String>,

        /// Read meeting notes / requirements from a file
        #[arg(long, conflicts_with = "notes")]
        notes_file: Option<PathBuf>,

        /// Override the validation gate threshold
        #[arg(long)]
        threshold: Option<u8>,

        /// Override generation temperature
        #[arg(long)]
        temperature: Option<f32>,

        /// For code_prototype: request an `=== IMPLEMENTATION ===` / `=== TESTS ===` separated response
        #[arg(long)]
        with_tests: bool,
    },

    /// Model registry and routing
    #[command(subcommand)]
    Models(ModelsCommands),

    /// Fine-tuning pool and training jobs
    #[command(subcommand)]
    FineTune(FineTuneCommands),

    /// Artifact dependency graph
    #[command(subcommand)]
    Graph(GraphCommands),

    /// Custom artifact type registration
    #[command(subcommand)]
    CustomType(CustomTypeCommands),

    /// Routing lookups for an artifact type
    #[command(subcommand)]
    Routing(RoutingCommands),

    /// Sprint package generation
    Package {
        /// Preset name (full, backend, frontend, documentation, pm, quick)
        #[arg(long, conflicts_with = "types")]
        preset: Option<String>,

        /// Explicit ordered list of artifact types
        #[arg(long, value_delimiter = ',', conflicts_with = "preset")]
        types: Vec<String>,

        /// Meeting notes / requirements text
        #[arg(short, long, conflicts_with = "notes_file")]
        notes: Option<String>,

        /// Read meeting notes / requirements from a file
        #[arg(long, conflicts_with = "notes")]
        notes_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// List known models and their last-probed status
    List {
        /// Re-probe every provider before listing
        #[arg(long)]
        refresh: bool,
    },

    /// Register a model in the registry
    Register {
        /// Fully-qualified model id, e.g. ollama:llama3 or anthropic:claude-3-5-sonnet-20241022
        model_id: String,

        /// Display name
        #[arg(short, long)]
        name: String,
    },

    /// Promote a model to primary for an artifact type
    Promote {
        artifact_type: String,
        model_id: String,
    },
}

#[derive(Subcommand)]
enum RoutingCommands {
    Get { artifact_type: String },
}

#[derive(Subcommand)]
enum FineTuneCommands {
    /// Pool admission stats for an artifact type
    Stats { artifact_type: String },

    /// Submit a pool example manually
    Submit {
        artifact_type: String,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        response: String,
        #[arg(long)]
        score: u8,
        #[arg(long)]
        base_model: String,
        #[arg(long, value_enum, default_value = "real")]
        source: ExampleSourceArg,
    },

    /// Build and submit a training job from the current pool
    Trigger {
        artifact_type: String,
        /// Bypass the incremental_batch_threshold gate
        #[arg(long)]
        force: bool,
        #[arg(long)]
        base_model: String,
        #[arg(long)]
        use_huggingface: bool,
    },

    /// Request cancellation of a queued/training job
    Cancel { job_id: String },

    /// List training jobs, optionally filtered by status
    Jobs {
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum ExampleSourceArg {
    Real,
    Synthetic,
}

impl From<ExampleSourceArg> for ExampleSource {
    fn from(value: ExampleSourceArg) -> Self {
        match value {
            ExampleSourceArg::Real => ExampleSource::Real,
            ExampleSourceArg::Synthetic => ExampleSource::Synthetic,
        }
    }
}

#[derive(Subcommand)]
enum GraphCommands {
    /// Register an artifact in the dependency graph, auto-linking upstream types
    Register {
        id: String,
        artifact_type: String,
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long, conflicts_with = "content")]
        content_file: Option<PathBuf>,
    },

    /// Check whether an artifact is stale relative to its sources
    Staleness { id: String },

    /// List artifacts transitively impacted by a change to this one
    Impact { id: String },

    /// Print the dependency forest, or the subtree rooted at one artifact
    Tree {
        #[arg(long)]
        root: Option<String>,
    },
}

#[derive(Subcommand)]
enum CustomTypeCommands {
    /// Register a new custom artifact type
    Register {
        name: String,
        /// Prompt template; must contain {meeting_notes} and {context}
        #[arg(long)]
        template: String,
        #[arg(long, value_enum, default_value = "doc")]
        category: CategoryArg,
    },

    /// List registered custom types
    List,
}

#[derive(Clone, ValueEnum)]
enum CategoryArg {
    DiagramMermaid,
    DiagramHtml,
    Code,
    Doc,
}

impl From<CategoryArg> for ArtifactCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::DiagramMermaid => ArtifactCategory::DiagramMermaid,
            CategoryArg::DiagramHtml => ArtifactCategory::DiagramHtml,
            CategoryArg::Code => ArtifactCategory::Code,
            CategoryArg::Doc => ArtifactCategory::Doc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let state = AppState::new(cli.data_dir.clone())
        .await
        .context("failed to initialize application state")?;

    match execute_command(&cli, state).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli, state: AppState) -> Result<serde_json::Value> {
    match &cli.command {
        Commands::Generate {
            artifact_type,
            notes,
            notes_file,
            threshold,
            temperature,
            with_tests,
        } => {
            execute_generate(
                &state,
                artifact_type,
                notes.as_deref(),
                notes_file.as_deref(),
                *threshold,
                *temperature,
                *with_tests,
            )
            .await
        }
        Commands::Models(cmd) => execute_models_command(cmd, &state).await,
        Commands::FineTune(cmd) => execute_finetune_command(cmd, &state).await,
        Commands::Graph(cmd) => execute_graph_command(cmd, &state).await,
        Commands::CustomType(cmd) => execute_custom_type_command(cmd, &state).await,
        Commands::Routing(cmd) => execute_routing_command(cmd, &state).await,
        Commands::Package { preset, types, notes, notes_file } => {
            execute_package(&state, preset.as_deref(), types, notes.as_deref(), notes_file.as_deref()).await
        }
    }
}

fn load_notes(notes: Option<&str>, notes_file: Option<&std::path::Path>) -> Result<String> {
    if let Some(notes) = notes {
        return Ok(notes.to_string());
    }
    if let Some(path) = notes_file {
        return std::fs::read_to_string(path).context("failed to read notes file");
    }
    anyhow::bail!("either --notes or --notes-file is required")
}

async fn execute_generate(
    state: &AppState,
    artifact_type: &str,
    notes: Option<&str>,
    notes_file: Option<&std::path::Path>,
    threshold: Option<u8>,
    temperature: Option<f32>,
    with_tests: bool,
) -> Result<serde_json::Value> {
    let artifact_type = state
        .artifact_registry
        .resolve(artifact_type)
        .context("unknown artifact type")?;
    let notes = load_notes(notes, notes_file)?;

    let mut options = GenerationOptions::from_config(&state.config);
    if let Some(threshold) = threshold {
        options.validation_threshold = threshold;
    }
    if let Some(temperature) = temperature {
        options.temperature = temperature;
    }
    options.include_tests = with_tests;

    let result = state.orchestrator.generate(&artifact_type, &notes, &options, None).await;
    Ok(serde_json::to_value(result)?)
}

async fn execute_models_command(cmd: &ModelsCommands, state: &AppState) -> Result<serde_json::Value> {
    match cmd {
        ModelsCommands::List { refresh } => {
            if *refresh {
                state.router.probe_all().await.context("failed to probe models")?;
            }
            let models = state.router.store().list_models();
            Ok(serde_json::to_value(models)?)
        }
        ModelsCommands::Register { model_id, name } => {
            let id = ModelId::from_str(model_id).map_err(anyhow::Error::msg)?;
            let info = ModelInfo::new(id, name.clone());
            state.router.register_model(info.clone())?;
            Ok(serde_json::to_value(info)?)
        }
        ModelsCommands::Promote { artifact_type, model_id } => {
            let artifact_type = state.artifact_registry.resolve(artifact_type)?;
            let model_id = ModelId::from_str(model_id).map_err(anyhow::Error::msg)?;
            state.router.promote(&artifact_type, &model_id)?;
            let routing = state.router.routing_for(&artifact_type);
            Ok(serde_json::to_value(routing)?)
        }
    }
}

async fn execute_routing_command(cmd: &RoutingCommands, state: &AppState) -> Result<serde_json::Value> {
    match cmd {
        RoutingCommands::Get { artifact_type } => {
            let artifact_type = state.artifact_registry.resolve(artifact_type)?;
            let routing: Option<ModelRouting> = state.router.routing_for(&artifact_type);
            Ok(serde_json::to_value(routing)?)
        }
    }
}

async fn execute_finetune_command(cmd: &FineTuneCommands, state: &AppState) -> Result<serde_json::Value> {
    match cmd {
        FineTuneCommands::Stats { artifact_type } => {
            let artifact_type = state.artifact_registry.resolve(artifact_type)?;
            let breakdown = state.pool.get_source_breakdown(&artifact_type);
            Ok(serde_json::json!({
                "real": breakdown.real,
                "synthetic": breakdown.synthetic,
                "total": breakdown.total,
                "synthetic_pct": breakdown.synthetic_pct,
                "ready_for_training": breakdown.ready_for_training,
                "ready_for_graduation": breakdown.ready_for_graduation,
                "needs_bootstrap": breakdown.needs_bootstrap,
            }))
        }
        FineTuneCommands::Submit {
            artifact_type,
            prompt,
            response,
            score,
            base_model,
            source,
        } => {
            let artifact_type = state.artifact_registry.resolve(artifact_type)?;
            let decision = state.pool.add_example(
                artifact_type,
                prompt.clone(),
                response.clone(),
                *score,
                base_model.clone(),
                source.clone().into(),
            )?;
            Ok(serde_json::json!({ "decision": format!("{decision:?}") }))
        }
        FineTuneCommands::Trigger {
            artifact_type,
            force,
            base_model,
            use_huggingface,
        } => {
            let resolved_type = state.artifact_registry.resolve(artifact_type)?;
            let entries = state.pool.entries_for(&resolved_type);
            if !*force && entries.len() < state.config.finetune.incremental_batch_threshold {
                anyhow::bail!(
                    "pool has {} examples, below incremental_batch_threshold {} (use --force to override)",
                    entries.len(),
                    state.config.finetune.incremental_batch_threshold
                );
            }
            let job = TrainingJob::new(resolved_type, base_model.clone(), *use_huggingface, entries);
            state.job_store.submit(&job)?;
            Ok(serde_json::to_value(job)?)
        }
        FineTuneCommands::Cancel { job_id } => {
            let id = Uuid::parse_str(job_id).context("invalid job id")?;
            let mut job = state.job_store.load(&id)?;
            job.request_cancel()?;
            state.job_store.save(&job)?;
            Ok(serde_json::to_value(job)?)
        }
        FineTuneCommands::Jobs { status } => {
            let mut jobs = state.job_store.list_all()?;
            if let Some(status) = status {
                let wanted = parse_job_status(status)?;
                jobs.retain(|j| j.status == wanted);
            }
            Ok(serde_json::to_value(jobs)?)
        }
    }
}

fn parse_job_status(s: &str) -> Result<JobStatus> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "preparing" => Ok(JobStatus::Preparing),
        "training" => Ok(JobStatus::Training),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => anyhow::bail!("unknown job status '{other}'"),
    }
}

async fn execute_graph_command(cmd: &GraphCommands, state: &AppState) -> Result<serde_json::Value> {
    match cmd {
        GraphCommands::Register {
            id,
            artifact_type,
            content,
            content_file,
        } => {
            let artifact_type = state.artifact_registry.resolve(artifact_type)?;
            let content = if let Some(content) = content {
                content.clone()
            } else if let Some(path) = content_file {
                std::fs::read_to_string(path).context("failed to read content file")?
            } else {
                anyhow::bail!("either --content or --content-file is required")
            };
            let hash = forge_core::content_hash(&content);

            let upstream_types = static_dependencies(&artifact_type);
            let mut source_ids = Vec::new();
            let mut source_hashes = std::collections::HashMap::new();
            for upstream_type in &upstream_types {
                if let Some(existing) = find_node_by_type(state, upstream_type) {
                    source_ids.push(existing.id.clone());
                    source_hashes.insert(existing.id.clone(), existing.content_hash.clone());
                }
            }

            let node = ArtifactNode::new(id.clone(), artifact_type, hash, source_ids, source_hashes);
            state.graph.upsert(node.clone())?;
            Ok(serde_json::to_value(node)?)
        }
        GraphCommands::Staleness { id } => {
            let report = state.graph.check_staleness(id);
            Ok(serde_json::to_value(report)?)
        }
        GraphCommands::Impact { id } => {
            let impacted = state.graph.impact_analysis(id);
            Ok(serde_json::json!({ "id": id, "impacted": impacted }))
        }
        GraphCommands::Tree { root } => {
            let tree = state.graph.dependency_tree(root.as_deref());
            Ok(serde_json::to_value(tree)?)
        }
    }
}

/// Best-effort lookup for `graph register`'s auto-link step: the most
/// recently generated node of a given artifact type, if one exists.
/// [`forge_graph::ArtifactGraph`] has no type index, so this is a linear
/// scan by id convention (the orchestrator and sprint generator name nodes
/// after `ArtifactType::value()`).
fn find_node_by_type(state: &AppState, artifact_type: &ArtifactType) -> Option<ArtifactNode> {
    state.graph.get(&artifact_type.value())
}

async fn execute_custom_type_command(cmd: &CustomTypeCommands, state: &AppState) -> Result<serde_json::Value> {
    match cmd {
        CustomTypeCommands::Register { name, template, category } => {
            state
                .artifact_registry
                .register_custom(name, template, category.clone().into())?;
            state.persist_custom_types()?;
            Ok(serde_json::json!({ "name": name, "registered": true }))
        }
        CustomTypeCommands::List => {
            let defs = state.artifact_registry.list_custom();
            Ok(serde_json::to_value(defs)?)
        }
    }
}

async fn execute_package(
    state: &AppState,
    preset: Option<&str>,
    types: &[String],
    notes: Option<&str>,
    notes_file: Option<&std::path::Path>,
) -> Result<serde_json::Value> {
    let notes = load_notes(notes, notes_file)?;

    let selection = if let Some(preset) = preset {
        PackageSelection::Preset(parse_preset(preset)?)
    } else if !types.is_empty() {
        let resolved: Result<Vec<ArtifactType>, _> = types
            .iter()
            .map(|t| state.artifact_registry.resolve(t))
            .collect();
        PackageSelection::CustomTypes(resolved.map_err(anyhow::Error::msg)?)
    } else {
        anyhow::bail!("either --preset or --types is required")
    };

    let result = state.sprint.generate_package(&notes, selection, None).await;
    Ok(serde_json::to_value(result)?)
}

fn parse_preset(name: &str) -> Result<SprintPreset> {
    match name {
        "full" => Ok(SprintPreset::Full),
        "backend" => Ok(SprintPreset::Backend),
        "frontend" => Ok(SprintPreset::Frontend),
        "documentation" => Ok(SprintPreset::Documentation),
        "pm" => Ok(SprintPreset::Pm),
        "quick" => Ok(SprintPreset::Quick),
        other => anyhow::bail!("unknown preset '{other}'"),
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, indent: usize) -> Result<()> {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{pad}{key_colored}:");
                        print_pretty(val, indent + 1)?;
                    }
                    serde_json::Value::String(s) => println!("{pad}{key_colored}: {}", s.green()),
                    serde_json::Value::Number(n) => println!("{pad}{key_colored}: {}", n.to_string().yellow()),
                    serde_json::Value::Bool(b) => {
                        let colored = if *b { "true".green() } else { "false".red() };
                        println!("{pad}{key_colored}: {colored}");
                    }
                    serde_json::Value::Null => println!("{pad}{key_colored}: null"),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{pad}{}:", format!("[{i}]").cyan());
                print_pretty(item, indent + 1)?;
            }
        }
        other => println!("{pad}{other}"),
    }
    Ok(())
}
