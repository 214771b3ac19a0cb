use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autoanalyst::{Collaborators, Orchestrator, PipelineConfig, StageStatus, StateStore};

#[derive(Parser)]
#[command(name = "autoanalyst")]
#[command(about = "Automated data-analysis pipeline: load, analyze, visualize, report", long_about = None)]
struct Cli {
    /// YAML pipeline configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory with input CSV files
    #[arg(short, long, global = true)]
    input_dir: Option<PathBuf>,

    /// Root for visualizations, reports and workflow state
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Target column for regression and target-aware plots
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Number of k-means clusters
    #[arg(long, global = true)]
    clusters: Option<usize>,

    /// Ignore persisted workflow state and start over
    #[arg(long, global = true)]
    fresh: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline, resuming from saved state when present
    Run,

    /// Show stage status from the saved workflow state
    Status,

    /// Delete the saved workflow state
    Reset,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "autoanalyst=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => run(&cli, config),

        Commands::Status => {
            let store = StateStore::new(config.state_path());
            let Some(state) = store.load()? else {
                println!("No workflow state at {}", store.path().display());
                return Ok(());
            };

            println!("Workflow state: {}", store.path().display());
            for (stage, record) in state.board.records() {
                let status = match record.status {
                    StageStatus::Pending => "[ ]",
                    StageStatus::Running => "[~]",
                    StageStatus::Completed => "[✓]",
                    StageStatus::Failed => "[✗]",
                };
                println!("  {} {}", status, stage);
            }

            let context = &state.context;
            println!("\nDatasets: {}", context.processed_datasets.len());
            for (name, table) in &context.processed_datasets {
                println!("  - {} ({} rows, {} columns)", name, table.n_rows(), table.n_cols());
            }
            if !context.report_paths.is_empty() {
                println!("Reports:");
                for path in &context.report_paths {
                    println!("  - {}", path.display());
                }
            }
            Ok(())
        }

        Commands::Reset => {
            let store = StateStore::new(config.state_path());
            if store.remove()? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No workflow state at {}", store.path().display());
            }
            Ok(())
        }
    }
}

/// Defaults, then the YAML file, then command-line flags
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &cli.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(target) = &cli.target {
        config.target = Some(target.clone());
    }
    if let Some(k) = cli.clusters {
        anyhow::ensure!(k > 0, "--clusters must be at least 1");
        config.n_clusters = k;
    }
    Ok(config)
}

fn run(cli: &Cli, config: PipelineConfig) -> Result<()> {
    config.ensure_directories()?;

    let collaborators = Collaborators::from_config(&config);
    let mut orch = if cli.fresh {
        Orchestrator::new(config, collaborators)
    } else {
        Orchestrator::resume(config, collaborators).context("Failed to load workflow state")?
    };

    if let Some(stage) = orch.next_task() {
        tracing::info!("Starting at stage {}", stage);
    }

    match orch.run() {
        Ok(()) => {
            let reports = &orch.state().context.report_paths;
            println!("All tasks completed successfully!");
            println!("Reports written: {}", reports.len());
            for path in reports {
                println!("  - {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            println!("Error during execution: {}", e);
            let plan = orch.recovery_plan(&e);
            println!("\n{}", plan);
            std::process::exit(1);
        }
    }
}
