mod input;
mod output;
mod report;
mod workflow;

use clap::{Args, Parser, Subcommand};
use cosmatch_common::{logger, AppConfig, Result};
use std::path::PathBuf;

use crate::workflow::WorkflowOptions;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root, falling back to the working directory
fn load_dotenv_from_project_root() {
    match find_project_root().map(|root| root.join(".env")) {
        Some(env_path) if env_path.exists() => {
            dotenv::from_path(&env_path).ok();
        }
        _ => {
            dotenv::dotenv().ok();
        }
    }
}

#[derive(Parser)]
#[command(name = "cosmatch")]
#[command(about = "CosMatch - batched cosine similarity matching between embedding collections", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true, env = "COSMATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Match query embeddings against candidate embeddings
    Run(RunArgs),
}

/// Per-run overrides of the loaded configuration
#[derive(Args, Default, Debug)]
struct RunArgs {
    /// Query embedding container
    #[arg(long)]
    query: Option<PathBuf>,

    /// Candidate embedding container
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// Result JSON path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Task report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Maximum recommendations per query
    #[arg(long)]
    top_n: Option<usize>,

    /// Minimum similarity score
    #[arg(long, allow_hyphen_values = true)]
    threshold: Option<f32>,

    /// Queries per chunk
    #[arg(long)]
    batch_size: Option<usize>,

    /// Score chunks in parallel (`--parallel false` turns a configured `true` off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    parallel: Option<bool>,

    /// Log to the console only (no log file, no progress bar)
    #[arg(long)]
    console_only: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.query {
            config.query_path = path.clone();
        }
        if let Some(path) = &self.candidate {
            config.candidate_path = path.clone();
        }
        if let Some(path) = &self.output {
            config.output_path = path.clone();
        }
        if let Some(path) = &self.report {
            config.report_path = path.clone();
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
    }
}

fn run(config_file: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let mut config = AppConfig::load(config_file.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    config.ensure_directories()?;

    if args.console_only {
        logger::setup_console_logging(&config.log_level)?;
    } else {
        logger::setup_logging(&config.log_dir, &config.log_level)?;
    }

    tracing::info!("CosMatch starting...");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Query: {}", config.query_path.display());
    tracing::info!("  Candidate: {}", config.candidate_path.display());
    tracing::info!(
        "  top_n={}, threshold={}, batch_size={}, parallel={}",
        config.top_n,
        config.threshold,
        config.batch_size,
        config.parallel
    );

    let result = workflow::execute(
        &config,
        WorkflowOptions {
            show_progress: !args.console_only,
        },
    )?;

    println!(
        "Matched {} of {} queries ({} recommendations)",
        result.stats.matched_queries, result.stats.total_queries, result.stats.total_recommendations
    );
    println!("Results written to {}", result.output_path.display());
    println!("Report written to {}", result.report_path.display());

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Load environment variables from .env at project root before the
    // configuration layers read COSMATCH_* variables
    load_dotenv_from_project_root();

    let args = match cli.command {
        Some(Commands::Run(args)) => args,
        None => RunArgs::default(),
    };

    if let Err(e) = run(cli.config, args) {
        tracing::error!("Run failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
