//! `gigsignal` CLI (§6): `generate | update | validate | compare` over the
//! file-backed snapshot/catalog stores, for operators running the pipeline
//! by hand instead of through the scheduler daemon.
//!
//! Grounded in `dev-cli`'s clap-derive + `ExitCode` shape; the domain logic
//! is otherwise a thin driver over `gigsignal-catalog`/`gigsignal-dedup`.

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gigsignal", about = "Ingestion, dedup, and catalog tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a fresh catalog from per-source snapshots.
    Generate(CatalogArgs),
    /// Rebuild the catalog and report how it changed since `--old-catalog`.
    Update(CatalogArgs),
    /// Re-validate per-source snapshots without building a catalog.
    Validate(ValidateArgs),
    /// Diff two catalog documents already on disk.
    Compare(CompareArgs),
}

#[derive(Args, Clone)]
pub struct CatalogArgs {
    /// Directory of per-source snapshot JSON files.
    #[arg(long, default_value = "data/normalized")]
    pub sources_dir: PathBuf,
    /// Where to write the generated catalog.
    #[arg(long, default_value = "data/catalog.json")]
    pub output: PathBuf,
    /// Previous catalog to diff the new one against; printed, not required.
    #[arg(long)]
    pub old_catalog: Option<PathBuf>,
    /// Minimum composite similarity score to treat two records as duplicates.
    #[arg(long, default_value_t = 0.7)]
    pub min_confidence: f64,
    /// Hours of slack allowed between `dateStart`s when fuzzy-matching.
    #[arg(long, default_value_t = 2)]
    pub date_tolerance: i64,
    /// Require candidates to fall on the same calendar day.
    #[arg(long)]
    pub same_day: bool,
    /// Skip re-validating snapshot records before building the catalog.
    #[arg(long)]
    pub no_validate: bool,
    /// Maximum snapshot age, in hours, eligible for inclusion.
    #[arg(long, default_value_t = 24)]
    pub max_age: u64,
    /// JSON file of `{"source": trust_score}` overrides (0-100).
    #[arg(long)]
    pub trust_scores: Option<PathBuf>,
    #[arg(long, short)]
    pub verbose: bool,
    /// Compute and print the result but don't write `--output`.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "data/normalized")]
    pub sources_dir: PathBuf,
    #[arg(long)]
    pub no_validate: bool,
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Args, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub old_catalog: PathBuf,
    #[arg(long)]
    pub output: PathBuf,
    #[arg(long, short)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gigsignal=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Returns `Ok(true)` on success, `Ok(false)` when the run completed but
/// surfaced fatal/validation errors (§6 exit code 1).
async fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Generate(args) => commands::generate(args).await,
        Command::Update(args) => commands::update(args).await,
        Command::Validate(args) => commands::validate(args).await,
        Command::Compare(args) => commands::compare(args).await,
    }
}
