use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use octomig_core::BenchmarkCatalog;
use octomig_engine::{migrate_results_dir, Executor, Registry};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod migrations;

#[derive(Parser)]
#[command(name = "octomig", version, about = "octobus benchmark result migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every result file up to a target migration (the newest
    /// one when no target is given).
    Migrate {
        target: Option<String>,
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
    },
    /// List the migration history and what each migration does.
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate {
            target,
            results_dir,
        } => run_migrate(target.as_deref(), &results_dir),
        Commands::List => run_list(),
    }
}

fn run_migrate(target: Option<&str>, results_dir: &Path) -> Result<()> {
    let registry = Registry::new(migrations::units())?;
    let catalog = load_catalog(results_dir)?;
    let executor = Executor::new(registry, catalog, target)?;

    let report = migrate_results_dir(results_dir, &executor)
        .with_context(|| format!("migrating {}", results_dir.display()))?;

    println!(
        "target {}: {} migrated, {} already current, {} skipped",
        executor.target_name(),
        report.migrated,
        report.unchanged,
        report.skipped
    );
    if report.migrated > 0 {
        println!("reminder: regenerate benchmarks.json before publishing these results");
    }
    Ok(())
}

fn run_list() -> Result<()> {
    let registry = Registry::new(migrations::units())?;
    for name in registry.names().collect::<Vec<_>>() {
        println!("{name}");
        let migration = registry.migration(name)?;
        for operation in migration.operations() {
            println!("  {}", operation.describe());
        }
    }
    Ok(())
}

/// Files that have never been migrated can only be converted with the
/// parameter-name order from `benchmarks.json`. With no catalog their
/// benchmarks are all skipped during conversion, so warn up front.
fn load_catalog(results_dir: &Path) -> Result<BenchmarkCatalog> {
    let path = results_dir.join("benchmarks.json");
    if !path.exists() {
        tracing::warn!(
            "{} not found, unmigrated files will lose their benchmarks",
            path.display()
        );
        return Ok(BenchmarkCatalog::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    let catalog = BenchmarkCatalog::from_value(&value)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(catalog)
}
