use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use github_repo_sync::{GitHubClient, ProcessEnv, SyncConfig, SyncEngine};

#[derive(Parser)]
#[command(name = "github-repo-sync")]
#[command(about = "Sync GitHub repo settings, secrets, and rulesets from a config file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync secrets, settings and rulesets to every configured repository
    Sync {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,

        /// Show what would change without making any changes
        #[arg(short, long)]
        dry_run: bool,

        /// Sync only this repository
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// List repositories that would be synced
    List {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv()?;

    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    debug!("Starting github-repo-sync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync {
            config,
            dry_run,
            repo,
        } => cmd_sync(config, dry_run, repo).await,
        Commands::List { config } => cmd_list(config),
    }
}

/// Load `.env` from the working directory only, never from a parent directory.
///
/// Existing environment variables win over `.env` entries.
fn load_dotenv() -> Result<()> {
    match dotenvy::from_path(".env") {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("Failed to load .env"),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from the given path or `config.json` in the working directory
fn load_config(config_path: Option<String>) -> Result<SyncConfig> {
    let path = match config_path {
        Some(path) => PathBuf::from(shellexpand::full(&path)?.as_ref()),
        None => SyncConfig::default_config_path(),
    };

    debug!("Loading configuration from {}", path.display());
    SyncConfig::load(&path)
}

/// Reconcile every configured repository
async fn cmd_sync(config_path: Option<String>, dry_run: bool, repo: Option<String>) -> Result<()> {
    let config = load_config(config_path)?
        .with_repo_filter(repo)
        .with_dry_run(dry_run);

    let client = GitHubClient::from_env()?;
    let engine = SyncEngine::new(client, ProcessEnv);

    let summary = engine.sync_repos(&config).await;

    // Per-repository failures were already reported; they do not fail the run
    info!(
        "{} of {} repositories synced in {:.2}s",
        summary.successful(),
        summary.total_repositories(),
        summary.duration.as_secs_f64()
    );

    Ok(())
}

/// Print the repositories a sync would touch
fn cmd_list(config_path: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;

    println!("Repos to sync:");
    for name in config.full_names() {
        println!("  - {}", name);
    }

    Ok(())
}
