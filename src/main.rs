//! Forum Archiver main entry point
//!
//! This is the command-line interface for archiving a forum into SQLite.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use forum_archiver::archive::PageArchive;
use forum_archiver::config::{load_config_with_hash, Config};
use forum_archiver::crawler::{Archiver, Phase};
use forum_archiver::output::{
    generate_markdown_summary, generate_summary, load_statistics, print_statistics,
};
use forum_archiver::storage::{open_storage, RunStatus};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_SUMMARY_PATH: &str = "archive-summary.md";

/// Forum Archiver: archives a single web forum into SQLite
///
/// Walks the configured boards, scrapes every thread's print view, and
/// optionally the member list and member profiles. Interrupted runs are
/// resumed by running again: threads already scraped are skipped.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version = "1.0.0")]
#[command(about = "Archives a web forum into SQLite", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be archived without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,

    /// Run only these phases (repeatable; default: all)
    #[arg(long = "phase", value_enum, value_name = "PHASE")]
    phases: Vec<PhaseArg>,

    /// Anchor for "today"/"yesterday" dates, overriding the config
    #[arg(long, value_name = "YYYY-MM-DD")]
    reference_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PhaseArg {
    Boards,
    Threads,
    Members,
    Profiles,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Boards => Phase::Boards,
            PhaseArg::Threads => Phase::Threads,
            PhaseArg::Members => Phase::Members,
            PhaseArg::Profiles => Phase::Profiles,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(date) = cli.reference_date {
        config.site.reference_date = Some(date);
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        let phases: Vec<Phase> = if cli.phases.is_empty() {
            Phase::ALL.to_vec()
        } else {
            cli.phases.iter().copied().map(Phase::from).collect()
        };
        handle_archive(config, &config_hash, &phases).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Forum Archiver Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Ruleset: {}", config.site.ruleset);
    println!("  Site name: {}", config.site.site_name);
    match config.site.reference_date {
        Some(date) => println!("  Reference date: {}", date),
        None => println!("  Reference date: (run start date)"),
    }
    match &config.site.member_list_path {
        Some(path) => println!("  Member list: {}", path),
        None => println!("  Member list: (none)"),
    }

    println!("\nFetcher:");
    println!("  Max attempts: {}", config.fetcher.max_attempts);
    println!(
        "  Retry wait: {}ms ({:?})",
        config.fetcher.retry_wait_ms, config.fetcher.backoff
    );
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!(
        "  Min request interval: {}ms",
        config.fetcher.min_request_interval_ms
    );

    println!("\nCrawler:");
    println!(
        "  Max pages per traversal: {}",
        config.crawler.max_pages_per_traversal
    );
    println!(
        "  Max concurrent workers: {}",
        config.crawler.max_concurrent_workers
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(dir) = &config.output.pages_dir {
        println!("  Raw pages: {}", dir);
    }

    println!("\nBoards ({}):", config.boards.len());
    for board in &config.boards {
        match &board.parent {
            Some(parent) => println!("  - {} (in {})", board.path, parent),
            None => println!("  - {}", board.path),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let archive = config.output.pages_dir.as_ref().map(PageArchive::at);
    let stats = load_statistics(&storage, archive.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<()> {
    let output = summary_path(config);

    println!("=== Exporting Run Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", output.display());
    println!();

    write_summary(config, &output)?;
    println!("✓ Summary exported to: {}", output.display());

    Ok(())
}

fn summary_path(config: &Config) -> PathBuf {
    PathBuf::from(
        config
            .output
            .summary_path
            .as_deref()
            .unwrap_or(DEFAULT_SUMMARY_PATH),
    )
}

fn write_summary(config: &Config, output: &Path) -> Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let summary = generate_summary(&storage)?;
    generate_markdown_summary(&summary, output)
        .with_context(|| format!("Failed to write summary {}", output.display()))?;
    Ok(())
}

/// Handles the main archive operation
async fn handle_archive(config: Config, config_hash: &str, phases: &[Phase]) -> Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        }
    });

    tracing::info!(
        "Boards: {}, phases: {}",
        config.boards.len(),
        phases
            .iter()
            .map(Phase::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let archiver = Archiver::new(&config, config_hash, cancel)?;
    let report = match archiver.run(phases).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Run {} failed: {}", archiver.run_id(), e);
            return Err(e.into());
        }
    };

    let mut statuses: Vec<_> = report.traversals.iter().collect();
    statuses.sort_by_key(|(status, _)| status.to_db_string());
    for (status, count) in statuses {
        tracing::info!("  {}: {} traversals", status, count);
    }

    if config.output.summary_path.is_some() {
        write_summary(&config, &summary_path(&config))?;
    }

    match report.status {
        RunStatus::Cancelled => tracing::warn!("Run {} cancelled", report.run_id),
        _ => tracing::info!("Run {} completed successfully", report.run_id),
    }

    Ok(())
}
