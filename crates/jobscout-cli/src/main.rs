use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobscout_client::{ApiJobSource, TelegramChannel};
use jobscout_core::config::AppConfig;
use jobscout_core::models::{Listing, NotificationData, PersistedRecord, RunReport};
use jobscout_core::scoring::ScoringEngine;
use jobscout_core::traits::{NotifyChannel, NullListingStore};
use jobscout_core::{RunOutcome, SearchService};
use jobscout_db::{Database, ListingRepository};

#[derive(Parser)]
#[command(
    name = "jobscout",
    version,
    about = "Job search aggregator with relevance scoring and alerts"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "JOBSCOUT_CONFIG", default_value = "jobscout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search cycle: fetch, score, persist, notify
    Run {
        /// Fetch and score without writing to the store
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Run search cycles on a fixed interval until interrupted
    Schedule,

    /// Show store statistics
    Stats,

    /// Export every persisted record as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete records not seen within the retention window
    Cleanup {
        /// Overrides store.retention_days from the config
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Flag a stored listing as applied
    MarkApplied {
        /// Listing identity hash
        identity: String,
    },

    /// Recalculate every stored score against the current keyword map
    Rescore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobscout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { dry_run } => cmd_run(&cli.config, dry_run).await?,
        Commands::Schedule => cmd_schedule(&cli.config).await?,
        Commands::Stats => cmd_stats(&cli.config).await?,
        Commands::Export { output } => cmd_export(&cli.config, output.as_deref()).await?,
        Commands::Cleanup { max_age_days } => cmd_cleanup(&cli.config, max_age_days).await?,
        Commands::MarkApplied { identity } => cmd_mark_applied(&cli.config, &identity).await?,
        Commands::Rescore => cmd_rescore(&cli.config).await?,
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).map_err(|e| anyhow::anyhow!(e))
}

/// Open the SQLite store and apply migrations.
async fn connect_store(config: &AppConfig) -> Result<Database> {
    let database = Database::connect(&config.store)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.path))?;
    database.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(database)
}

/// Cancel the returned token on the first CTRL+C. Queued tasks are skipped;
/// in-flight requests finish on their own.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight tasks");
            token.cancel();
        }
    });
    cancel
}

/// Bring persisted scores in line with the keyword map of the loaded
/// config. Runs once per process, before the first search.
async fn rescore_at_startup(config: &AppConfig, repository: &ListingRepository) -> Result<()> {
    if !config.store.recalculate_on_start {
        return Ok(());
    }
    let engine = ScoringEngine::new(&config.scoring);
    let changed = repository
        .recalculate_scores(&engine)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if changed > 0 {
        tracing::info!("Rescored {changed} stored listings");
    }
    Ok(())
}

async fn apply_retention(config: &AppConfig, repository: &ListingRepository) -> Result<()> {
    let Some(days) = config.store.retention_days else {
        return Ok(());
    };
    let removed = repository.cleanup(days).await.map_err(|e| anyhow::anyhow!(e))?;
    if removed > 0 {
        tracing::info!("Removed {removed} listings not seen in {days} days");
    }
    Ok(())
}

/// One full cycle against the real store: retention cleanup, search, CSV
/// output, notifications. Rescoring is only done on the first cycle of the
/// process.
async fn run_cycle(
    config: AppConfig,
    cancel: &CancellationToken,
    first_cycle: bool,
) -> Result<RunReport> {
    let database = connect_store(&config).await?;
    let repository = database.listings();

    if first_cycle {
        rescore_at_startup(&config, &repository).await?;
    }
    apply_retention(&config, &repository).await?;

    let source = ApiJobSource::new(&config.fetch).map_err(|e| anyhow::anyhow!(e))?;
    let service = SearchService::new(config.clone(), source, repository.clone());
    let outcome = service.run(cancel).await.map_err(|e| anyhow::anyhow!(e))?;

    if config.output.save_csv {
        write_run_csv(&config, &outcome).context("Failed to write CSV results")?;
    }

    notify_channels(&config, &repository, &outcome.report).await;

    Ok(outcome.report)
}

async fn cmd_run(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let cancel = cancel_on_ctrl_c();

    if dry_run {
        tracing::info!("Dry run: results will not be persisted");
        let source = ApiJobSource::new(&config.fetch).map_err(|e| anyhow::anyhow!(e))?;
        let service = SearchService::new(config.clone(), source, NullListingStore);
        let outcome = service.run(&cancel).await.map_err(|e| anyhow::anyhow!(e))?;

        if config.output.save_csv {
            write_run_csv(&config, &outcome).context("Failed to write CSV results")?;
        }
        print_report(&outcome.report);
        return Ok(());
    }

    let report = run_cycle(config, &cancel, true).await?;
    print_report(&report);
    Ok(())
}

async fn cmd_schedule(config_path: &Path) -> Result<()> {
    let initial = load_config(config_path)?;
    let cancel = cancel_on_ctrl_c();

    let mut first_cycle = true;
    let mut next_run = tokio::time::Instant::now();
    if !initial.scheduler.run_on_startup {
        next_run += initial.scheduler.interval();
        tracing::info!("First run in {} hours", initial.scheduler.interval_hours);
    }

    loop {
        tokio::select! {
            () = tokio::time::sleep_until(next_run) => {}
            () = cancel.cancelled() => break,
        }

        // Reload so edits to queries or the schedule take effect between
        // cycles. A config that no longer parses stops the process.
        let config = load_config(config_path).context("Configuration became invalid")?;
        let scheduler = config.scheduler.clone();

        let started = tokio::time::Instant::now();
        match run_cycle(config, &cancel, first_cycle).await {
            Ok(report) => {
                first_cycle = false;
                print_report(&report);
                next_run = started + scheduler.interval();
            }
            Err(err) => {
                // A failed cycle keeps the scheduler alive; the next slot
                // follows the retry policy.
                tracing::error!(error = %err, "Run failed");
                next_run = if scheduler.retry_on_failure {
                    tokio::time::Instant::now() + scheduler.retry_delay()
                } else {
                    started + scheduler.interval()
                };
            }
        }

        // Skip slots that passed while a long cycle ran.
        let now = tokio::time::Instant::now();
        while next_run <= now {
            next_run += scheduler.interval();
        }

        if cancel.is_cancelled() {
            break;
        }
        tracing::info!("Next run in {} minutes", (next_run - now).as_secs() / 60);
    }

    tracing::info!("Scheduler stopped");
    Ok(())
}

async fn cmd_stats(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let database = connect_store(&config).await?;
    let stats = database
        .listings()
        .statistics(Utc::now().date_naive())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("Store: {}", config.store.path);
    println!("  Total listings: {}", stats.total);
    println!("  Seen today:     {}", stats.seen_today);
    println!("  New today:      {}", stats.new_today);
    println!("  Applied:        {}", stats.applied);
    println!("  Average score:  {:.1}", stats.avg_score);
    Ok(())
}

async fn cmd_export(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let database = connect_store(&config).await?;
    let records = database
        .listings()
        .export_all()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if records.is_empty() {
        tracing::info!("Store is empty, nothing to export");
        return Ok(());
    }

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_record_csv(file, &records)?;
            tracing::info!("Exported {} records to {}", records.len(), path.display());
        }
        None => write_record_csv(std::io::stdout().lock(), &records)?,
    }

    Ok(())
}

async fn cmd_cleanup(config_path: &Path, max_age_days: Option<u32>) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(days) = max_age_days.or(config.store.retention_days) else {
        anyhow::bail!("No retention window: pass --max-age-days or set store.retention_days");
    };

    let database = connect_store(&config).await?;
    let removed = database
        .listings()
        .cleanup(days)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!("Removed {removed} listings not seen in the last {days} days");
    Ok(())
}

async fn cmd_mark_applied(config_path: &Path, identity: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let database = connect_store(&config).await?;
    let marked = database
        .listings()
        .mark_applied(identity)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if marked {
        println!("Marked {identity} as applied");
    } else {
        println!("No listing with identity {identity}");
    }
    Ok(())
}

async fn cmd_rescore(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let database = connect_store(&config).await?;
    let engine = ScoringEngine::new(&config.scoring);
    let changed = database
        .listings()
        .recalculate_scores(&engine)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!("Rescored {changed} listings");
    Ok(())
}

/// Write `all_<date>.csv` plus `relevant_<date>.csv` under the results dir.
fn write_run_csv(config: &AppConfig, outcome: &RunOutcome) -> Result<()> {
    if outcome.listings.is_empty() {
        return Ok(());
    }

    let dir = Path::new(&config.output.results_dir);
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d");
    let all_path = dir.join(format!("all_{stamp}.csv"));
    write_listing_csv(&all_path, outcome.listings.iter())?;
    tracing::info!(
        "Wrote {} listings to {}",
        outcome.listings.len(),
        all_path.display()
    );

    let engine = ScoringEngine::new(&config.scoring);
    let relevant: Vec<&Listing> = outcome
        .listings
        .iter()
        .filter(|l| engine.is_relevant(l.relevance_score))
        .collect();
    if !relevant.is_empty() {
        let relevant_path = dir.join(format!("relevant_{stamp}.csv"));
        write_listing_csv(&relevant_path, relevant.iter().copied())?;
        tracing::info!(
            "Wrote {} listings to {}",
            relevant.len(),
            relevant_path.display()
        );
    }

    Ok(())
}

fn write_listing_csv<'a>(
    path: &Path,
    listings: impl Iterator<Item = &'a Listing>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record([
        "identity",
        "title",
        "company",
        "location",
        "source",
        "score",
        "url",
        "job_type",
        "remote",
        "level",
        "date_posted",
        "min_salary",
        "max_salary",
        "currency",
        "query",
        "search_location",
    ])?;

    for listing in listings {
        let raw = &listing.raw;
        writer.write_record([
            listing.identity.clone(),
            raw.title.clone(),
            raw.company.clone(),
            raw.location.clone(),
            raw.source.to_string(),
            listing.relevance_score.to_string(),
            raw.url.clone().unwrap_or_default(),
            raw.job_type.clone().unwrap_or_default(),
            raw.is_remote.map(|r| r.to_string()).unwrap_or_default(),
            raw.level.clone().unwrap_or_default(),
            raw.date_posted.map(|d| d.to_string()).unwrap_or_default(),
            raw.min_salary.map(|s| s.to_string()).unwrap_or_default(),
            raw.max_salary.map(|s| s.to_string()).unwrap_or_default(),
            raw.currency.clone().unwrap_or_default(),
            listing.origin_query.clone(),
            listing.origin_location.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_record_csv<W: std::io::Write>(target: W, records: &[PersistedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(target);

    writer.write_record([
        "identity",
        "title",
        "company",
        "location",
        "source",
        "score",
        "url",
        "first_seen",
        "last_seen",
        "applied",
    ])?;

    for record in records {
        writer.write_record([
            record.identity.clone(),
            record.title.clone(),
            record.company.clone(),
            record.location.clone(),
            record.source.clone(),
            record.relevance_score.to_string(),
            record.url.clone().unwrap_or_default(),
            record.first_seen.to_string(),
            record.last_seen.to_string(),
            record.applied.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Delivery problems are logged, never fatal: a failed alert must not turn
/// a finished run into a failed process.
async fn notify_channels(config: &AppConfig, repository: &ListingRepository, report: &RunReport) {
    let channel = match TelegramChannel::new(&config.notify.telegram) {
        Ok(channel) => channel,
        Err(err) => {
            tracing::warn!(error = %err, "Could not build Telegram channel");
            return;
        }
    };
    if !channel.is_configured() {
        return;
    }

    let new_listings = match repository.first_seen_on(Utc::now().date_naive()).await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(error = %err, "Could not load today's new listings");
            Vec::new()
        }
    };

    let data = NotificationData {
        run_timestamp: report.started_at,
        total_found: report.total_found,
        new_count: report.created,
        updated_count: report.updated,
        avg_score: report.avg_score,
        new_listings,
    };

    match channel.send(&data).await {
        Ok(()) => tracing::info!(channel = channel.name(), "Notification sent"),
        Err(err) => {
            tracing::warn!(channel = channel.name(), error = %err, "Notification failed");
        }
    }
}

fn print_report(report: &RunReport) {
    println!(
        "Run {} finished in {:.1}s",
        report.run_id,
        report.duration.as_secs_f64()
    );
    println!(
        "  Tasks:    {} total, {} ok, {} failed, {} skipped",
        report.tasks.total, report.tasks.succeeded, report.tasks.failed, report.tasks.skipped
    );
    println!(
        "  Listings: {} found, {} unique, {} dropped by filter, {} relevant",
        report.total_found, report.unique, report.dropped_by_filter, report.relevant
    );
    println!(
        "  Store:    {} new, {} updated, avg score {:.1}",
        report.created, report.updated, report.avg_score
    );
}
