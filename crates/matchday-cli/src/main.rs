use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use matchday_core::health::DEFAULT_STALE_AFTER;
use matchday_core::model::Scope;
use matchday_core::snapshot::SnapshotStore;
use matchday_core::{
    load_providers_config, BackfillConfig, BackfillController, DbConfig, OrchestratorConfig,
    ProvidersConfig, RatePolicy, Scheduler, SchedulerConfig, SyncOrchestrator, SystemClock,
    TracingReporter,
};
use matchday_db::{CheckpointRepository, SnapshotRepository};
use tokio_util::sync::CancellationToken;

mod config;
mod providers;

use config::{Command, Config};
use providers::{JsonArchiveSource, JsonFeedAdapter};

/// The three provider roles the orchestrator expects in providers.toml.
const RESULTS_PROVIDER: &str = "results";
const DERIVED_PROVIDER: &str = "standings";
const STRUCTURAL_PROVIDER: &str = "roster";

type Orchestrator = SyncOrchestrator<
    JsonFeedAdapter<SnapshotRepository>,
    JsonFeedAdapter<SnapshotRepository>,
    JsonFeedAdapter<SnapshotRepository>,
    SnapshotRepository,
    SystemClock,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = Config::parse();

    info!("Connecting to database...");
    let db_config = DbConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    matchday_db::run_migrations(&pool)
        .await
        .context("Failed to apply migrations")?;

    let snapshots = SnapshotRepository::new(pool.clone());
    let checkpoints = CheckpointRepository::new(pool);

    let providers = load_providers_config(config.config.clone())
        .map_err(|e| anyhow::anyhow!(e.user_message()))?
        .context("No provider configuration found; a template was created, edit it and retry")?;

    let feed_dir = config.feed_dir.clone();

    match config.command {
        Command::Sync { results_only } => {
            let orchestrator = build_orchestrator(&feed_dir, &providers, snapshots)?;
            let reporter = TracingReporter;
            if results_only {
                let outcome = orchestrator.run_results_only(&reporter).await;
                println!(
                    "Results refreshed: {} scopes, {} failed",
                    outcome.attempted, outcome.failed
                );
            } else {
                let report = orchestrator.run(&reporter).await?;
                print_run_summary(&report);
            }
            print_health(&orchestrator);
        }
        Command::Run { interval } => {
            let cancel = CancellationToken::new();
            let orchestrator = build_orchestrator(&feed_dir, &providers, snapshots)?
                .with_cancellation(cancel.clone());
            let scheduler = Scheduler::new(
                orchestrator,
                SchedulerConfig {
                    interval: Duration::from_secs(interval),
                },
            );

            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupt received, shutting down after current run...");
                        cancel.cancel();
                    }
                }
            });

            scheduler.run(cancel, &TracingReporter).await?;
        }
        Command::Backfill {
            provider,
            scope,
            from,
            to,
            chunk_days,
        } => {
            let entry = providers
                .find_by_name(&provider)
                .with_context(|| format!("Provider '{}' not found in configuration", provider))?;

            let source = JsonArchiveSource::new(
                entry.name.clone(),
                feed_dir.clone(),
                snapshots,
                entry.rate_policy(),
            );
            let cancel = CancellationToken::new();
            let controller = BackfillController::new(
                source,
                checkpoints,
                SystemClock,
                BackfillConfig::default().with_chunk_days(chunk_days),
            )
            .with_cancellation(cancel.clone());

            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupt received, stopping after current chunk...");
                        cancel.cancel();
                    }
                }
            });

            let checkpoint = controller
                .run(&Scope::new(scope), from, to, &TracingReporter)
                .await?;
            println!(
                "Backfill {}: {} records imported, cursor at {}",
                checkpoint.status, checkpoint.records_imported, checkpoint.cursor
            );
            if let Some(error) = &checkpoint.last_error {
                println!("Last error: {}", error);
            }
        }
        Command::AsOf { entity, scope, date } => {
            let snapshot = snapshots
                .get_as_of(&entity, &Scope::new(scope), date)
                .await?;
            match snapshot {
                Some(snapshot) => {
                    println!(
                        "{} in {} as of {} (version of {}):",
                        snapshot.entity_id, snapshot.scope, date, snapshot.logical_date
                    );
                    println!("{}", serde_json::to_string_pretty(&snapshot.payload)?);
                }
                None => {
                    println!("No snapshot at or before {}", date);
                }
            }
        }
        Command::Status => {
            show_status(&providers, &checkpoints).await?;
        }
        Command::Prune { scope, before } => {
            let deleted = snapshots.prune_before(&Scope::new(scope), before).await?;
            println!("Deleted {} snapshot versions", deleted);
        }
    }

    Ok(())
}

/// Builds the orchestrator from the three configured provider roles.
fn build_orchestrator(
    feed_dir: &std::path::Path,
    providers: &ProvidersConfig,
    snapshots: SnapshotRepository,
) -> anyhow::Result<Orchestrator> {
    let results = feed_adapter(feed_dir, providers, RESULTS_PROVIDER, snapshots.clone());
    let derived = feed_adapter(feed_dir, providers, DERIVED_PROVIDER, snapshots.clone());
    let structural = feed_adapter(feed_dir, providers, STRUCTURAL_PROVIDER, snapshots.clone());

    let mut orchestrator_config = OrchestratorConfig::default();
    if let Some(hour) = providers.forced_full_sync_hour {
        orchestrator_config = orchestrator_config
            .with_forced_full_sync_hour(hour)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    }

    let scopes = providers.tracked_scopes();
    anyhow::ensure!(
        !scopes.is_empty(),
        "No scopes configured; add a `scopes` list to providers.toml"
    );

    let orchestrator = SyncOrchestrator::new(
        results,
        derived,
        structural,
        snapshots,
        SystemClock,
        orchestrator_config,
        scopes,
    );

    // Providers disabled in configuration stay out of scheduled runs.
    for entry in &providers.providers {
        if !entry.enabled {
            orchestrator
                .health()
                .disable(&entry.name, "disabled in providers.toml");
        }
    }

    Ok(orchestrator)
}

/// Adapter for one provider role, with config-file overrides when present.
fn feed_adapter(
    feed_dir: &std::path::Path,
    providers: &ProvidersConfig,
    role: &str,
    snapshots: SnapshotRepository,
) -> JsonFeedAdapter<SnapshotRepository> {
    let (policy, stale_after) = match providers.find_by_name(role) {
        Some(entry) => (entry.rate_policy(), entry.stale_after()),
        None => (RatePolicy::default(), DEFAULT_STALE_AFTER),
    };
    JsonFeedAdapter::new(role, feed_dir.to_path_buf(), snapshots, policy, stale_after)
}

fn print_run_summary(report: &matchday_core::SyncRunReport) {
    println!("Sync run {}", report.run_id);
    if report.forced_full_sync {
        println!("  (forced full sync hour)");
    }
    for (phase, outcome) in [
        ("results", &report.results),
        ("derived data", &report.derived_data),
        ("structural data", &report.structural_data),
    ] {
        if outcome.is_empty() {
            println!("  {:16} skipped", phase);
        } else {
            println!(
                "  {:16} {} scopes, {} ok, {} failed",
                phase, outcome.attempted, outcome.succeeded, outcome.failed
            );
        }
    }
    if report.cancelled {
        println!("  run was cancelled before completing");
    }
}

fn print_health(orchestrator: &Orchestrator) {
    println!("\nProvider health:");
    let fresh: std::collections::HashMap<String, bool> =
        orchestrator.health().availability().into_iter().collect();
    for status in orchestrator.health().all_statuses() {
        let detail = match &status.last_error {
            Some(error) if status.consecutive_failures > 0 => {
                format!(" ({} consecutive failures, last: {})", status.consecutive_failures, error)
            }
            _ => String::new(),
        };
        let data = if fresh.get(&status.provider).copied().unwrap_or(false) {
            "fresh"
        } else {
            "stale"
        };
        println!(
            "  {:12} {:9} data: {}{}",
            status.provider,
            status.health().as_str(),
            data,
            detail
        );
    }
}

async fn show_status(
    providers: &ProvidersConfig,
    checkpoints: &CheckpointRepository,
) -> anyhow::Result<()> {
    println!("Configured providers:");
    for entry in &providers.providers {
        println!(
            "  {:12} enabled={} batch_size={} cooldown={}s stale_after={}h",
            entry.name, entry.enabled, entry.batch_size, entry.cooldown_secs, entry.stale_after_hours
        );
    }

    let all = checkpoints.list_all().await?;
    if all.is_empty() {
        println!("\nNo backfills recorded.");
        return Ok(());
    }

    println!("\nBackfills:");
    for checkpoint in all {
        println!(
            "  {} / {}: {} [{} → {}], cursor {}, {} records",
            checkpoint.provider,
            checkpoint.scope,
            checkpoint.status,
            checkpoint.start_date,
            checkpoint.end_date,
            checkpoint.cursor,
            checkpoint.records_imported
        );
        if let Some(error) = checkpoint.last_error {
            println!("      last error: {}", error);
        }
    }
    Ok(())
}
