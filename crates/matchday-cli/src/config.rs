use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "matchday")]
#[command(
    author,
    version,
    about = "Phased sync and temporal snapshots for sports data feeds"
)]
#[command(after_help = "Examples:
  matchday sync                                    # One orchestrator run
  matchday sync --results-only                     # Refresh results, skip cascades
  matchday run --interval 900                      # Scheduled runs every 15 minutes
  matchday backfill --provider results --scope premier-league \\
      --from 2023-08-01 --to 2024-05-31
  matchday as-of --entity team:arsenal --scope premier-league --date 2024-11-03
  matchday status")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Directory holding provider feed documents
    #[arg(long, env = "MATCHDAY_FEED_DIR", default_value = "./feeds")]
    pub feed_dir: PathBuf,

    /// Custom path to providers.toml configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one sync run over all tracked scopes
    #[command(after_help = "Examples:
  matchday sync                    # Full phased run
  matchday sync --results-only     # Phase 1 only, no cascades")]
    Sync {
        /// Refresh results only; skip the derived and structural phases
        #[arg(long)]
        results_only: bool,
    },
    /// Run the scheduler: sync on a fixed cadence until interrupted
    Run {
        /// Seconds between the end of one run and the start of the next
        #[arg(long, default_value = "900")]
        interval: u64,
    },
    /// Import a provider's archive over a date range, resumably
    #[command(after_help = "Example:
  matchday backfill --provider results --scope premier-league \\
      --from 2023-08-01 --to 2024-05-31 --chunk-days 7")]
    Backfill {
        /// Provider whose archive to import
        #[arg(short, long)]
        provider: String,

        /// Competition scope to import
        #[arg(short, long)]
        scope: String,

        /// First date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Calendar days per archive request
        #[arg(long, default_value = "7")]
        chunk_days: u32,
    },
    /// Read an entity's state as of a date
    AsOf {
        /// Entity identifier, e.g. team:arsenal
        #[arg(short, long)]
        entity: String,

        /// Competition scope
        #[arg(short, long)]
        scope: String,

        /// The as-of date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Show configured providers and backfill progress
    Status,
    /// Delete snapshot versions older than a cutoff date
    Prune {
        /// Competition scope to prune
        #[arg(short, long)]
        scope: String,

        /// Delete versions strictly before this date (YYYY-MM-DD)
        #[arg(long)]
        before: NaiveDate,
    },
}
