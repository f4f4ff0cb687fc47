//! TBM departures CLI
//!
//! Stop discovery, one-shot departure boards and a polling `watch` mode on
//! top of the `integration_tbm` feed.

#![allow(clippy::print_stdout)]

mod app_config;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use app_config::{AppConfig, stop_section};
use chrono::Utc;
use clap::{Parser, Subcommand};
use integration_tbm::{
    DepartureFeed, FeedCoordinator, HttpDepartureFeed, StopSelection, line_choices, resolve_stop,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// TBM departures CLI
#[derive(Parser)]
#[command(name = "tbm-cli")]
#[command(author, version, about = "Real-time TBM departures", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./tbm.toml when present)
    #[arg(short, long, env = "TBM_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search stops by name
    Search {
        /// Case-insensitive part of the stop name
        query: String,
    },

    /// Show a single stop
    Stop {
        /// Stop identifier
        id: String,
    },

    /// List lines and their destinations
    Lines,

    /// Show upcoming departures once
    ///
    /// Uses the `[stop]` section of the configuration unless `--stop` is given.
    Departures {
        /// Stop identifier
        #[arg(short, long)]
        stop: Option<String>,

        /// Restrict to one line
        #[arg(short, long)]
        line: Option<String>,
    },

    /// Poll the configured stop until interrupted
    Watch {
        /// Seconds between polls (overrides `poll.interval_secs`)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Check that the upstream API answers
    Check,

    /// Resolve a stop and print a configuration section for it
    ///
    /// Example: tbm-cli setup "Quinconces" --line bordeaux:Line:B:LOC
    Setup {
        /// Stop identifier or part of its name
        input: String,

        /// Line choice ("all" for every line)
        #[arg(short, long)]
        line: Option<String>,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Stop selection from command-line flags, falling back to the configuration
fn selection_for(config: &AppConfig, stop: Option<String>, line: Option<String>) -> Option<StopSelection> {
    let mut selection = match stop {
        Some(stop_id) => {
            let name = config
                .stop
                .as_ref()
                .filter(|known| known.stop_id == stop_id)
                .map(|known| known.stop_name.clone())
                .unwrap_or_default();
            StopSelection::new(stop_id, name)
        },
        None => config.stop.clone()?,
    };

    if let Some(line) = line {
        selection = StopSelection {
            line_id: None,
            ..selection
        };
        if line != integration_tbm::ALL_LINES {
            selection = selection.with_line(line);
        }
    }

    Some(selection)
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter_from_verbosity(cli.verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;
    debug!(backend = %config.feed.backend, base_url = config.feed.effective_base_url(), "Configuration loaded");

    let feed = HttpDepartureFeed::new(&config.feed)?;

    match cli.command {
        Commands::Search { query } => {
            let stops = feed.search_stops(&query).await?;
            if stops.is_empty() {
                println!("🔍 No stop matches '{query}'");
            }
            for stop in &stops {
                println!("{}", render::stop_entry(stop));
            }
        },

        Commands::Stop { id } => match feed.get_stop_by_id(&id).await? {
            Some(stop) => println!("{}", render::stop_entry(&stop)),
            None => {
                println!("❌ Unknown stop: {id}");
                std::process::exit(1);
            },
        },

        Commands::Lines => {
            for line in feed.get_lines().await? {
                println!("{}", render::line_entry(&line));
            }
        },

        Commands::Departures { stop, line } => {
            let Some(selection) = selection_for(&config, stop, line) else {
                bail!("no stop configured; pass --stop or run `tbm-cli setup` first");
            };

            let snapshot = feed.fetch_snapshot(&selection).await?;
            for row in render::snapshot_lines(&snapshot, usize::MAX, Utc::now()) {
                println!("{row}");
            }
        },

        Commands::Watch { interval } => {
            let Some(selection) = config.stop.clone() else {
                bail!("no stop configured; run `tbm-cli setup` first");
            };
            let every = Duration::from_secs(interval.unwrap_or(config.poll.interval_secs).max(1));
            let coordinator = FeedCoordinator::new(Arc::new(feed), selection);
            let mut ticker = tokio::time::interval(every);
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            info!(stop_id = %coordinator.selection().stop_id, interval_secs = every.as_secs(), "Watching");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = coordinator.refresh().await {
                            println!("⚠️  Refresh failed: {e}");
                        }
                        if let Some(snapshot) = coordinator.snapshot() {
                            println!();
                            for row in render::snapshot_lines(&snapshot, config.poll.max_listed, Utc::now()) {
                                println!("{row}");
                            }
                        }
                    },
                    _ = &mut shutdown => {
                        info!(polls = coordinator.poll_count(), failures = coordinator.failure_count(), "Stopped");
                        break;
                    },
                }
            }
        },

        Commands::Check => {
            if feed.check_reachable().await {
                println!("✅ {} API reachable", config.feed.backend);
            } else {
                println!("❌ {} API unreachable at {}", config.feed.backend, config.feed.effective_base_url());
                std::process::exit(1);
            }
        },

        Commands::Setup { input, line } => {
            let Some(stop) = resolve_stop(&feed, &input).await? else {
                println!("❌ No stop found for '{input}'");
                std::process::exit(1);
            };

            println!("🚏 {}", render::stop_entry(&stop));
            println!();
            println!("Lines:");
            for (value, label) in line_choices(&stop) {
                println!("   {value:<28} {label}");
            }

            let selection = StopSelection::from_choice(&stop, line.as_deref().unwrap_or_default());
            println!();
            println!("📋 Add to tbm.toml:");
            println!();
            println!("{}", stop_section(&selection)?);
        },
    }

    Ok(())
}
