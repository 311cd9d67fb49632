use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use sniper::config::Config;

#[derive(Parser)]
#[command(
    name = "sniper",
    version,
    about = "Identifier availability monitor with round-robin worker scheduling",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML config file (environment variables are used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how identifiers would be partitioned across workers
    Plan {
        /// Number of workers
        #[arg(short, long)]
        workers: usize,

        /// Number of rounds of checklists to print
        #[arg(short, long, default_value = "3")]
        rounds: u64,

        /// Identifiers to partition
        #[arg(required = true)]
        identifiers: Vec<String>,
    },

    /// Run the monitor against simulated workers
    Simulate {
        /// Number of simulated workers
        #[arg(short, long, default_value = "3")]
        workers: usize,

        /// Identifiers that become available during the run
        #[arg(short, long, num_args = 1..)]
        available: Vec<String>,

        /// Lookups before an available identifier stops resolving
        #[arg(long, default_value = "2")]
        available_after: u64,

        /// Divide configured pacing by this factor
        #[arg(long, default_value = "10")]
        speedup: u32,

        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Identifiers that stay taken
        identifiers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(&config.logging.level, format, cli.verbose)?;

    match cli.command {
        Commands::Plan {
            workers,
            rounds,
            identifiers,
        } => {
            tracing::debug!(workers, rounds, "Starting plan command");
            commands::plan(workers, identifiers, rounds).await?;
        }

        Commands::Simulate {
            workers,
            available,
            available_after,
            speedup,
            timeout_secs,
            identifiers,
        } => {
            tracing::info!(
                workers,
                available = available.len(),
                speedup,
                "Starting simulate command"
            );
            commands::simulate(
                config,
                commands::SimulateParams {
                    workers,
                    identifiers,
                    available,
                    available_after,
                    speedup,
                    timeout_secs,
                },
            )
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(level: &str, format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sniper=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("sniper={level},warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
