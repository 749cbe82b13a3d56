//! Headless tower-defense wave runner.
//!
//! Plays waves against a fixed tower layout with no renderer and prints a
//! JSON report. Logs go to stderr so stdout stays machine-readable.
//!
//! # Usage
//!
//! ```bash
//! # Default config, three waves
//! cargo run -p td_headless -- run
//!
//! # Custom config and seed, report to a file
//! cargo run -p td_headless -- run --config td.ron --seed 7 --output report.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use td_headless::runner::{load_config, HeadlessRunner, RunSettings};
use td_headless::HeadlessError;

#[derive(Parser)]
#[command(name = "td-headless")]
#[command(about = "Headless tower-defense wave runner for CI and soak testing")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play waves and print a JSON report
    Run {
        /// RON config file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of waves to play
        #[arg(short, long, default_value = "3")]
        waves: u32,

        /// Queue shuffle seed, overriding the config
        #[arg(long)]
        seed: Option<u64>,

        /// Fixed tick length in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose picks debug over info.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            config,
            waves,
            seed,
            tick_ms,
            output,
        } => {
            if let Err(e) = cmd_run(config, waves, seed, tick_ms, output) {
                tracing::error!(error = %e, "Run failed");
                std::process::exit(1);
            }
        }
    }
}

fn cmd_run(
    config: Option<PathBuf>,
    waves: u32,
    seed: Option<u64>,
    tick_ms: u64,
    output: Option<PathBuf>,
) -> Result<(), HeadlessError> {
    let mut core = load_config(config.as_deref())?;
    if let Some(seed) = seed {
        core.scheduler.seed = seed;
    }
    let settings = RunSettings {
        waves,
        tick_ms,
        ..RunSettings::default()
    };

    let report = HeadlessRunner::new(core, settings)?.run()?;
    if !report.all_cleanups_verified() {
        tracing::warn!("At least one cleanup left resources behind");
    }
    report.write_json(output.as_deref())
}
