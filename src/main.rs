//! Binary entry point for freshwire.
//!
//! Operator surface over the deduplication engine: evaluate and ingest
//! article batches, inspect fingerprints, reset key families, and drive the
//! crosspost and topic trackers by hand.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes to stdout, diagnostics to stderr
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{CrosspostAction, TopicsAction};
use freshwire::config::FreshwireConfig;
use freshwire::observability::{self, InitOptions};
use freshwire::{DeduplicationService, RecencyStore};
use std::path::PathBuf;
use std::process::ExitCode;

/// Freshwire - content freshness and deduplication for news generators.
#[derive(Parser)]
#[command(name = "freshwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "FRESHWIRE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics while the command runs.
    #[arg(long, global = true)]
    expose_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Evaluate articles without recording anything.
    Evaluate {
        /// JSON file with one article or an array; `-` reads stdin.
        file: PathBuf,
    },

    /// Evaluate articles and commit the novel ones.
    Ingest {
        /// JSON file with one article or an array; `-` reads stdin.
        file: PathBuf,

        /// Evaluate only; commit nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print both fingerprints of each article.
    Fingerprint {
        /// JSON file with one article or an array; `-` reads stdin.
        file: PathBuf,
    },

    /// Delete every key of the given families.
    Reset {
        /// Families to reset, or `all`.
        #[arg(required = true)]
        families: Vec<String>,

        /// Scan by prefix instead of using the key registry.
        #[arg(long)]
        scan: bool,
    },

    /// List the live keys of a family.
    Keys {
        /// Family name.
        family: String,
    },

    /// Check or mark crosspost destinations.
    Crosspost {
        /// Crosspost subcommand.
        #[command(subcommand)]
        action: CrosspostAction,
    },

    /// Record or inspect topic coverage.
    Topics {
        /// Topics subcommand.
        #[command(subcommand)]
        action: TopicsAction,
    },

    /// Show store health and effective configuration.
    Status,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

/// Engine over the configured backend.
pub type Engine = DeduplicationService<dyn RecencyStore>;

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Completions need neither configuration nor a store
    if let Commands::Completions { shell } = cli.command {
        commands::cmd_completions(shell);
        return ExitCode::SUCCESS;
    }

    let config = match FreshwireConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: cli.expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config, &observability) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    command: Commands,
    config: &FreshwireConfig,
    observability: &observability::ObservabilityHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine: Engine = DeduplicationService::new(config.build_store()?, config.dedup.clone())?;

    match command {
        Commands::Evaluate { file } => commands::cmd_evaluate(&engine, &file),
        Commands::Ingest { file, dry_run } => commands::cmd_ingest(&engine, &file, dry_run),
        Commands::Fingerprint { file } => commands::cmd_fingerprint(&engine, &file),
        Commands::Reset { families, scan } => commands::cmd_reset(&engine, &families, scan),
        Commands::Keys { family } => commands::cmd_keys(&engine, &family),
        Commands::Crosspost { action } => commands::cmd_crosspost(&engine, action),
        Commands::Topics { action } => commands::cmd_topics(&engine, action),
        Commands::Status => commands::cmd_status(&engine, config, observability),
        Commands::Completions { shell } => {
            commands::cmd_completions(shell);
            Ok(())
        },
    }
}
