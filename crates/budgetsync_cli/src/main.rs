//! BudgetSync CLI
//!
//! Offline tools for budget snapshot payloads.
//!
//! # Commands
//!
//! - `inspect` - Build a replica from a payload and summarize it
//! - `merge` - Apply a delta payload to a base payload
//! - `diff` - Compare two payloads the way the drift check does
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BudgetSync command-line tools.
#[derive(Parser)]
#[command(name = "budgetsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a replica from a payload and summarize it
    Inspect {
        /// Payload file (saved response, API envelope or bare snapshot)
        snapshot: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Apply a delta payload to a base payload
    Merge {
        /// Base payload file
        base: PathBuf,

        /// Delta payload file
        delta: PathBuf,

        /// Write the merged payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare a merged payload against a full export; exits 1 on drift
    Diff {
        /// Merged payload file
        merged: PathBuf,

        /// Full export payload file
        truth: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { snapshot, format } => {
            commands::inspect::run(&snapshot, &format)?;
        }
        Commands::Merge {
            base,
            delta,
            output,
        } => {
            commands::merge::run(&base, &delta, output.as_deref())?;
        }
        Commands::Diff {
            merged,
            truth,
            format,
        } => {
            if commands::diff::run(&merged, &truth, &format)? {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("BudgetSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
