//! shelfdb CLI
//!
//! Command-line tools for shelfdb data directories.
//!
//! # Commands
//!
//! - `inspect` - Display per-partition record counts and sizes
//! - `verify` - Check that every record file is well formed

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shelfdb command-line data directory tools.
#[derive(Parser)]
#[command(name = "shelfdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database root directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display partition statistics
    Inspect {
        /// List every record file
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify record files
    Verify {
        /// Also parse contents as `{ key: value , ... }` records
        #[arg(short, long)]
        decode: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { records, format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, records, &format)?;
        }
        Commands::Verify { decode } => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, decode)?;
        }
        Commands::Version => {
            println!("shelfdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("shelfdb Core v{}", shelfdb_core::VERSION);
        }
    }

    Ok(())
}
