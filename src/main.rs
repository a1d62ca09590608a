use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use playlog::cli::{reset, run, stats};
use playlog::config::Config;
use playlog::store::Store;

#[derive(Parser)]
#[command(name = "playlog")]
#[command(about = "Batch ETL loading song metadata and listening activity into a star schema")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "playlog.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full ETL pass (song metadata, then activity logs)
    Run {
        /// Override the configured song metadata directory
        #[arg(long)]
        song_dir: Option<PathBuf>,

        /// Override the configured activity log directory
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Log and skip files that fail instead of aborting the run
        #[arg(long)]
        keep_going: bool,
    },

    /// Drop and recreate all tables
    Reset,

    /// Show row counts per table
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config).unwrap_or_default();

    // Initialize store (creates the schema on first open)
    let mut store = Store::open(&config.database_path())?;

    match cli.command {
        Commands::Run {
            song_dir,
            log_dir,
            keep_going,
        } => {
            run::run(&mut store, &config, song_dir, log_dir, keep_going)?;
        }
        Commands::Reset => {
            reset::run(&store)?;
        }
        Commands::Stats => {
            stats::run(&store)?;
        }
    }

    Ok(())
}
