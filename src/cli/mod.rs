pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

/// Maker → Checker → Approver sign-off for construction QA checklists.
#[derive(Parser, Debug)]
#[command(name = "sitecheck", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding config.toml, the record store and photos
    #[arg(long, global = true, env = "SITECHECK_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory with default config and seed data
    Init,

    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Restore default projects, users and formats if they are missing
    Seed,

    /// Show activity history
    Log {
        /// Filter by user id
        #[arg(long)]
        user: Option<String>,
        /// Filter entries since this date (ISO 8601)
        #[arg(long)]
        since: Option<String>,
        /// Show last N entries
        #[arg(long)]
        last: Option<usize>,
    },

    /// Show configuration, entity counts and checklist progress
    Status,
}
