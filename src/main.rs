mod adapters;
mod app;
mod cli;
mod config;
mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// Route `tracing` output to stderr. `RUST_LOG` wins over the CLI flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Cli::parse();

    init_tracing(args.verbose, args.quiet);
    cli::context::init(args.data_dir.as_deref());

    let result = match &args.command {
        Commands::Init => cli::commands::init::execute(args.verbose),
        Commands::Serve { bind } => cli::commands::serve::execute(bind.as_deref()),
        Commands::Seed => cli::commands::seed::execute(),
        Commands::Log { user, since, last } => {
            cli::commands::log::execute(user.as_deref(), since.as_deref(), *last)
        }
        Commands::Status => cli::commands::status::execute(),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}
