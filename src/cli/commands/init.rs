use crate::app::App;
use crate::cli::{context, output};
use crate::config::app_config::{AppConfig, CONFIG_FILE, DEFAULT_CONFIG};
use crate::core::errors::{Result, SitecheckError};
use crate::core::services::seed_service;

/// Execute the `sitecheck init` command.
///
/// Creates the data directory, writes the default config and seeds the
/// default projects, users and formats. Nothing is written to the activity log.
pub fn execute(verbose: bool) -> Result<()> {
    let data_dir = context::data_dir();
    let config_path = data_dir.join(CONFIG_FILE);

    if config_path.exists() {
        return Err(SitecheckError::AlreadyInitialized {
            path: data_dir.to_path_buf(),
        });
    }

    output::header("Sitecheck — Initializing data directory");

    std::fs::create_dir_all(data_dir)?;
    output::success(&format!("Created {}", data_dir.display()));

    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    output::success(&format!("Generated {CONFIG_FILE} with defaults"));

    let config = AppConfig::load(data_dir)?;
    let app = App::open(data_dir, &config)?;
    let report = seed_service::seed_defaults(&app.store)?;
    output::success(&format!(
        "Seeded {} projects, {} users, {} formats",
        report.projects, report.users, report.formats
    ));

    output::success("Data directory ready.\n");
    print_next_steps(verbose, &config.server.bind);

    Ok(())
}

fn print_next_steps(verbose: bool, bind: &str) {
    println!("  Next steps:");
    println!("    sitecheck serve            Start the API on {bind}");
    println!("    sitecheck status           Review the data directory");
    if verbose {
        println!();
        println!("  Set strict_transitions or enforce_roles under [workflow] in {CONFIG_FILE}");
        println!("  to tighten the sign-off rules.");
    }
}
