use colored::Colorize;

use crate::app::App;
use crate::cli::{context, output};
use crate::config::app_config::{AppConfig, CONFIG_FILE};
use crate::core::errors::Result;
use crate::core::models::catalog::{Format, Project, User};
use crate::core::models::checklist::ChecklistStatus;
use crate::core::services::workflow_service::ChecklistFilter;

/// Execute the `sitecheck status` command.
///
/// Displays an overview of the data directory: configuration, workflow
/// policy, catalog sizes, checklists per status, and the activity log.
pub fn execute() -> Result<()> {
    let (config, app) = context::open_app()?;
    let data_dir = context::data_dir();

    output::header(&format!("Sitecheck v{}", config.sitecheck.version));
    println!("  Data dir: {}", data_dir.display().to_string().cyan());
    println!("  Config: {}", data_dir.join(CONFIG_FILE).display());
    println!("  Bind: {}", config.server.bind.cyan());

    print_policy(&config);
    print_catalog(&app)?;
    print_checklists(&app)?;

    let retained = app.activities.list(usize::MAX)?.len();
    output::section("Activity log");
    output::bullet(format!(
        "{retained} entries (keeps the newest {})",
        config.activity.retain
    ));

    Ok(())
}

fn print_policy(config: &AppConfig) {
    output::section("Workflow");
    let flag = |on: bool| if on { "on".green() } else { "off".dimmed() };
    output::bullet(format!(
        "strict transitions: {}",
        flag(config.workflow.strict_transitions)
    ));
    output::bullet(format!("enforce roles: {}", flag(config.workflow.enforce_roles)));
}

fn print_catalog(app: &App) -> Result<()> {
    let projects = app.catalog.list::<Project>()?.len();
    let users = app.catalog.list::<User>()?.len();
    let formats = app.catalog.list::<Format>()?.len();

    output::section("Catalog");
    if projects + users + formats == 0 {
        output::warning("No projects, users or formats");
        println!("  Run 'sitecheck seed' to restore the defaults.");
        return Ok(());
    }
    output::bullet(format!("{projects} projects"));
    output::bullet(format!("{users} users"));
    output::bullet(format!("{formats} formats"));
    Ok(())
}

fn print_checklists(app: &App) -> Result<()> {
    let checklists = app.workflow.list(&ChecklistFilter::default())?;
    output::section(&format!("Checklists ({})", checklists.len()));

    for status in ChecklistStatus::ALL {
        let count = checklists.iter().filter(|c| c.status == status).count();
        if count > 0 {
            output::bullet(format!("{:<10} {count}", status.as_str()));
        }
    }
    Ok(())
}
