use crate::cli::{context, output};
use crate::core::errors::Result;
use crate::core::services::seed_service;

/// Execute the `sitecheck seed` command.
///
/// Restores the default projects, users and formats for any list that is
/// missing. Existing lists are never touched.
pub fn execute() -> Result<()> {
    let (_config, app) = context::open_app()?;
    let report = seed_service::seed_defaults(&app.store)?;

    output::header("sitecheck seed");
    if report.is_empty() {
        output::success("Default data already present, nothing to do");
        return Ok(());
    }

    for (label, count) in [
        ("projects", report.projects),
        ("users", report.users),
        ("formats", report.formats),
    ] {
        if count > 0 {
            output::success(&format!("Seeded {count} {label}"));
        }
    }
    Ok(())
}
