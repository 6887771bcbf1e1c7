use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use colored::Colorize;

use crate::cli::{context, output};
use crate::core::errors::{Result, SitecheckError};
use crate::core::models::activity_entry::{ActivityAction, ActivityEntry};

/// Execute the `sitecheck log` command.
///
/// Displays the activity log newest first, with optional filters for
/// user, date, and entry count.
pub fn execute(user: Option<&str>, since: Option<&str>, last: Option<usize>) -> Result<()> {
    let (_config, app) = context::open_app()?;

    // Parse the --since flag as a date
    let since_dt = since.map(parse_since).transpose()?;

    let entries = app.activities.query(user, since_dt)?;

    if entries.is_empty() {
        output::header("sitecheck log");
        output::warning("No activity entries found");
        if user.is_some() || since.is_some() {
            println!("  Try removing filters to see all entries.");
        }
        return Ok(());
    }

    let display: Vec<&ActivityEntry> = entries.iter().take(last.unwrap_or(usize::MAX)).collect();

    output::header(&format!("sitecheck log ({} entries)", display.len()));
    println!();

    for entry in &display {
        print_entry(entry);
    }

    Ok(())
}

/// Parse a date string (ISO 8601: `YYYY-MM-DD`) into a UTC DateTime.
fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| {
            SitecheckError::validation(format!(
                "Invalid date format: '{s}'. Expected ISO 8601 (YYYY-MM-DD), e.g. 2026-01-15"
            ))
        })
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

/// Print a single activity entry as a formatted row.
fn print_entry(entry: &ActivityEntry) {
    let date = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let target = format!("{} {}", entry.entity_type, entry.entity_id);

    println!(
        "  {} {} {:<16} {:<12} {} {}",
        date.to_string().dimmed(),
        "│".dimmed(),
        format_action(entry.action),
        entry.user_id,
        target,
        entry.details.dimmed(),
    );
}

/// Format an action as a colored string.
fn format_action(action: ActivityAction) -> String {
    let label = action.to_string();
    match action {
        ActivityAction::Create | ActivityAction::Upload => label.green().to_string(),
        ActivityAction::Update => label.blue().to_string(),
        ActivityAction::Delete => label.red().to_string(),
        ActivityAction::Submit | ActivityAction::SubmitApproval => label.cyan().to_string(),
        ActivityAction::Check | ActivityAction::Approve => label.yellow().to_string(),
    }
}
