use std::fmt::Display;

use colored::Colorize;

/// Print a success message.
pub fn success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an error message to stderr.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Print a bold sub-section title.
pub fn section(title: &str) {
    println!("\n  {}", title.bold());
}

/// Print one bulleted line.
pub fn bullet(item: impl Display) {
    println!("  {} {item}", "•".dimmed());
}
