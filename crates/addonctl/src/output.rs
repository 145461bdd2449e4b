//! Terminal output utilities

use addonctl_core::types::{Diagnostic, Severity};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Print a diagnostic to stderr, styled by severity
pub fn diagnostic(d: &Diagnostic) {
    let code = style(d.code.as_str()).dim();
    let line = match &d.addon {
        Some(addon) => format!("{} {} {}", code, style(addon).bold(), d.message),
        None => format!("{} {}", code, d.message),
    };
    match d.severity {
        Severity::Fatal | Severity::Error => error(&line),
        Severity::Warning => warning(&line),
        Severity::Info => eprintln!("{} {}", style("ℹ").blue().bold(), line),
    }
}

/// Create a progress bar
pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb
}
