//! Error rendering.
//!
//! Human mode prints the user-facing message, the stable error code and fix
//! suggestions. JSON mode prints the failure envelope. Neither includes
//! upstream bodies or credential material.

use colored::Colorize;

use super::RenderOptions;
use super::robot::render_failure;
use crate::cli::args::OutputFormat;
use crate::error::{FixSuggestion, PortalError};
use crate::util::env::stderr_is_tty;

/// Render `error` for stderr.
#[must_use]
pub fn render_error(error: &PortalError, command: &str, options: RenderOptions) -> String {
    match options.format {
        OutputFormat::Json => {
            render_failure(command, error, options.pretty).unwrap_or_else(|_| render_simple(error))
        }
        OutputFormat::Human if !options.no_color && stderr_is_tty() => render_styled(error),
        OutputFormat::Human => render_simple(error),
    }
}

fn render_styled(error: &PortalError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![format!(
        "{} {}",
        error.user_message().red().bold(),
        format!("[{}]", error.error_code()).dimmed()
    )];

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("How to fix:".bold().to_string());
        lines.extend(suggestion_lines(&suggestions, |cmd| cmd.cyan().to_string()));
    }

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            lines.push(String::new());
            lines.push("Why this happened:".yellow().to_string());
            lines.push(format!("  {}", first.context));
        }
        if let Some(prevention) = &first.prevention {
            lines.push(String::new());
            lines.push("Prevention:".green().to_string());
            lines.push(format!("  {prevention}"));
        }
    }

    lines.join("\n")
}

/// Plain text: message, code and the first runnable suggestion.
fn render_simple(error: &PortalError) -> String {
    let mut lines = vec![format!(
        "Error [{}]: {}",
        error.error_code(),
        error.user_message()
    )];

    let first_command = error
        .fix_suggestions()
        .into_iter()
        .flat_map(|s| s.commands)
        .find(|cmd| !cmd.starts_with('#'));
    if let Some(cmd) = first_command {
        lines.push(format!("Fix: {cmd}"));
    }

    lines.join("\n")
}

fn suggestion_lines(
    suggestions: &[FixSuggestion],
    style: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, suggestion) in suggestions.iter().enumerate() {
        for (j, cmd) in suggestion.commands.iter().enumerate() {
            let prefix = if j == 0 {
                format!("  {}. ", i + 1)
            } else {
                "     Or: ".to_string()
            };
            lines.push(format!("{prefix}{}", style(cmd)));
        }
    }
    lines
}
