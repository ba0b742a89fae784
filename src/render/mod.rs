//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::Result;

/// Rendering options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub no_color: bool,
}

/// Render `data` for `command` in the requested format.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn render<T: Serialize>(
    command: &str,
    data: &T,
    options: RenderOptions,
    human: impl FnOnce(&T, bool) -> String,
) -> Result<String> {
    match options.format {
        OutputFormat::Human => Ok(human(data, options.no_color)),
        OutputFormat::Json => robot::render_envelope(command, data, options.pretty),
    }
}
