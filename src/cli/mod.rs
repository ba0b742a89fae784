//! CLI argument parsing and command dispatch.

pub mod account;
pub mod args;
pub mod check;
pub mod lookup;
pub mod orders;
pub mod portfolio;

pub use args::{Cli, Commands, OutputFormat};

use crate::core::clock::system_clock;
use crate::error::Result;
use crate::services::Portal;
use crate::storage::config::ResolvedConfig;
use crate::storage::secrets::CredentialStore;

/// Resolve configuration, load secrets and wire up the portal.
///
/// # Errors
///
/// Configuration, secrets and client construction failures.
pub fn open_portal(cli: &Cli) -> Result<Portal> {
    let resolved = ResolvedConfig::resolve(cli)?;
    let store = CredentialStore::load(&resolved.secrets_path)?;
    let missing = store.missing_services();
    if !missing.is_empty() {
        tracing::debug!(?missing, "Some services have no credentials");
    }
    Portal::new(&store, resolved.config, system_clock())
}

/// Print a rendered payload to stdout.
pub(crate) fn emit(output: &str) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}
