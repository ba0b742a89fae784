//! `check` command: configuration and secrets sanity checks.
//!
//! Offline by default. `--online` also signs in to the identity service and
//! queries the property API, concurrently.

use futures::future::join;
use serde::Serialize;

use super::args::{CheckArgs, Cli};
use super::emit;
use crate::core::clock::system_clock;
use crate::core::models::ErrorReport;
use crate::error::{PortalError, Result};
use crate::render::{RenderOptions, human, render};
use crate::services::Portal;
use crate::storage::config::ResolvedConfig;
use crate::storage::secrets::{CredentialStore, Service};

/// Payload of the `check` command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub config_path: String,
    pub config_source: String,
    pub config_exists: bool,
    pub secrets_path: String,
    pub secrets_source: String,
    pub services: Vec<ServiceCheck>,
    pub connections: Vec<ConnectionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheck {
    pub service: &'static str,
    pub name: &'static str,
    pub configured: bool,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionResult {
    pub service: &'static str,
    pub ok: bool,
    pub error: Option<ErrorReport>,
}

impl CheckReport {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.connections.iter().all(|c| c.ok)
    }
}

/// Execute the `check` command.
///
/// # Errors
///
/// Configuration or secrets errors, and the first failed connection when
/// `--online` is given.
pub async fn execute(cli: &Cli, args: &CheckArgs, options: RenderOptions) -> Result<()> {
    let resolved = ResolvedConfig::resolve(cli)?;
    let store = CredentialStore::load(&resolved.secrets_path)?;

    let services = Service::ALL
        .iter()
        .map(|&service| {
            let creds = store.get(service).ok();
            ServiceCheck {
                service: service.name(),
                name: service.display_name(),
                configured: creds.is_some(),
                base_url: creds.map(|c| c.base_url.clone()),
            }
        })
        .collect();

    let mut failures = Vec::new();
    let connections = if args.online {
        let portal = Portal::new(&store, resolved.config.clone(), system_clock())?;
        check_connections(&portal, &mut failures).await
    } else {
        Vec::new()
    };

    let report = CheckReport {
        config_path: resolved.config_path.display().to_string(),
        config_source: resolved.sources.config_path.to_string(),
        config_exists: resolved.config_path.exists(),
        secrets_path: resolved.secrets_path.display().to_string(),
        secrets_source: resolved.sources.secrets_path.to_string(),
        services,
        connections,
    };
    emit(&render("check", &report, options, human::render_check)?);

    match failures.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn check_connections(portal: &Portal, failures: &mut Vec<PortalError>) -> Vec<ConnectionResult> {
    let properties = portal.properties();
    let (identity, property) = join(portal.login(), properties.check_connection()).await;

    let mut connections = Vec::new();
    for (service, result) in [
        (Service::Identity, identity.map(|_| ())),
        (Service::PropertyData, property),
    ] {
        match result {
            Ok(()) => connections.push(ConnectionResult {
                service: service.name(),
                ok: true,
                error: None,
            }),
            Err(PortalError::AuthNotConfigured { .. }) => {
                tracing::debug!(service = service.name(), "Not configured, connection check skipped");
            }
            Err(err) => {
                connections.push(ConnectionResult {
                    service: service.name(),
                    ok: false,
                    error: Some(ErrorReport::from(&err)),
                });
                failures.push(err);
            }
        }
    }
    connections
}
