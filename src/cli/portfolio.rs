//! `portfolio` commands.

use serde::Serialize;
use serde_json::json;

use super::args::PortfolioCommand;
use super::emit;
use crate::core::analysis::{PortfolioMetrics, portfolio_metrics};
use crate::core::models::PropertyRecord;
use crate::error::Result;
use crate::render::{RenderOptions, human, render};
use crate::services::Portal;

/// Payload of `portfolio list`.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub properties: Vec<PropertyRecord>,
    pub metrics: PortfolioMetrics,
}

/// Execute a `portfolio` subcommand.
pub async fn execute(portal: &Portal, command: &PortfolioCommand, options: RenderOptions) -> Result<()> {
    let user = portal.login().await?;
    let service = portal.portfolio();

    match command {
        PortfolioCommand::List => {
            let properties = service.list_properties(&user).await?;
            let report = PortfolioReport {
                metrics: portfolio_metrics(&properties),
                properties,
            };
            emit(&render("portfolio.list", &report, options, human::render_portfolio)?);
        }
        PortfolioCommand::Delete { id } => {
            service.delete_property(&user, *id).await?;
            let payload = json!({ "deleted": id });
            emit(&render("portfolio.delete", &payload, options, |_, no_color| {
                human::render_deleted(*id, no_color)
            })?);
        }
    }
    Ok(())
}
