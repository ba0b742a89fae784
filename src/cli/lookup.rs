//! `lookup` command.

use chrono::Datelike;
use serde::Serialize;
use serde_json::json;

use super::args::LookupArgs;
use super::emit;
use crate::core::analysis::{PropertyAnalysis, analyze_property};
use crate::core::models::PropertyRecord;
use crate::error::Result;
use crate::render::{RenderOptions, human, render};
use crate::services::{Portal, PropertyLookup};

/// Payload of the `lookup` command.
#[derive(Debug, Clone, Serialize)]
pub struct LookupReport {
    #[serde(flatten)]
    pub lookup: PropertyLookup,
    pub analysis: Option<PropertyAnalysis>,
    /// The portfolio row written by `--save`.
    pub saved: Option<PropertyRecord>,
}

/// Execute the `lookup` command.
pub async fn execute(portal: &Portal, args: &LookupArgs, options: RenderOptions) -> Result<()> {
    let user = portal.login().await?;
    let lookup = portal
        .properties()
        .lookup_property(&user, &args.address)
        .await?;

    let current_year = portal.clock().now().year();
    let analysis = lookup
        .details
        .as_ref()
        .map(|details| analyze_property(details, current_year));

    let saved = match (&lookup.details, args.save) {
        (Some(details), true) => {
            let params = json!({ "address": lookup.query.address });
            Some(
                portal
                    .portfolio()
                    .save_property(&user, details, params)
                    .await?,
            )
        }
        (None, true) => {
            tracing::info!("Nothing to save, no property matched");
            None
        }
        _ => None,
    };

    let report = LookupReport {
        lookup,
        analysis,
        saved,
    };
    emit(&render("lookup", &report, options, human::render_lookup)?);
    Ok(())
}
