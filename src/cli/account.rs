//! `whoami` and `usage` commands.

use serde::Serialize;

use super::emit;
use crate::core::token::UserSession;
use crate::core::usage::UsageSummary;
use crate::error::Result;
use crate::render::{RenderOptions, human, render};
use crate::services::Portal;

/// Execute the `whoami` command.
pub async fn whoami(portal: &Portal, options: RenderOptions) -> Result<()> {
    let session = portal.login().await?;
    emit(&render("whoami", &session, options, human::render_session)?);
    Ok(())
}

/// Payload of the `usage` command.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub user: UserSession,
    pub summary: UsageSummary,
    pub remaining: u32,
}

/// Execute the `usage` command.
pub async fn usage(portal: &Portal, options: RenderOptions) -> Result<()> {
    let user = portal.login().await?;
    let summary = portal.usage_summary(&user).await?;
    let report = UsageReport {
        remaining: summary.remaining(),
        user,
        summary,
    };
    emit(&render("usage", &report, options, human::render_usage)?);
    Ok(())
}
