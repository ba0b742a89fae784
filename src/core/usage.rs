//! Usage recording and monthly quota.
//!
//! Every facade call appends a row to the backend `api_usage` table. Writing
//! that row is best effort: a failure or a write slower than the record
//! timeout is logged at `warn` and never reaches the caller.
//!
//! Quota reads fetch only the current month's rows (`created_at=gte.<month
//! start>`); the all-time total is a server-side count.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::clock::SharedClock;
use super::models::{UsageAction, UsageOutcome, UsageRecord};
use crate::error::{PortalError, Result};
use crate::storage::backend::{BackendClient, Filter};
use crate::util::month_start;

/// Default bound on a usage write.
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(2);

const USAGE_COLUMNS: &str = "query_type,created_at,metadata";

/// Backend table holding usage rows.
pub const USAGE_TABLE: &str = "api_usage";

/// Per-user usage counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    /// Calls of any kind this calendar month.
    pub current_month: u32,
    /// Property lookups this month that count against the limit.
    pub lookups_this_month: u32,
    /// Calls of any kind, ever.
    pub total: u64,
    pub limit: u32,
    /// This month's calls by action.
    pub by_type: BTreeMap<String, u32>,
    /// This month's calls by day (`YYYY-MM-DD`).
    pub daily: BTreeMap<String, u32>,
}

impl UsageSummary {
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.lookups_this_month)
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.lookups_this_month >= self.limit
    }

    /// Month counts from `api_usage` rows as of `now`. Rows from before the
    /// month are ignored; `total` is left for the caller.
    fn from_month_rows(rows: &[UsageRow], limit: u32, now: DateTime<Utc>) -> Self {
        let start = month_start(now);
        let mut summary = Self {
            limit,
            ..Self::default()
        };

        for row in rows {
            let Some(created) = row.created_at() else {
                continue;
            };
            if created < start {
                continue;
            }
            summary.current_month += 1;
            *summary.by_type.entry(row.query_type.clone()).or_default() += 1;
            *summary
                .daily
                .entry(created.format("%Y-%m-%d").to_string())
                .or_default() += 1;
            if row.query_type == UsageAction::PropertySearch.as_str() && !row.failed() {
                summary.lookups_this_month += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Deserialize)]
struct UsageRow {
    query_type: String,
    created_at: String,
    #[serde(default)]
    metadata: Value,
}

impl UsageRow {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn failed(&self) -> bool {
        self.metadata
            .get("outcome")
            .and_then(Value::as_str)
            .is_some_and(|o| o.starts_with("error:"))
    }
}

/// Writes usage rows and reads them back for quota checks.
#[derive(Debug, Clone)]
pub struct UsageRecorder {
    backend: BackendClient,
    clock: SharedClock,
    record_timeout: Duration,
}

impl UsageRecorder {
    #[must_use]
    pub const fn new(backend: BackendClient, clock: SharedClock) -> Self {
        Self {
            backend,
            clock,
            record_timeout: DEFAULT_RECORD_TIMEOUT,
        }
    }

    /// Give up on a usage write after `timeout`.
    #[must_use]
    pub const fn with_record_timeout(mut self, timeout: Duration) -> Self {
        self.record_timeout = timeout;
        self
    }

    /// Append a usage row. Never fails and waits at most the record timeout.
    pub async fn record(&self, user_id: &str, action: UsageAction, query: &str, outcome: &UsageOutcome) {
        if !self.backend.is_configured() {
            tracing::debug!(action = action.as_str(), "No backend configured, usage not recorded");
            return;
        }
        let record = UsageRecord {
            user_id: user_id.to_string(),
            action,
            query: query.to_string(),
            timestamp: self.clock.now(),
            metadata: json!({ "outcome": outcome.label() }),
        };

        let row = match serde_json::to_value(&record) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(action = action.as_str(), error = %e, "Failed to encode usage record");
                return;
            }
        };

        let write = tokio::time::timeout(self.record_timeout, self.backend.insert(USAGE_TABLE, &row));
        match write.await {
            Ok(Ok(_)) => tracing::debug!(
                user_id,
                action = action.as_str(),
                outcome = %outcome.label(),
                "Recorded usage"
            ),
            Ok(Err(e)) => tracing::warn!(
                user_id,
                action = action.as_str(),
                error_code = e.error_code(),
                error = %e,
                "Failed to record usage"
            ),
            Err(_) => tracing::warn!(
                user_id,
                action = action.as_str(),
                timeout_ms = u64::try_from(self.record_timeout.as_millis()).unwrap_or(u64::MAX),
                "Failed to record usage: backend too slow"
            ),
        }
    }

    /// Detached [`record`](Self::record) for callers that must not wait.
    pub fn spawn_record(
        &self,
        user_id: String,
        action: UsageAction,
        query: String,
        outcome: UsageOutcome,
    ) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(
            async move {
                recorder.record(&user_id, action, &query, &outcome).await;
            }
            .in_current_span(),
        )
    }

    /// Usage counts for `user_id`. A backend that reports no row total
    /// gives this month's count as `total`.
    pub async fn summary(&self, user_id: &str, limit: u32) -> Result<UsageSummary> {
        let mut summary = self.month_summary(user_id, limit).await?;
        let total = self
            .backend
            .count(USAGE_TABLE, &[Filter::eq("user_id", user_id)])
            .await?;
        summary.total = total.unwrap_or(0).max(u64::from(summary.current_month));
        Ok(summary)
    }

    /// Counts over the current calendar month only.
    async fn month_summary(&self, user_id: &str, limit: u32) -> Result<UsageSummary> {
        let now = self.clock.now();
        let rows = self
            .backend
            .select(
                USAGE_TABLE,
                USAGE_COLUMNS,
                &[
                    Filter::eq("user_id", user_id),
                    Filter::gte("created_at", month_start(now).to_rfc3339()),
                ],
                None,
            )
            .await?;

        let rows: Vec<UsageRow> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();
        Ok(UsageSummary::from_month_rows(&rows, limit, now))
    }

    /// Fail with `QuotaExceeded` once the month's lookups reach `limit`.
    /// An unreadable usage table does not block the caller.
    pub async fn check_quota(&self, user_id: &str, limit: u32) -> Result<()> {
        if !self.backend.is_configured() {
            return Ok(());
        }
        match self.month_summary(user_id, limit).await {
            Ok(summary) if summary.is_exhausted() => Err(PortalError::QuotaExceeded {
                used: summary.lookups_this_month,
                limit,
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(user_id, error_code = e.error_code(), "Could not read usage, skipping quota check");
                Ok(())
            }
        }
    }
}
