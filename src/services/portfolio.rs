//! Saved properties in the backend `properties` table.
//!
//! Rows are keyed by `(user_id, property_hash)`. Saving the same property
//! twice overwrites the earlier row; there is no optimistic concurrency.

use serde_json::Value;

use super::log_failure;
use crate::core::clock::SharedClock;
use crate::core::models::{PropertyDetails, PropertyRecord, UsageAction, UsageOutcome};
use crate::core::token::UserSession;
use crate::core::usage::UsageRecorder;
use crate::error::{PortalError, Result};
use crate::storage::backend::{BackendClient, Filter, Order};
use crate::storage::secrets::Service;

pub const PROPERTIES_TABLE: &str = "properties";
const CONFLICT_KEY: &str = "user_id,property_hash";

#[derive(Debug, Clone)]
pub struct PortfolioService {
    backend: BackendClient,
    usage: UsageRecorder,
    clock: SharedClock,
}

impl PortfolioService {
    #[must_use]
    pub const fn new(backend: BackendClient, usage: UsageRecorder, clock: SharedClock) -> Self {
        Self {
            backend,
            usage,
            clock,
        }
    }

    /// Save `details` to the user's portfolio, replacing any earlier save of
    /// the same property.
    pub async fn save_property(
        &self,
        user: &UserSession,
        details: &PropertyDetails,
        search_params: Value,
    ) -> Result<PropertyRecord> {
        let record = PropertyRecord {
            id: None,
            saved_by_user: user.user_id.clone(),
            property_hash: details.property_hash(),
            attributes: details.clone(),
            search_params,
            created_at: None,
            saved_at: Some(self.clock.now()),
        };

        let result = self.upsert(&record).await;
        if let Err(e) = &result {
            log_failure(UsageAction::PropertySave.as_str(), e);
        }
        self.usage
            .record(
                &user.user_id,
                UsageAction::PropertySave,
                &record.address(),
                &UsageOutcome::from_result(&result, false),
            )
            .await;
        result
    }

    async fn upsert(&self, record: &PropertyRecord) -> Result<PropertyRecord> {
        let row = serde_json::to_value(record)?;
        let stored = self
            .backend
            .upsert(PROPERTIES_TABLE, &row, CONFLICT_KEY)
            .await?;
        tracing::info!(property_hash = %record.property_hash, "Saved property");

        if stored.is_null() {
            return Ok(record.clone());
        }
        serde_json::from_value(stored).map_err(|e| parse_error(&e))
    }

    /// The user's saved properties, most recently saved first. Rows that no
    /// longer decode are skipped.
    pub async fn list_properties(&self, user: &UserSession) -> Result<Vec<PropertyRecord>> {
        let rows = self
            .backend
            .select(
                PROPERTIES_TABLE,
                "*",
                &[Filter::eq("user_id", &user.user_id)],
                Some(Order::desc("updated_at")),
            )
            .await?;

        let total = rows.len();
        let records: Vec<PropertyRecord> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable property row");
                    None
                }
            })
            .collect();
        tracing::debug!(total, decoded = records.len(), "Listed properties");
        Ok(records)
    }

    /// Delete one saved property. Only rows owned by `user` are touched.
    pub async fn delete_property(&self, user: &UserSession, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(PortalError::validation(
                "id",
                "Property id must be a positive number",
            ));
        }

        let result = self
            .backend
            .delete(
                PROPERTIES_TABLE,
                &[Filter::eq("id", id), Filter::eq("user_id", &user.user_id)],
            )
            .await;
        if let Err(e) = &result {
            log_failure(UsageAction::PropertyDelete.as_str(), e);
        }
        self.usage
            .record(
                &user.user_id,
                UsageAction::PropertyDelete,
                &format!("id:{id}"),
                &UsageOutcome::from_result(&result, false),
            )
            .await;
        result
    }
}

fn parse_error(err: &serde_json::Error) -> PortalError {
    PortalError::ParseResponse {
        service: Service::Backend.name().to_string(),
        message: err.to_string(),
    }
}
