//! Property lookups against the property data API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::log_failure;
use crate::core::http::{ApiClient, ApiRequest};
use crate::core::models::{AddressQuery, PropertyDetails, UsageAction, UsageOutcome};
use crate::core::token::UserSession;
use crate::core::usage::UsageRecorder;
use crate::error::{PortalError, Result};
use crate::storage::secrets::Service;

const PROPERTIES_PATH: &str = "/properties";

/// Property type sent with every lookup.
pub const PROPERTY_TYPE: &str = "Single Family";

/// Fixed sample query for connectivity checks.
const SAMPLE_QUERY: [(&str, &str); 4] = [
    ("address", "123 Main St"),
    ("city", "Los Angeles"),
    ("state", "CA"),
    ("propertyType", PROPERTY_TYPE),
];

/// Result of [`PropertyService::lookup_property`].
#[derive(Debug, Clone, Serialize)]
pub struct PropertyLookup {
    pub query: AddressQuery,
    /// First matching record; `None` when the API knows no such address.
    pub details: Option<PropertyDetails>,
    /// Raw upstream payload, shared with the response cache.
    #[serde(skip)]
    pub payload: Arc<Value>,
    pub from_cache: bool,
    /// When the payload was fetched from upstream.
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PropertyService {
    api: Arc<ApiClient>,
    usage: UsageRecorder,
    ttl: Duration,
    monthly_limit: u32,
}

impl PropertyService {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>, usage: UsageRecorder, ttl: Duration, monthly_limit: u32) -> Self {
        Self {
            api,
            usage,
            ttl,
            monthly_limit,
        }
    }

    /// Look up one address for `user`.
    ///
    /// Repeated lookups of the same address within the cache TTL return the
    /// same payload without an upstream call. Every lookup that reaches the
    /// request layer is recorded as usage.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address, `QuotaExceeded` once the user's
    /// monthly lookups are used up, and any request-layer error.
    pub async fn lookup_property(&self, user: &UserSession, address: &str) -> Result<PropertyLookup> {
        let query = AddressQuery::parse(address)?;
        self.usage
            .check_quota(&user.user_id, self.monthly_limit)
            .await?;

        let result = self.fetch(query.clone()).await;
        let from_cache = result.as_ref().is_ok_and(|lookup| lookup.from_cache);
        if let Err(e) = &result {
            log_failure(UsageAction::PropertySearch.as_str(), e);
        }
        self.usage
            .record(
                &user.user_id,
                UsageAction::PropertySearch,
                &query.address,
                &UsageOutcome::from_result(&result, from_cache),
            )
            .await;
        result
    }

    async fn fetch(&self, query: AddressQuery) -> Result<PropertyLookup> {
        let request = ApiRequest::get(Service::PropertyData, PROPERTIES_PATH)
            .param("address", query.address.clone())
            .param("propertyType", PROPERTY_TYPE)
            .cache_for(self.ttl);
        let outcome = self.api.call(&request).await?;
        let details = first_property(&outcome.payload)?;

        tracing::info!(
            found = details.is_some(),
            from_cache = outcome.from_cache,
            attempts = outcome.attempts,
            "Property lookup complete"
        );

        Ok(PropertyLookup {
            query,
            details,
            payload: outcome.payload,
            from_cache: outcome.from_cache,
            fetched_at: outcome.stored_at,
        })
    }

    /// Query the property API with a fixed sample address. Not cached and not
    /// recorded as usage.
    pub async fn check_connection(&self) -> Result<()> {
        let mut request = ApiRequest::get(Service::PropertyData, PROPERTIES_PATH);
        for (key, value) in SAMPLE_QUERY {
            request = request.param(key, value);
        }
        self.api.call(&request).await?;
        Ok(())
    }
}

/// The first record of a `/properties` response.
fn first_property(payload: &Value) -> Result<Option<PropertyDetails>> {
    let first = match payload {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(payload),
        _ => None,
    };
    first
        .map(|item| {
            serde_json::from_value(item.clone()).map_err(|e| PortalError::ParseResponse {
                service: Service::PropertyData.name().to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_property_takes_first_element() {
        let payload = json!([
            {"formattedAddress": "1 A St, Springfield, IL", "bedrooms": 3},
            {"formattedAddress": "2 B St, Springfield, IL"}
        ]);
        let details = first_property(&payload).unwrap().unwrap();
        assert_eq!(details.formatted_address.as_deref(), Some("1 A St, Springfield, IL"));
        assert_eq!(details.bedrooms, Some(3.0));
    }

    #[test]
    fn empty_result_is_none() {
        assert!(first_property(&json!([])).unwrap().is_none());
        assert!(first_property(&Value::Null).unwrap().is_none());
    }

    #[test]
    fn malformed_record_is_parse_error() {
        let err = first_property(&json!([{"bedrooms": "three"}])).unwrap_err();
        assert!(matches!(err, PortalError::ParseResponse { .. }));
    }
}
