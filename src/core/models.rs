//! Core data models.
//!
//! Wire shapes follow the upstream services: property records use RentCast's
//! camelCase fields, orders use WooCommerce's snake_case fields, and backend
//! rows use the column names of the `properties` and `api_usage` tables.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{PortalError, Result};

/// Longest address accepted for a lookup.
pub const MAX_ADDRESS_LEN: usize = 200;

// =============================================================================
// Address Query
// =============================================================================

/// A validated "street, locality" address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressQuery {
    /// Whitespace-collapsed address as sent upstream.
    pub address: String,
    pub street: String,
    /// Everything after the first comma (city, state, zip).
    pub locality: String,
}

impl AddressQuery {
    /// Validate a free-form address.
    ///
    /// # Errors
    ///
    /// `Validation` if the address is empty, too long, contains control
    /// characters or lacks a street or locality part.
    pub fn parse(raw: &str) -> Result<Self> {
        let address = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if address.is_empty() {
            return Err(PortalError::validation("address", "Address is required"));
        }
        if address.chars().count() > MAX_ADDRESS_LEN {
            return Err(PortalError::validation(
                "address",
                format!("Address must be at most {MAX_ADDRESS_LEN} characters"),
            ));
        }
        if address.chars().any(char::is_control) {
            return Err(PortalError::validation(
                "address",
                "Address contains control characters",
            ));
        }

        let Some((street, locality)) = address.split_once(',') else {
            return Err(PortalError::validation(
                "address",
                "Address needs a street and a city, separated by a comma",
            ));
        };
        let (street, locality) = (street.trim(), locality.trim());
        if street.is_empty() || locality.is_empty() {
            return Err(PortalError::validation(
                "address",
                "Address needs a street and a city, separated by a comma",
            ));
        }
        if !street.chars().any(char::is_alphanumeric) {
            return Err(PortalError::validation(
                "address",
                "Street part of the address is not valid",
            ));
        }

        Ok(Self {
            street: street.to_string(),
            locality: locality.to_string(),
            address,
        })
    }
}

// =============================================================================
// Property Details
// =============================================================================

/// RentCast rent estimate block, present only when upstream includes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RentEstimate {
    pub rent: Option<f64>,
}

/// Property attributes as returned by the property data API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_footage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sale_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sale_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_estimate: Option<RentEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl PropertyDetails {
    /// Listing price, falling back to the last sale price.
    #[must_use]
    pub fn effective_price(&self) -> Option<f64> {
        self.price
            .or(self.last_sale_price)
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    #[must_use]
    pub fn monthly_rent(&self) -> Option<f64> {
        self.rent_estimate
            .as_ref()
            .and_then(|r| r.rent)
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Best display address available.
    #[must_use]
    pub fn display_address(&self) -> String {
        self.formatted_address
            .clone()
            .or_else(|| self.address_line1.clone())
            .unwrap_or_else(|| "Unknown address".to_string())
    }

    /// Stable key for one property within a user's portfolio: the first 32
    /// hex chars of SHA-256 over lowercased street, city and state.
    #[must_use]
    pub fn property_hash(&self) -> String {
        let street = self
            .address_line1
            .as_deref()
            .or(self.formatted_address.as_deref())
            .unwrap_or_default();
        let key = format!(
            "{}{}{}",
            street.trim().to_lowercase(),
            self.city.as_deref().unwrap_or_default().trim().to_lowercase(),
            self.state.as_deref().unwrap_or_default().trim().to_lowercase(),
        );
        hex::encode(Sha256::digest(key.as_bytes()))[..32].to_string()
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// A saved property row in the backend `properties` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "user_id", deserialize_with = "string_or_number")]
    pub saved_by_user: String,
    pub property_hash: String,
    #[serde(rename = "data")]
    pub attributes: PropertyDetails,
    #[serde(default)]
    pub search_params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updated_at", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Backend id columns may be integers or text depending on the schema.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

impl PropertyRecord {
    #[must_use]
    pub fn address(&self) -> String {
        self.attributes.display_address()
    }
}

// =============================================================================
// Orders
// =============================================================================

/// One line of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub total: String,
}

/// An order from the commerce API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: u64,
    #[serde(default)]
    pub number: Option<String>,
    pub status: String,
    /// Decimal string as sent by the API.
    pub total: String,
    #[serde(default)]
    pub currency: Option<String>,
    /// Site-local timestamp without offset, e.g. `2026-01-31T09:15:00`.
    pub date_created: String,
    #[serde(default)]
    pub customer_id: u64,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Order {
    /// Parsed total; unparseable totals count as zero.
    #[must_use]
    pub fn total_amount(&self) -> f64 {
        self.total.trim().parse().unwrap_or(0.0)
    }

    #[must_use]
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date_created, "%Y-%m-%dT%H:%M:%S").ok()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

// =============================================================================
// Usage
// =============================================================================

/// Kind of recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    PropertySearch,
    OrderLookup,
    PropertySave,
    PropertyDelete,
}

impl UsageAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PropertySearch => "property_search",
            Self::OrderLookup => "order_lookup",
            Self::PropertySave => "property_save",
            Self::PropertyDelete => "property_delete",
        }
    }
}

/// How a recorded call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageOutcome {
    Success,
    CacheHit,
    /// Stable error code of the failure.
    Failed(&'static str),
}

impl UsageOutcome {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Success => "success".to_string(),
            Self::CacheHit => "cache_hit".to_string(),
            Self::Failed(code) => format!("error:{code}"),
        }
    }

    #[must_use]
    pub fn from_result<T>(result: &Result<T>, from_cache: bool) -> Self {
        match result {
            Ok(_) if from_cache => Self::CacheHit,
            Ok(_) => Self::Success,
            Err(e) => Self::Failed(e.error_code()),
        }
    }
}

/// An append-only row of the `api_usage` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub user_id: String,
    #[serde(rename = "query_type")]
    pub action: UsageAction,
    pub query: String,
    #[serde(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
    /// Outcome and any call details, stored in the `metadata` JSON column.
    #[serde(default)]
    pub metadata: Value,
}

// =============================================================================
// Robot Output
// =============================================================================

/// JSON envelope for `--json` output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// Machine-readable error summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: String,
    pub category: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&PortalError> for ErrorReport {
    fn from(err: &PortalError) -> Self {
        Self {
            code: err.error_code().to_string(),
            category: format!("{:?}", err.category()).to_lowercase(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}

impl<T> RobotOutput<T> {
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: "reip.v1".to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(command: impl Into<String>, err: &PortalError) -> Self {
        Self {
            schema_version: "reip.v1".to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data: None,
            error: Some(ErrorReport::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_requires_street_and_locality() {
        let q = AddressQuery::parse("  123  Main St,   Springfield, IL ").unwrap();
        assert_eq!(q.address, "123 Main St, Springfield, IL");
        assert_eq!(q.street, "123 Main St");
        assert_eq!(q.locality, "Springfield, IL");

        for bad in ["", "   ", "123 Main St", ", Springfield", "123 Main St,  "] {
            assert!(
                matches!(AddressQuery::parse(bad), Err(PortalError::Validation { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn address_length_is_bounded() {
        let long = format!("{}, Springfield", "1".repeat(MAX_ADDRESS_LEN));
        assert!(AddressQuery::parse(&long).is_err());
    }

    #[test]
    fn property_details_from_rentcast_payload() {
        let details: PropertyDetails = serde_json::from_value(json!({
            "id": "123-Main-St,-Springfield,-IL-62701",
            "formattedAddress": "123 Main St, Springfield, IL 62701",
            "addressLine1": "123 Main St",
            "city": "Springfield",
            "state": "IL",
            "bedrooms": 3,
            "bathrooms": 2.5,
            "squareFootage": 1800,
            "yearBuilt": 1995,
            "lastSalePrice": 250000,
            "ownerOccupied": true
        }))
        .unwrap();

        assert_eq!(details.bedrooms, Some(3.0));
        assert_eq!(details.year_built, Some(1995));
        assert_eq!(details.effective_price(), Some(250_000.0));
        assert_eq!(details.monthly_rent(), None);
    }

    #[test]
    fn property_hash_ignores_case() {
        let a = PropertyDetails {
            address_line1: Some("123 Main St".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            ..Default::default()
        };
        let b = PropertyDetails {
            address_line1: Some("123 MAIN ST".into()),
            city: Some("springfield".into()),
            state: Some("il".into()),
            ..Default::default()
        };
        assert_eq!(a.property_hash(), b.property_hash());
        assert_eq!(a.property_hash().len(), 32);
    }

    #[test]
    fn property_record_uses_table_columns() {
        let record = PropertyRecord {
            id: None,
            saved_by_user: "42".into(),
            property_hash: "abc".into(),
            attributes: PropertyDetails::default(),
            search_params: json!({"address": "1 A St, B"}),
            created_at: None,
            saved_at: None,
        };
        let row = serde_json::to_value(&record).unwrap();
        assert_eq!(row["user_id"], "42");
        assert!(row.get("data").is_some());
        assert!(row.get("id").is_none());
    }

    #[test]
    fn property_record_accepts_numeric_user_id() {
        let record: PropertyRecord = serde_json::from_value(json!({
            "id": 9,
            "user_id": 42,
            "property_hash": "abc",
            "data": {"city": "Springfield"},
            "search_params": {},
            "created_at": "2026-03-01T10:00:00.123456+00:00",
            "updated_at": "2026-03-02T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(record.saved_by_user, "42");
        assert_eq!(record.id, Some(9));
        assert!(record.saved_at.is_some());
    }

    #[test]
    fn order_parses_woocommerce_shape() {
        let order: Order = serde_json::from_value(json!({
            "id": 727,
            "status": "completed",
            "total": "29.35",
            "currency": "USD",
            "date_created": "2026-01-31T09:15:00",
            "customer_id": 5,
            "line_items": [{"name": "Report", "quantity": 1, "total": "29.35"}]
        }))
        .unwrap();
        assert!((order.total_amount() - 29.35).abs() < f64::EPSILON);
        assert!(order.is_completed());
        assert!(order.created_at().is_some());
    }

    #[test]
    fn usage_outcome_labels() {
        let ok: Result<()> = Ok(());
        assert_eq!(UsageOutcome::from_result(&ok, true).label(), "cache_hit");
        let err: Result<()> = Err(PortalError::QuotaExceeded { used: 30, limit: 30 });
        assert_eq!(
            UsageOutcome::from_result(&err, false).label(),
            format!("error:{}", err.unwrap_err().error_code())
        );
    }
}
