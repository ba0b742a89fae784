//! Order history from the commerce API.

use std::sync::Arc;

use serde_json::Value;

use super::log_failure;
use crate::core::http::{ApiClient, ApiRequest};
use crate::core::models::{Order, UsageAction, UsageOutcome};
use crate::core::token::UserSession;
use crate::core::usage::UsageRecorder;
use crate::error::{PortalError, Result};
use crate::storage::secrets::Service;

const ORDERS_PATH: &str = "/wp-json/wc/v3/orders";
const PAGE_SIZE: &str = "50";

#[derive(Debug, Clone)]
pub struct OrderService {
    api: Arc<ApiClient>,
    usage: UsageRecorder,
}

impl OrderService {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>, usage: UsageRecorder) -> Self {
        Self { api, usage }
    }

    /// Most recent orders of `customer_id`, newest first. Never cached.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero customer id, otherwise any request-layer
    /// error.
    pub async fn list_orders(&self, user: &UserSession, customer_id: u64) -> Result<Vec<Order>> {
        if customer_id == 0 {
            return Err(PortalError::validation(
                "customer_id",
                "Customer id must be a positive number",
            ));
        }

        let result = self.fetch(customer_id).await;
        if let Err(e) = &result {
            log_failure(UsageAction::OrderLookup.as_str(), e);
        }
        self.usage
            .record(
                &user.user_id,
                UsageAction::OrderLookup,
                &format!("customer:{customer_id}"),
                &UsageOutcome::from_result(&result, false),
            )
            .await;
        result
    }

    async fn fetch(&self, customer_id: u64) -> Result<Vec<Order>> {
        let request = ApiRequest::get(Service::Commerce, ORDERS_PATH)
            .param("customer", customer_id.to_string())
            .param("per_page", PAGE_SIZE)
            .param("orderby", "date")
            .param("order", "desc");
        let outcome = self.api.call(&request).await?;
        let orders = parse_orders(&outcome.payload)?;
        tracing::info!(customer_id, count = orders.len(), "Fetched orders");
        Ok(orders)
    }
}

fn parse_orders(payload: &Value) -> Result<Vec<Order>> {
    if payload.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(payload.clone()).map_err(|e| PortalError::ParseResponse {
        service: Service::Commerce.name().to_string(),
        message: e.to_string(),
    })
}
