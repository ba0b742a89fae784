//! Hosted backend (PostgREST) table access.
//!
//! Tables live at `{supabase.url}/rest/v1/{table}`. Filters use PostgREST
//! operator syntax (`user_id=eq.42`). All calls go through [`ApiClient`], so
//! they share its authentication, retry and error handling.

use std::sync::Arc;

use serde_json::Value;

use crate::core::http::{ApiClient, ApiRequest};
use crate::error::{PortalError, Result};
use crate::storage::secrets::Service;

const REST_PREFIX: &str = "/rest/v1";

/// One PostgREST row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: String,
    op: &'static str,
    value: String,
}

impl Filter {
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: "eq",
            value: value.to_string(),
        }
    }

    #[must_use]
    pub fn gte(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: "gte",
            value: value.to_string(),
        }
    }

    fn param(&self) -> (String, String) {
        (self.column.clone(), format!("{}.{}", self.op, self.value))
    }
}

/// Sort order for [`BackendClient::select`].
#[derive(Debug, Clone, Copy)]
pub struct Order<'a> {
    pub column: &'a str,
    pub descending: bool,
}

impl<'a> Order<'a> {
    #[must_use]
    pub const fn desc(column: &'a str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Thin CRUD layer over the backend's REST interface.
#[derive(Debug, Clone)]
pub struct BackendClient {
    api: Arc<ApiClient>,
}

impl BackendClient {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Whether the backend service has credentials registered.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api.is_registered(Service::Backend)
    }

    /// Append a row. Attempted once.
    pub async fn insert(&self, table: &str, row: &Value) -> Result<Value> {
        let request = ApiRequest::post(Service::Backend, table_path(table)?, row.clone())
            .header("Prefer", "return=representation");
        let outcome = self.api.call(&request).await?;
        Ok(first_row(&outcome.payload))
    }

    /// Insert or overwrite the row matching `on_conflict`. Last write wins.
    pub async fn upsert(&self, table: &str, row: &Value, on_conflict: &str) -> Result<Value> {
        let request = ApiRequest::post(Service::Backend, table_path(table)?, row.clone())
            .param("on_conflict", on_conflict)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .idempotent();
        let outcome = self.api.call(&request).await?;
        Ok(first_row(&outcome.payload))
    }

    /// Rows matching all `filters`.
    pub async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &[Filter],
        order: Option<Order<'_>>,
    ) -> Result<Vec<Value>> {
        let mut request =
            ApiRequest::get(Service::Backend, table_path(table)?).param("select", columns);
        for filter in filters {
            let (k, v) = filter.param();
            request = request.param(k, v);
        }
        if let Some(order) = order {
            let direction = if order.descending { "desc" } else { "asc" };
            request = request.param("order", format!("{}.{direction}", order.column));
        }

        let outcome = self.api.call(&request).await?;
        match &*outcome.payload {
            Value::Array(rows) => Ok(rows.clone()),
            Value::Null => Ok(Vec::new()),
            _ => Err(PortalError::ParseResponse {
                service: Service::Backend.name().to_string(),
                message: format!("expected an array of rows from {table}"),
            }),
        }
    }

    /// Number of rows matching `filters`, counted by the backend. `None` when
    /// the response carries no total.
    pub async fn count(&self, table: &str, filters: &[Filter]) -> Result<Option<u64>> {
        let mut request = ApiRequest::get(Service::Backend, table_path(table)?)
            .param("select", "user_id")
            .param("limit", "0")
            .header("Prefer", "count=exact");
        for filter in filters {
            let (k, v) = filter.param();
            request = request.param(k, v);
        }
        let outcome = self.api.call(&request).await?;
        Ok(outcome.total_count)
    }

    /// Delete rows matching all `filters`. Refuses an empty filter set.
    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        if filters.is_empty() {
            return Err(PortalError::validation(
                "filters",
                "Refusing to delete without a filter",
            ));
        }
        let mut request = ApiRequest::delete(Service::Backend, table_path(table)?);
        for filter in filters {
            let (k, v) = filter.param();
            request = request.param(k, v);
        }
        self.api.call(&request).await?;
        Ok(())
    }
}

fn table_path(table: &str) -> Result<String> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return Err(PortalError::validation(
            "table",
            format!("Invalid table name \"{table}\""),
        ));
    }
    Ok(format!("{REST_PREFIX}/{table}"))
}

fn first_row(payload: &Value) -> Value {
    match payload {
        Value::Array(rows) => rows.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}
