//! `orders` command.

use serde::Serialize;

use super::args::OrdersArgs;
use super::emit;
use crate::core::analysis::{OrderSummary, order_summary};
use crate::core::models::Order;
use crate::core::token::UserSession;
use crate::error::{PortalError, Result};
use crate::render::{RenderOptions, human, render};
use crate::services::Portal;

/// Payload of the `orders` command.
#[derive(Debug, Clone, Serialize)]
pub struct OrdersReport {
    pub customer_id: u64,
    pub orders: Vec<Order>,
    pub summary: OrderSummary,
}

/// Execute the `orders` command.
pub async fn execute(portal: &Portal, args: &OrdersArgs, options: RenderOptions) -> Result<()> {
    let user = portal.login().await?;
    let customer_id = match args.customer {
        Some(id) => id,
        None => customer_from_session(&user)?,
    };

    let orders = portal.orders().list_orders(&user, customer_id).await?;
    let summary = order_summary(&orders, portal.clock().now().naive_utc());
    let report = OrdersReport {
        customer_id,
        orders,
        summary,
    };
    emit(&render("orders", &report, options, human::render_orders)?);
    Ok(())
}

/// Store customers share ids with identity users.
fn customer_from_session(user: &UserSession) -> Result<u64> {
    user.user_id.parse().map_err(|_| {
        PortalError::validation(
            "customer",
            "Signed-in user has no numeric id; pass --customer",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> UserSession {
        UserSession {
            user_id: id.to_string(),
            email: None,
            display_name: None,
        }
    }

    #[test]
    fn numeric_user_id_is_customer() {
        assert_eq!(customer_from_session(&session("42")).unwrap(), 42);
    }

    #[test]
    fn nicename_needs_explicit_customer() {
        let err = customer_from_session(&session("jane")).unwrap_err();
        assert!(matches!(err, PortalError::Validation { ref field, .. } if field == "customer"));
    }
}
