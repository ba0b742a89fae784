//! Human-readable output.
//!
//! Plain aligned text, colored with `colored` unless disabled.

use chrono::Utc;
use colored::{ColoredString, Colorize};

use crate::cli::account::UsageReport;
use crate::cli::check::CheckReport;
use crate::cli::lookup::LookupReport;
use crate::cli::orders::OrdersReport;
use crate::cli::portfolio::PortfolioReport;
use crate::core::analysis::PropertyAnalysis;
use crate::core::models::PropertyDetails;
use crate::core::token::UserSession;
use crate::util::{
    format_cents, format_currency, format_optional, format_percent, format_relative_time,
};

const LABEL_WIDTH: usize = 18;

/// Apply `style` unless color is off.
fn paint(text: &str, no_color: bool, style: impl Fn(&str) -> ColoredString) -> String {
    if no_color {
        text.to_string()
    } else {
        style(text).to_string()
    }
}

fn heading(text: &str, no_color: bool) -> String {
    paint(text, no_color, |t| t.bold().cyan())
}

fn row(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {label:<LABEL_WIDTH$}{value}")
}

fn grade_color(score: u32, text: &str) -> ColoredString {
    match score {
        70.. => text.green(),
        50..=69 => text.yellow(),
        _ => text.red(),
    }
}

pub fn render_session(session: &UserSession, no_color: bool) -> String {
    let mut lines = vec![heading("Signed in", no_color)];
    lines.push(row("User id", &session.user_id));
    if let Some(name) = &session.display_name {
        lines.push(row("Name", name));
    }
    if let Some(email) = &session.email {
        lines.push(row("Email", email));
    }
    lines.join("\n")
}

pub fn render_usage(report: &UsageReport, no_color: bool) -> String {
    let summary = &report.summary;
    let mut lines = vec![heading(
        &format!(
            "API usage for {}",
            report
                .user
                .display_name
                .as_deref()
                .unwrap_or(&report.user.user_id)
        ),
        no_color,
    )];

    let lookups = format!("{}/{}", summary.lookups_this_month, summary.limit);
    let lookups = if summary.is_exhausted() {
        paint(&lookups, no_color, |t| t.red().bold())
    } else {
        lookups
    };
    lines.push(row("Lookups", lookups));
    lines.push(row("Remaining", report.remaining));
    lines.push(row("Calls this month", summary.current_month));
    lines.push(row("Calls total", summary.total));

    if !summary.by_type.is_empty() {
        lines.push(String::new());
        lines.push(heading("By type", no_color));
        for (kind, count) in &summary.by_type {
            lines.push(row(kind, count));
        }
    }
    if !summary.daily.is_empty() {
        lines.push(String::new());
        lines.push(heading("By day", no_color));
        for (day, count) in &summary.daily {
            lines.push(row(day, count));
        }
    }
    lines.join("\n")
}

pub fn render_lookup(report: &LookupReport, no_color: bool) -> String {
    let lookup = &report.lookup;
    let Some(details) = &lookup.details else {
        return format!("No property found for \"{}\".", lookup.query.address);
    };

    let mut lines = vec![heading(&details.display_address(), no_color)];
    lines.extend(property_lines(details));

    let source = match (lookup.from_cache, lookup.fetched_at) {
        (true, Some(at)) => format!("cache (fetched {})", format_relative_time(at, Utc::now())),
        (true, None) => "cache".to_string(),
        (false, _) => "live".to_string(),
    };
    lines.push(row("Source", paint(&source, no_color, |t| t.dimmed())));

    if let Some(analysis) = &report.analysis {
        lines.push(String::new());
        lines.extend(analysis_lines(analysis, no_color));
    }

    if let Some(saved) = &report.saved {
        lines.push(String::new());
        let id = saved
            .id
            .map_or_else(String::new, |id| format!(" as #{id}"));
        lines.push(paint(&format!("Saved to portfolio{id}."), no_color, |t| t.green()));
    }
    lines.join("\n")
}

fn property_lines(details: &PropertyDetails) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(kind) = &details.property_type {
        lines.push(row("Type", kind));
    }
    lines.push(row(
        "Beds / baths",
        format!(
            "{} / {}",
            format_optional(details.bedrooms),
            format_optional(details.bathrooms)
        ),
    ));
    lines.push(row("Square feet", format_optional(details.square_footage)));
    lines.push(row(
        "Year built",
        details
            .year_built
            .map_or_else(|| "N/A".to_string(), |y| y.to_string()),
    ));
    lines.push(row(
        "Price",
        details
            .effective_price()
            .map_or_else(|| "N/A".to_string(), format_currency),
    ));
    if let Some(rent) = details.monthly_rent() {
        lines.push(row("Rent estimate", format!("{}/mo", format_currency(rent))));
    }
    lines
}

fn analysis_lines(analysis: &PropertyAnalysis, no_color: bool) -> Vec<String> {
    let financial = &analysis.financial;
    let market = &analysis.market;
    let score = &analysis.score;

    let mut lines = vec![heading("Investment analysis", no_color)];
    let grade = format!("{} ({}/100)", score.grade, score.score);
    lines.push(row(
        "Grade",
        paint(&grade, no_color, |t| grade_color(score.score, t).bold()),
    ));
    lines.push(row("Recommendation", score.recommendation));
    lines.push(row("Cap rate", format_percent(financial.cap_rate)));
    lines.push(row("Price / rent", format!("{:.1}", financial.price_to_rent_ratio)));
    lines.push(row("Cash flow", format!("{}/mo", format_currency(financial.estimated_cash_flow))));
    lines.push(row("ROI", format_percent(financial.roi_estimate)));
    lines.push(row("Price / sqft", format_cents(market.price_per_sqft)));
    lines.push(row("Market", market.market_status.label()));
    lines.push(row(
        "Appreciation",
        format!("{} (age {})", market.appreciation.label(), market.property_age),
    ));
    for factor in &score.positive_factors {
        lines.push(format!("  + {factor}"));
    }
    lines
}

pub fn render_portfolio(report: &PortfolioReport, no_color: bool) -> String {
    if report.properties.is_empty() {
        return "No saved properties.".to_string();
    }

    let mut lines = vec![heading(
        &format!("Portfolio ({} properties)", report.metrics.total_properties),
        no_color,
    )];
    lines.push(format!("  {:<8} {:<44} {:>12}  {}", "ID", "Address", "Price", "Saved"));
    let now = Utc::now();
    for record in &report.properties {
        let id = record.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let price = record
            .attributes
            .effective_price()
            .map_or_else(|| "N/A".to_string(), format_currency);
        let saved = record
            .saved_at
            .map_or_else(String::new, |at| format_relative_time(at, now));
        lines.push(format!(
            "  {id:<8} {:<44} {price:>12}  {}",
            truncate(&record.address(), 44),
            paint(&saved, no_color, |t| t.dimmed())
        ));
    }

    let metrics = &report.metrics;
    lines.push(String::new());
    lines.push(row("Total value", format_currency(metrics.total_value)));
    lines.push(row("Monthly rent", format_currency(metrics.total_monthly_rent)));
    lines.push(row("Cash flow", format!("{}/mo", format_currency(metrics.total_cash_flow))));
    lines.push(row("Avg cap rate", format_percent(metrics.avg_cap_rate)));
    lines.push(row("Yield", format_percent(metrics.portfolio_yield)));
    lines.join("\n")
}

pub fn render_deleted(id: i64, no_color: bool) -> String {
    paint(&format!("Deleted property #{id}."), no_color, |t| t.green())
}

pub fn render_orders(report: &OrdersReport, no_color: bool) -> String {
    if report.orders.is_empty() {
        return format!("No orders for customer {}.", report.customer_id);
    }

    let mut lines = vec![heading(
        &format!("Orders for customer {}", report.customer_id),
        no_color,
    )];
    for order in &report.orders {
        let number = order.number.clone().unwrap_or_else(|| order.id.to_string());
        let status = if order.is_completed() {
            paint(&order.status, no_color, |t| t.green())
        } else {
            paint(&order.status, no_color, |t| t.yellow())
        };
        lines.push(format!(
            "  #{number:<8} {:<20} {:>12}  {status}",
            order.date_created,
            format_cents(order.total_amount()),
        ));
    }

    let summary = &report.summary;
    lines.push(String::new());
    lines.push(row(
        "Completed",
        format!("{}/{}", summary.completed_orders, summary.total_orders),
    ));
    lines.push(row("Total value", format_cents(summary.total_value)));
    lines.push(row("Average order", format_cents(summary.average_order)));
    lines.push(row("Last 30 days", summary.recent_orders));
    lines.join("\n")
}

pub fn render_check(report: &CheckReport, no_color: bool) -> String {
    let mark = |ok: bool| {
        if ok {
            paint("ok", no_color, |t| t.green())
        } else {
            paint("missing", no_color, |t| t.red())
        }
    };

    let mut lines = vec![heading("Configuration", no_color)];
    lines.push(row(
        "Config file",
        format!(
            "{} ({}{})",
            report.config_path,
            report.config_source,
            if report.config_exists { "" } else { ", not found, using defaults" }
        ),
    ));
    lines.push(row(
        "Secrets file",
        format!("{} ({})", report.secrets_path, report.secrets_source),
    ));

    lines.push(String::new());
    lines.push(heading("Services", no_color));
    for service in &report.services {
        let url = service.base_url.as_deref().unwrap_or("");
        lines.push(format!(
            "  {:<LABEL_WIDTH$}{:<9}{}",
            service.name,
            mark(service.configured),
            paint(url, no_color, |t| t.dimmed())
        ));
    }

    if !report.connections.is_empty() {
        lines.push(String::new());
        lines.push(heading("Connectivity", no_color));
        for connection in &report.connections {
            let status = match &connection.error {
                None => paint("reachable", no_color, |t| t.green()),
                Some(err) => paint(
                    &format!("{} [{}]", err.message, err.code),
                    no_color,
                    |t| t.red(),
                ),
            };
            lines.push(row(connection.service, status));
        }
    }
    lines.join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{OrderSummary, PortfolioMetrics, analyze_property};
    use crate::core::models::{AddressQuery, Order, PropertyRecord, RentEstimate};
    use crate::core::usage::UsageSummary;
    use crate::services::PropertyLookup;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn details() -> PropertyDetails {
        PropertyDetails {
            formatted_address: Some("123 Main St, Springfield, IL 62701".into()),
            bedrooms: Some(3.0),
            bathrooms: Some(2.0),
            square_footage: Some(1500.0),
            year_built: Some(2020),
            price: Some(250_000.0),
            rent_estimate: Some(RentEstimate { rent: Some(2000.0) }),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_shows_price_and_grade() {
        let details = details();
        let report = LookupReport {
            lookup: PropertyLookup {
                query: AddressQuery::parse("123 Main St, Springfield").unwrap(),
                details: Some(details.clone()),
                payload: Arc::new(Value::Null),
                from_cache: false,
                fetched_at: None,
            },
            analysis: Some(analyze_property(&details, 2026)),
            saved: None,
        };
        let out = render_lookup(&report, true);
        assert!(out.contains("123 Main St, Springfield, IL 62701"));
        assert!(out.contains("$250,000"));
        assert!(out.contains("Grade"));
        assert!(out.contains("live"));
    }

    #[test]
    fn missing_property_message() {
        let report = LookupReport {
            lookup: PropertyLookup {
                query: AddressQuery::parse("9 Nowhere Rd, Nowhere").unwrap(),
                details: None,
                payload: Arc::new(json!([])),
                from_cache: false,
                fetched_at: None,
            },
            analysis: None,
            saved: None,
        };
        assert_eq!(
            render_lookup(&report, true),
            "No property found for \"9 Nowhere Rd, Nowhere\"."
        );
    }

    #[test]
    fn no_color_output_has_no_ansi() {
        let report = PortfolioReport {
            properties: vec![PropertyRecord {
                id: Some(7),
                saved_by_user: "42".into(),
                property_hash: "h".into(),
                attributes: details(),
                search_params: Value::Null,
                created_at: None,
                saved_at: None,
            }],
            metrics: PortfolioMetrics::default(),
        };
        let out = render_portfolio(&report, true);
        assert!(!out.contains('\x1b'));
        assert!(out.contains("$250,000"));
    }

    #[test]
    fn orders_list_and_summary() {
        let order: Order = serde_json::from_value(json!({
            "id": 5, "status": "processing", "total": "19.99",
            "date_created": "2026-03-01T10:00:00"
        }))
        .unwrap();
        let report = OrdersReport {
            customer_id: 9,
            orders: vec![order],
            summary: OrderSummary {
                total_orders: 1,
                total_value: 19.99,
                average_order: 19.99,
                ..OrderSummary::default()
            },
        };
        let out = render_orders(&report, true);
        assert!(out.contains("#5"));
        assert!(out.contains("$19.99"));
        assert!(out.contains("0/1"));
    }

    #[test]
    fn usage_shows_remaining() {
        let report = UsageReport {
            user: UserSession {
                user_id: "42".into(),
                email: None,
                display_name: Some("Jane".into()),
            },
            summary: UsageSummary {
                lookups_this_month: 4,
                limit: 30,
                ..UsageSummary::default()
            },
            remaining: 26,
        };
        let out = render_usage(&report, true);
        assert!(out.contains("API usage for Jane"));
        assert!(out.contains("4/30"));
        assert!(out.contains("26"));
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
