//! Investment analysis over property, portfolio and order data.
//!
//! All figures are rough heuristics: expenses are assumed at 0.4 % of the
//! price per month and returns assume a 20 % down payment.

use chrono::{Datelike, NaiveDateTime, TimeDelta};
use serde::Serialize;

use super::models::{Order, PropertyDetails, PropertyRecord};

/// Monthly expenses as a fraction of the purchase price.
pub const MONTHLY_EXPENSE_RATIO: f64 = 0.004;
/// Down payment as a fraction of the purchase price.
pub const DOWN_PAYMENT_RATIO: f64 = 0.2;
/// Age assumed when the build year is unknown.
const UNKNOWN_AGE_YEARS: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Hot,
    Balanced,
    Buyers,
}

impl MarketStatus {
    /// Classify by price per square foot.
    #[must_use]
    pub fn from_price_per_sqft(price_per_sqft: f64) -> Self {
        if price_per_sqft > 200.0 {
            Self::Hot
        } else if price_per_sqft > 100.0 {
            Self::Balanced
        } else {
            Self::Buyers
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hot => "Hot Market",
            Self::Balanced => "Balanced Market",
            Self::Buyers => "Buyer's Market",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Appreciation {
    High,
    Moderate,
    Low,
}

impl Appreciation {
    #[must_use]
    pub const fn from_age(age_years: i32) -> Self {
        if age_years < 10 {
            Self::High
        } else if age_years < 30 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialMetrics {
    pub price: f64,
    pub monthly_rent: f64,
    pub annual_rent: f64,
    /// Percent.
    pub cap_rate: f64,
    pub price_to_rent_ratio: f64,
    pub estimated_cash_flow: f64,
    /// Percent, on the down payment.
    pub roi_estimate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarketAnalysis {
    pub price_per_sqft: f64,
    pub market_status: MarketStatus,
    pub appreciation: Appreciation,
    pub property_age: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvestmentScore {
    /// 0 to 100.
    pub score: u32,
    pub grade: &'static str,
    pub recommendation: &'static str,
    pub positive_factors: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PropertyAnalysis {
    pub financial: FinancialMetrics,
    pub market: MarketAnalysis,
    pub score: InvestmentScore,
}

/// Analyze one property as of `current_year`.
#[must_use]
pub fn analyze_property(details: &PropertyDetails, current_year: i32) -> PropertyAnalysis {
    let financial = financial_metrics(details);
    let market = market_analysis(details, current_year);
    let score = investment_score(&financial, &market);
    PropertyAnalysis {
        financial,
        market,
        score,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[must_use]
pub fn financial_metrics(details: &PropertyDetails) -> FinancialMetrics {
    let price = details.effective_price().unwrap_or(0.0);
    let monthly_rent = details.monthly_rent().unwrap_or(0.0);
    let annual_rent = monthly_rent * 12.0;

    if price <= 0.0 || monthly_rent <= 0.0 {
        return FinancialMetrics {
            price,
            monthly_rent,
            annual_rent,
            cap_rate: 0.0,
            price_to_rent_ratio: 0.0,
            estimated_cash_flow: 0.0,
            roi_estimate: 0.0,
        };
    }

    let cash_flow = monthly_rent - price * MONTHLY_EXPENSE_RATIO;
    FinancialMetrics {
        price,
        monthly_rent,
        annual_rent,
        cap_rate: round2(annual_rent / price * 100.0),
        price_to_rent_ratio: round2(price / annual_rent),
        estimated_cash_flow: round2(cash_flow),
        roi_estimate: round2(cash_flow * 12.0 / (price * DOWN_PAYMENT_RATIO) * 100.0),
    }
}

/// Market position from the listed price only; a past sale price says
/// nothing about the current market.
#[must_use]
pub fn market_analysis(details: &PropertyDetails, current_year: i32) -> MarketAnalysis {
    let listed = details.price.filter(|p| p.is_finite() && *p > 0.0);
    let price_per_sqft = match (listed, details.square_footage) {
        (Some(price), Some(sqft)) if sqft > 0.0 => round2(price / sqft),
        _ => 0.0,
    };
    let property_age = details
        .year_built
        .map_or(UNKNOWN_AGE_YEARS, |year| current_year - year);

    MarketAnalysis {
        price_per_sqft,
        market_status: MarketStatus::from_price_per_sqft(price_per_sqft),
        appreciation: Appreciation::from_age(property_age),
        property_age,
    }
}

#[must_use]
pub fn investment_score(financial: &FinancialMetrics, market: &MarketAnalysis) -> InvestmentScore {
    let mut score = 0;
    let mut factors = Vec::new();

    let cap_rate = financial.cap_rate;
    if cap_rate > 8.0 {
        score += 25;
        factors.push("Excellent cap rate");
    } else if cap_rate > 6.0 {
        score += 15;
        factors.push("Good cap rate");
    } else if cap_rate > 4.0 {
        score += 10;
        factors.push("Fair cap rate");
    }

    let cash_flow = financial.estimated_cash_flow;
    if cash_flow > 300.0 {
        score += 25;
        factors.push("Strong cash flow");
    } else if cash_flow > 100.0 {
        score += 15;
        factors.push("Positive cash flow");
    } else if cash_flow > 0.0 {
        score += 10;
        factors.push("Break-even cash flow");
    }

    match market.market_status {
        MarketStatus::Buyers => {
            score += 20;
            factors.push("Favorable market conditions");
        }
        MarketStatus::Balanced => {
            score += 15;
            factors.push("Stable market conditions");
        }
        MarketStatus::Hot => {}
    }

    match market.appreciation {
        Appreciation::High => {
            score += 15;
            factors.push("High appreciation potential");
        }
        Appreciation::Moderate => {
            score += 10;
            factors.push("Moderate appreciation potential");
        }
        Appreciation::Low => {}
    }

    if market.property_age < 10 {
        score += 15;
        factors.push("New property");
    } else if market.property_age < 30 {
        score += 10;
        factors.push("Well-maintained age");
    }

    let (grade, recommendation) = grade_for(score);
    InvestmentScore {
        score,
        grade,
        recommendation,
        positive_factors: factors,
    }
}

#[must_use]
pub const fn grade_for(score: u32) -> (&'static str, &'static str) {
    match score {
        80.. => ("A+", "Excellent investment opportunity"),
        70..=79 => ("A", "Strong investment potential"),
        60..=69 => ("B+", "Good investment with some caution"),
        50..=59 => ("B", "Fair investment opportunity"),
        40..=49 => ("C", "Marginal investment - proceed carefully"),
        _ => ("D", "Poor investment - not recommended"),
    }
}

// =============================================================================
// Portfolio
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PortfolioMetrics {
    pub total_properties: usize,
    pub total_value: f64,
    pub total_monthly_rent: f64,
    pub total_annual_rent: f64,
    pub total_cash_flow: f64,
    pub avg_cap_rate: f64,
    pub avg_property_value: f64,
    /// Percent.
    pub portfolio_yield: f64,
}

/// Aggregate saved properties. Properties without a price only count
/// towards `total_properties`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn portfolio_metrics(records: &[PropertyRecord]) -> PortfolioMetrics {
    let mut metrics = PortfolioMetrics {
        total_properties: records.len(),
        ..PortfolioMetrics::default()
    };
    let mut cap_rates = Vec::new();

    for record in records {
        let Some(price) = record.attributes.effective_price() else {
            continue;
        };
        let rent = record.attributes.monthly_rent().unwrap_or(0.0);
        metrics.total_value += price;
        metrics.total_monthly_rent += rent;
        metrics.total_cash_flow += rent - price * MONTHLY_EXPENSE_RATIO;
        if rent > 0.0 {
            cap_rates.push(rent * 12.0 / price * 100.0);
        }
    }

    metrics.total_annual_rent = metrics.total_monthly_rent * 12.0;
    if !cap_rates.is_empty() {
        metrics.avg_cap_rate = round2(cap_rates.iter().sum::<f64>() / cap_rates.len() as f64);
    }
    if !records.is_empty() {
        metrics.avg_property_value = metrics.total_value / records.len() as f64;
    }
    if metrics.total_value > 0.0 {
        metrics.portfolio_yield = round2(metrics.total_annual_rent / metrics.total_value * 100.0);
    }
    metrics.total_cash_flow = round2(metrics.total_cash_flow);
    metrics
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub completed_orders: usize,
    pub total_value: f64,
    pub average_order: f64,
    /// Orders created in the 30 days before `now`.
    pub recent_orders: usize,
    /// `(YYYY-MM, count, value)` in ascending month order.
    pub monthly: Vec<(String, usize, f64)>,
}

/// Summarize orders relative to `now` (site-local time).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn order_summary(orders: &[Order], now: NaiveDateTime) -> OrderSummary {
    let total_value: f64 = orders.iter().map(Order::total_amount).sum();
    let cutoff = now - TimeDelta::days(30);

    let mut monthly: Vec<(String, usize, f64)> = Vec::new();
    for order in orders {
        let Some(created) = order.created_at() else {
            continue;
        };
        let month = format!("{:04}-{:02}", created.year(), created.month());
        match monthly.iter_mut().find(|(m, _, _)| *m == month) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 += order.total_amount();
            }
            None => monthly.push((month, 1, order.total_amount())),
        }
    }
    monthly.sort_by(|a, b| a.0.cmp(&b.0));

    OrderSummary {
        total_orders: orders.len(),
        completed_orders: orders.iter().filter(|o| o.is_completed()).count(),
        total_value: round2(total_value),
        average_order: if orders.is_empty() {
            0.0
        } else {
            round2(total_value / orders.len() as f64)
        },
        recent_orders: orders
            .iter()
            .filter_map(Order::created_at)
            .filter(|created| *created > cutoff)
            .count(),
        monthly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::RentEstimate;
    use serde_json::json;

    fn details(price: f64, rent: Option<f64>, sqft: f64, year: Option<i32>) -> PropertyDetails {
        PropertyDetails {
            price: Some(price),
            rent_estimate: rent.map(|r| RentEstimate { rent: Some(r) }),
            square_footage: Some(sqft),
            year_built: year,
            ..Default::default()
        }
    }

    #[test]
    fn financials_follow_expense_and_down_payment_rules() {
        let f = financial_metrics(&details(200_000.0, Some(2_000.0), 1_000.0, Some(2020)));
        assert!((f.cap_rate - 12.0).abs() < 1e-9);
        assert!((f.estimated_cash_flow - 1_200.0).abs() < 1e-9);
        assert!((f.price_to_rent_ratio - 8.33).abs() < 1e-9);
        assert!((f.roi_estimate - 36.0).abs() < 1e-9);
    }

    #[test]
    fn missing_rent_zeroes_ratios() {
        let f = financial_metrics(&details(200_000.0, None, 1_000.0, None));
        assert_eq!(f.cap_rate, 0.0);
        assert_eq!(f.estimated_cash_flow, 0.0);
        assert!((f.price - 200_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn market_status_thresholds() {
        assert_eq!(MarketStatus::from_price_per_sqft(250.0), MarketStatus::Hot);
        assert_eq!(MarketStatus::from_price_per_sqft(200.0), MarketStatus::Balanced);
        assert_eq!(MarketStatus::from_price_per_sqft(100.0), MarketStatus::Buyers);
    }

    #[test]
    fn unknown_year_counts_as_moderate() {
        let m = market_analysis(&details(100_000.0, None, 1_000.0, None), 2026);
        assert_eq!(m.property_age, 20);
        assert_eq!(m.appreciation, Appreciation::Moderate);
    }

    #[test]
    fn price_per_sqft_ignores_last_sale_price() {
        let sold_only = PropertyDetails {
            last_sale_price: Some(300_000.0),
            square_footage: Some(1_000.0),
            ..Default::default()
        };
        let m = market_analysis(&sold_only, 2026);
        assert_eq!(m.price_per_sqft, 0.0);
        assert_eq!(m.market_status, MarketStatus::Buyers);

        let f = financial_metrics(&sold_only);
        assert!((f.price - 300_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn strong_new_cheap_property_scores_a_plus() {
        // cap 12% (25) + cash flow 600 (25) + $100/sqft buyer's (20) + new (15 + 15)
        let analysis = analyze_property(&details(100_000.0, Some(1_000.0), 1_000.0, Some(2022)), 2026);
        assert_eq!(analysis.score.score, 100);
        assert_eq!(analysis.score.grade, "A+");
        assert_eq!(analysis.score.positive_factors.len(), 5);
    }

    #[test]
    fn grades() {
        assert_eq!(grade_for(80).0, "A+");
        assert_eq!(grade_for(79).0, "A");
        assert_eq!(grade_for(60).0, "B+");
        assert_eq!(grade_for(50).0, "B");
        assert_eq!(grade_for(40).0, "C");
        assert_eq!(grade_for(39).0, "D");
    }

    #[test]
    fn portfolio_aggregates_priced_properties() {
        let record = |price: f64, rent: f64| PropertyRecord {
            id: Some(1),
            saved_by_user: "u".into(),
            property_hash: "h".into(),
            attributes: details(price, Some(rent), 1_000.0, None),
            search_params: json!({}),
            created_at: None,
            saved_at: None,
        };
        let m = portfolio_metrics(&[record(100_000.0, 1_000.0), record(300_000.0, 1_000.0)]);
        assert_eq!(m.total_properties, 2);
        assert!((m.total_value - 400_000.0).abs() < f64::EPSILON);
        assert!((m.total_cash_flow - 400.0).abs() < 1e-9);
        assert!((m.portfolio_yield - 6.0).abs() < 1e-9);
        assert!((m.avg_cap_rate - 8.0).abs() < 1e-9);
    }

    #[test]
    fn order_summary_counts_recent_and_completed() {
        let order = |id: u64, status: &str, total: &str, date: &str| Order {
            id,
            number: None,
            status: status.into(),
            total: total.into(),
            currency: Some("USD".into()),
            date_created: date.into(),
            customer_id: 7,
            line_items: Vec::new(),
        };
        let orders = vec![
            order(1, "completed", "10.00", "2026-03-01T10:00:00"),
            order(2, "processing", "20.00", "2026-01-01T10:00:00"),
        ];
        let now = NaiveDateTime::parse_from_str("2026-03-10T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let s = order_summary(&orders, now);
        assert_eq!(s.total_orders, 2);
        assert_eq!(s.completed_orders, 1);
        assert_eq!(s.recent_orders, 1);
        assert!((s.average_order - 15.0).abs() < 1e-9);
        assert_eq!(s.monthly[0].0, "2026-01");
    }
}
