//! Number formatting utilities.

/// Format a percentage with one decimal place.
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Format a USD amount with thousands separators and no cents.
#[must_use]
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = value.abs().round() as u64;
    format!("{sign}${}", group_thousands(whole))
}

/// Format a USD amount with cents.
#[must_use]
pub fn format_cents(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = abs.trunc() as u64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cents = ((abs - abs.trunc()) * 100.0).round() as u64;
    let (whole, cents) = if cents == 100 { (whole + 1, 0) } else { (whole, cents) };
    format!("{sign}${}.{cents:02}", group_thousands(whole))
}

/// Format an optional number, falling back to "N/A".
#[must_use]
pub fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(
        || "N/A".to_string(),
        |v| {
            if v.fract() == 0.0 {
                #[allow(clippy::cast_possible_truncation)]
                let whole = v as i64;
                whole.to_string()
            } else {
                format!("{v:.1}")
            }
        },
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(1_250_000.0), "$1,250,000");
        assert_eq!(format_currency(950.4), "$950");
        assert_eq!(format_currency(-1200.0), "-$1,200");
    }

    #[test]
    fn cents_round_up_carry() {
        assert_eq!(format_cents(19.999), "$20.00");
        assert_eq!(format_cents(1234.5), "$1,234.50");
    }

    #[test]
    fn optional_numbers() {
        assert_eq!(format_optional(Some(3.0)), "3");
        assert_eq!(format_optional(Some(2.5)), "2.5");
        assert_eq!(format_optional(None), "N/A");
    }
}
