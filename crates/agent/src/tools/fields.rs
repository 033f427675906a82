use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

pub(crate) fn required_text(field: &str, value: String) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("`{field}` must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

/// Accepts `YYYY-MM-DD`, also when the model appends a time component.
pub(crate) fn iso_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|_| format!("`{field}` must be an ISO date (YYYY-MM-DD), got `{trimmed}`"))
}

pub(crate) fn positive_count(field: &str, value: i64) -> Result<u32, String> {
    if value <= 0 {
        return Err(format!("`{field}` must be a positive whole number"));
    }
    u32::try_from(value).map_err(|_| format!("`{field}` is too large"))
}

/// Largest price a tool will accept, in currency units.
const MAX_AMOUNT: f64 = 1_000_000_000.0;

/// Converts a model-supplied price to a two-decimal amount.
pub(crate) fn positive_amount(field: &str, value: f64) -> Result<Decimal, String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("`{field}` must be a positive amount"));
    }
    if value > MAX_AMOUNT {
        return Err(format!("`{field}` must not exceed {MAX_AMOUNT:.0}"));
    }
    Decimal::from_f64(value)
        .map(|amount| amount.round_dp(2))
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| format!("`{field}` is not a representable amount"))
}

pub(crate) fn record_id(field: &str, value: i64) -> Result<i64, String> {
    if value <= 0 {
        return Err(format!("`{field}` must be a positive id"));
    }
    Ok(value)
}
