//! Scalar conversion functions.
//!
//! Every function takes a trimmed, non-placeholder cell. Failures return a
//! short reason string; the caller attaches the field and the raw value.

use super::units::{AreaUnit, Currency};
use crate::utils::{
    CURRENCY_MARKERS, clean_numeric_string, extract_first_number, is_boolean_false,
    is_boolean_true, parse_numeric_string,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a decimal number, keeping its sign.
pub(crate) fn parse_decimal(value: &str) -> Result<f64, String> {
    parse_numeric_string(value).ok_or_else(|| "not a number".to_string())
}

/// Parse a monetary amount. Currency markers and grouping are stripped.
///
/// Negative amounts are returned as-is; the invariant gate rejects them.
pub(crate) fn parse_price(value: &str) -> Result<f64, String> {
    parse_numeric_string(value).ok_or_else(|| "not a monetary amount".to_string())
}

/// Currency named by a marker inside a price cell, e.g. `"$95,000"`.
///
/// Two different currencies in one cell are an error.
pub(crate) fn detect_currency(value: &str) -> Result<Option<Currency>, String> {
    let lower = value.to_lowercase();
    let mut found: Option<Currency> = None;
    for currency in CURRENCY_MARKERS
        .iter()
        .filter(|marker| lower.contains(*marker))
        .filter_map(|marker| Currency::parse(marker))
    {
        match found {
            Some(seen) if seen != currency => {
                return Err(format!("conflicting currency markers ({seen} and {currency})"));
            }
            _ => found = Some(currency),
        }
    }
    Ok(found)
}

/// Parse a whole number; `"3.0"` is accepted, `"3.5"` is not.
pub(crate) fn parse_integer(value: &str) -> Result<i64, String> {
    let number = parse_numeric_string(value).ok_or_else(|| "not an integer".to_string())?;
    if number.fract() != 0.0 {
        return Err(format!("{number} is not a whole number"));
    }
    if number.abs() > i64::MAX as f64 {
        return Err("integer out of range".to_string());
    }
    Ok(number as i64)
}

/// Parse a non-negative whole number.
pub(crate) fn parse_count(value: &str) -> Result<i64, String> {
    let count = parse_integer(value)?;
    if count < 0 {
        return Err(format!("count cannot be negative ({count})"));
    }
    Ok(count)
}

/// First whole number embedded in free text, e.g. `"3 otaqlı"`.
pub(crate) fn parse_first_integer(value: &str) -> Option<i64> {
    extract_first_number(value)
        .filter(|n| n.fract() == 0.0)
        .map(|n| n as i64)
}

/// Current floor from `"5"` or the numerator of `"5/9"`.
pub(crate) fn parse_floor(value: &str) -> Result<i64, String> {
    let current = value.split('/').next().unwrap_or(value).trim();
    parse_integer(current)
        .or_else(|_| parse_first_integer(current).ok_or_else(|| "not a floor number".to_string()))
}

/// Total floors from the denominator of `"5/9"`; `None` without a fraction.
pub(crate) fn parse_total_floors(value: &str) -> Result<Option<i64>, String> {
    match value.split_once('/') {
        Some((_, total)) => {
            let total = total.trim();
            parse_integer(total)
                .or_else(|_| {
                    parse_first_integer(total).ok_or_else(|| "not a floor count".to_string())
                })
                .map(Some)
        }
        None => Ok(None),
    }
}

/// Parse an area and convert it to square meters.
///
/// A unit label inside the value wins over the per-row unit cell, which wins
/// over the unit declared in the layout.
pub(crate) fn parse_area(
    value: &str,
    declared: AreaUnit,
    unit_cell: Option<&str>,
) -> Result<f64, String> {
    let (quantity, label) = split_quantity(value);
    let unit = AreaUnit::detect(label)
        .or_else(|| unit_cell.and_then(AreaUnit::detect))
        .unwrap_or(declared);

    let number = parse_numeric_string(quantity)
        .or_else(|| extract_first_number(value))
        .ok_or_else(|| "not an area".to_string())?;

    Ok(number * unit.to_square_meters())
}

/// Split `"1 250 m²"` into the leading quantity and the trailing label.
fn split_quantity(value: &str) -> (&str, &str) {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | ' ' | '\u{a0}')))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let (quantity, label) = trimmed.split_at(end);
    (quantity, label.trim())
}

/// Parse a boolean-like flag.
pub(crate) fn parse_bool(value: &str) -> Result<bool, String> {
    if is_boolean_true(value) {
        return Ok(true);
    }
    if is_boolean_false(value) {
        return Ok(false);
    }
    match clean_numeric_string(value).parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number != 0.0),
        _ => Err("not a boolean".to_string()),
    }
}

pub(crate) fn parse_currency(value: &str) -> Result<Currency, String> {
    Currency::parse(value).ok_or_else(|| "unknown currency".to_string())
}

/// Add a scheme to links exported without one.
pub(crate) fn normalize_url(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Split a photo cell into URLs. Accepts a JSON array or a delimited list.
pub(crate) fn parse_photo_list(value: &str) -> Vec<String> {
    if value.starts_with('[')
        && let Ok(list) = serde_json::from_str::<Vec<String>>(value)
    {
        return list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    value
        .split([',', ';', '|', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Timestamps
// =============================================================================

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y, %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d %B %Y",
];

const AZERBAIJANI_MONTHS: [(&str, u32); 12] = [
    ("yanvar", 1),
    ("fevral", 2),
    ("mart", 3),
    ("aprel", 4),
    ("may", 5),
    ("iyun", 6),
    ("iyul", 7),
    ("avqust", 8),
    ("sentyabr", 9),
    ("oktyabr", 10),
    ("noyabr", 11),
    ("dekabr", 12),
];

/// Parse a timestamp in any of the formats seen in the exports.
pub(crate) fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format)
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(dt);
        }
    }

    if let Some(dt) = parse_epoch(trimmed) {
        return Ok(dt);
    }

    parse_local_date(trimmed).ok_or_else(|| "unrecognized timestamp".to_string())
}

/// Unix timestamps in seconds or milliseconds.
fn parse_epoch(value: &str) -> Option<NaiveDateTime> {
    let timestamp = value.parse::<i64>().ok()?;
    if timestamp > 1_000_000_000 && timestamp < 2_000_000_000 {
        DateTime::from_timestamp(timestamp, 0).map(|dt| dt.naive_utc())
    } else if timestamp > 1_000_000_000_000 && timestamp < 2_000_000_000_000 {
        DateTime::from_timestamp_millis(timestamp).map(|dt| dt.naive_utc())
    } else {
        None
    }
}

/// Dates like `"25 sentyabr 2025"` or `"3 mart 2025, 14:30"`.
fn parse_local_date(value: &str) -> Option<NaiveDateTime> {
    let lower = value.to_lowercase();
    let mut parts = lower.split([' ', ',']).filter(|p| !p.is_empty());

    let day = parts.next()?.parse::<u32>().ok()?;
    let month_name = parts.next()?;
    let month = AZERBAIJANI_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, number)| *number)?;
    let year = parts.next()?.parse::<i32>().ok()?;

    let (hour, minute) = match parts.next() {
        Some(time) => {
            let (h, m) = time.split_once(':')?;
            (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)
        }
        None => (0, 0),
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}
