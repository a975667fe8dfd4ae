//! Unit/type normalizer.
//!
//! Pure functions that turn one raw cell into one canonical typed value. The
//! conversion to apply is described by a [`ValueKind`], which source layouts
//! declare per field:
//!
//! ```rust,ignore
//! use realty_processing::normalizer::{normalize_value, price_cell_currency, CanonicalValue, Currency, ValueKind};
//! use realty_processing::types::CanonicalField;
//!
//! let price = normalize_value(CanonicalField::PriceValue, Some("150 000 ₼"), &ValueKind::Price, None)?;
//! assert_eq!(price, Some(CanonicalValue::Real(150_000.0)));
//!
//! // Currency markers in the cell are reported separately
//! let currency = price_cell_currency(CanonicalField::PriceValue, Some("$95,000"))?;
//! assert_eq!(currency, Some(Currency::Usd));
//!
//! // Placeholders become null, never zero
//! let rooms = normalize_value(CanonicalField::Rooms, Some("N/A"), &ValueKind::Integer, None)?;
//! assert_eq!(rooms, None);
//! ```

mod converters;
mod units;

pub use units::{AreaUnit, Currency};

use crate::error::NormalizationError;
use crate::types::{CanonicalField, FieldType};
use crate::utils::non_placeholder;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized value, ready to be stored on a record draft.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Currency(Currency),
    Timestamp(NaiveDateTime),
    List(Vec<String>),
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Currency(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::List(v) => write!(f, "{}", v.join("|")),
        }
    }
}

/// How a raw cell is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    /// Trimmed text.
    Text,
    /// Link; a missing scheme is added.
    Url,
    /// Whole number; fractional values are rejected.
    Integer,
    /// Non-negative whole number.
    Count,
    /// First whole number found in free text, null when there is none.
    FirstInteger,
    /// Current floor, from `"5"` or `"5/9"`.
    Floor,
    /// Total floors, from the denominator of `"5/9"`.
    TotalFloors,
    /// Decimal number.
    Decimal,
    /// Monetary amount with currency markers and grouping.
    Price,
    /// Area, converted to square meters.
    Area {
        #[serde(default)]
        unit: AreaUnit,
    },
    /// Boolean-like flag (`1/0`, `yes/no`, `var/yox`, ...).
    Bool,
    /// True when the cell holds any value.
    Presence,
    /// True when the cell equals the given value, ignoring case.
    Equals { value: String },
    /// Currency code or symbol.
    Currency,
    /// Timestamp. Lenient timestamps become null instead of failing.
    Timestamp {
        #[serde(default)]
        lenient: bool,
    },
    /// List of photo URLs.
    PhotoList,
}

impl ValueKind {
    /// Type of value this kind produces.
    pub fn output_type(&self) -> FieldType {
        match self {
            Self::Text | Self::Url => FieldType::Text,
            Self::Integer | Self::Count | Self::FirstInteger | Self::Floor | Self::TotalFloors => {
                FieldType::Integer
            }
            Self::Decimal | Self::Price | Self::Area { .. } => FieldType::Real,
            Self::Bool | Self::Presence | Self::Equals { .. } => FieldType::Bool,
            Self::Currency => FieldType::Currency,
            Self::Timestamp { .. } => FieldType::Timestamp,
            Self::PhotoList => FieldType::List,
        }
    }

    /// Flag kinds read a missing cell as `false` rather than null.
    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Presence | Self::Equals { .. })
    }
}

/// Normalize one raw cell.
///
/// `unit_cell` carries a per-row unit label for area values, when the layout
/// declares a unit column.
///
/// Returns `Ok(None)` for missing cells and placeholders.
pub fn normalize_value(
    field: CanonicalField,
    raw: Option<&str>,
    kind: &ValueKind,
    unit_cell: Option<&str>,
) -> Result<Option<CanonicalValue>, NormalizationError> {
    match non_placeholder(raw) {
        Some(value) => convert(field, value, kind, unit_cell),
        None if kind.is_flag() => Ok(Some(CanonicalValue::Bool(false))),
        None => Ok(None),
    }
}

/// Currency named inside a price cell (`"$95,000"`, `"95 000 AZN"`).
///
/// Returns `Ok(None)` for cells without a marker, missing cells and
/// placeholders.
pub fn price_cell_currency(
    field: CanonicalField,
    raw: Option<&str>,
) -> Result<Option<Currency>, NormalizationError> {
    match non_placeholder(raw) {
        Some(value) => converters::detect_currency(value)
            .map_err(|reason| NormalizationError::new(field, value, reason)),
        None => Ok(None),
    }
}

fn convert(
    field: CanonicalField,
    value: &str,
    kind: &ValueKind,
    unit_cell: Option<&str>,
) -> Result<Option<CanonicalValue>, NormalizationError> {
    let fail = |reason: String| NormalizationError::new(field, value, reason);

    let converted = match kind {
        ValueKind::Text => CanonicalValue::Text(value.to_string()),
        ValueKind::Url => CanonicalValue::Text(converters::normalize_url(value)),
        ValueKind::Integer => CanonicalValue::Integer(converters::parse_integer(value).map_err(fail)?),
        ValueKind::Count => CanonicalValue::Integer(converters::parse_count(value).map_err(fail)?),
        ValueKind::FirstInteger => match converters::parse_first_integer(value) {
            Some(number) => CanonicalValue::Integer(number),
            None => return Ok(None),
        },
        ValueKind::Floor => CanonicalValue::Integer(converters::parse_floor(value).map_err(fail)?),
        ValueKind::TotalFloors => match converters::parse_total_floors(value).map_err(fail)? {
            Some(total) => CanonicalValue::Integer(total),
            None => return Ok(None),
        },
        ValueKind::Decimal => CanonicalValue::Real(converters::parse_decimal(value).map_err(fail)?),
        ValueKind::Price => CanonicalValue::Real(converters::parse_price(value).map_err(fail)?),
        ValueKind::Area { unit } => CanonicalValue::Real(
            converters::parse_area(value, *unit, non_placeholder(unit_cell)).map_err(fail)?,
        ),
        ValueKind::Bool => CanonicalValue::Bool(converters::parse_bool(value).map_err(fail)?),
        ValueKind::Presence => CanonicalValue::Bool(true),
        ValueKind::Equals { value: expected } => {
            CanonicalValue::Bool(value.to_lowercase() == expected.trim().to_lowercase())
        }
        ValueKind::Currency => {
            CanonicalValue::Currency(converters::parse_currency(value).map_err(fail)?)
        }
        ValueKind::Timestamp { lenient } => match converters::parse_timestamp(value) {
            Ok(ts) => CanonicalValue::Timestamp(ts),
            Err(_) if *lenient => return Ok(None),
            Err(reason) => return Err(fail(reason)),
        },
        ValueKind::PhotoList => {
            let photos = converters::parse_photo_list(value);
            if photos.is_empty() {
                return Ok(None);
            }
            CanonicalValue::List(photos)
        }
    };

    Ok(Some(converted))
}
