//! Area units and currencies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit an area value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    #[default]
    SquareMeters,
    SquareFeet,
    /// Azerbaijani land unit, 100 m².
    Sot,
    Hectare,
}

impl AreaUnit {
    /// Multiplier converting this unit into square meters.
    pub fn to_square_meters(&self) -> f64 {
        match self {
            Self::SquareMeters => 1.0,
            Self::SquareFeet => 0.092_903_04,
            Self::Sot => 100.0,
            Self::Hectare => 10_000.0,
        }
    }

    /// Recognize a unit label such as `"m²"`, `"kv.m"` or `"sot"`.
    ///
    /// Returns `None` when the label is empty or unknown.
    pub fn detect(label: &str) -> Option<Self> {
        let label: String = label
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '.' | ' ' | '\u{a0}'))
            .collect();
        match label.as_str() {
            "m²" | "m2" | "kvm" | "kvmetr" | "sqm" | "м²" | "м2" => Some(Self::SquareMeters),
            "sot" | "sots" => Some(Self::Sot),
            "ha" | "hektar" | "hectare" | "hectares" => Some(Self::Hectare),
            "ft²" | "ft2" | "sqft" | "sf" => Some(Self::SquareFeet),
            _ => None,
        }
    }
}

/// Currency of a monetary value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Azerbaijani manat.
    #[default]
    Azn,
    Usd,
    Eur,
    Rub,
    Gbp,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Azn => "AZN",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Rub => "RUB",
            Self::Gbp => "GBP",
        }
    }

    /// Parse a currency code, symbol or local name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "azn" | "₼" | "manat" | "man" | "man." | "m." => Some(Self::Azn),
            "usd" | "$" | "us$" | "dollar" | "dollars" => Some(Self::Usd),
            "eur" | "€" | "euro" | "avro" => Some(Self::Eur),
            "rub" | "₽" | "rubl" | "руб" => Some(Self::Rub),
            "gbp" | "£" => Some(Self::Gbp),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_unit_detect() {
        assert_eq!(AreaUnit::detect("m²"), Some(AreaUnit::SquareMeters));
        assert_eq!(AreaUnit::detect("M2"), Some(AreaUnit::SquareMeters));
        assert_eq!(AreaUnit::detect("kv. m"), Some(AreaUnit::SquareMeters));
        assert_eq!(AreaUnit::detect("sot"), Some(AreaUnit::Sot));
        assert_eq!(AreaUnit::detect("sq ft"), Some(AreaUnit::SquareFeet));
        assert_eq!(AreaUnit::detect("ha"), Some(AreaUnit::Hectare));
        assert_eq!(AreaUnit::detect(""), None);
        assert_eq!(AreaUnit::detect("otaq"), None);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("AZN"), Some(Currency::Azn));
        assert_eq!(Currency::parse("₼"), Some(Currency::Azn));
        assert_eq!(Currency::parse(" $ "), Some(Currency::Usd));
        assert_eq!(Currency::parse("€"), Some(Currency::Eur));
        assert_eq!(Currency::parse("yen"), None);
    }

    #[test]
    fn test_currency_serde() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        let parsed: Currency = serde_json::from_str("\"EUR\"").unwrap();
        assert_eq!(parsed, Currency::Eur);
    }
}
