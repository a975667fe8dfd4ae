//! Shared string helpers for the normalizer and the deduplicator.

use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// Placeholder Detection
// =============================================================================

/// Markers that mean "no value" across the source exports.
pub const PLACEHOLDER_MARKERS: [&str; 14] = [
    "", "-", "--", "—", "?", "n/a", "na", "n.a.", "null", "none", "nan", "missing", "unknown",
    "#n/a",
];

/// Check if a raw cell is a placeholder for a missing value.
///
/// # Example
///
/// ```rust,ignore
/// use realty_processing::utils::is_placeholder;
///
/// assert!(is_placeholder(" N/A "));
/// assert!(is_placeholder("-"));
/// assert!(!is_placeholder("0"));
/// ```
pub fn is_placeholder(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|&marker| lower == marker)
}

/// Trimmed cell content, or `None` for placeholders.
pub fn non_placeholder(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !is_placeholder(s))
}

// =============================================================================
// Numeric Parsing
// =============================================================================

/// Currency markers stripped before numeric parsing. Longer markers first.
pub const CURRENCY_MARKERS: [&str; 12] = [
    "manat", "azn", "usd", "eur", "rub", "man.", "₼", "$", "€", "£", "₽", "m.",
];

/// Characters used as grouping separators in the exports.
pub const GROUPING_CHARS: [char; 4] = [' ', '\u{a0}', '\u{202f}', '\''];

/// Clean a string for numeric parsing.
///
/// Removes currency markers and grouping separators. A lone comma followed by
/// one or two trailing digits is read as a decimal comma; any other comma is a
/// thousands separator.
///
/// # Example
///
/// ```rust,ignore
/// use realty_processing::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("150 000 AZN"), "150000");
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("12,5"), "12.5");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_lowercase();
    for marker in CURRENCY_MARKERS {
        result = result.replace(marker, "");
    }
    result.retain(|c| !GROUPING_CHARS.contains(&c));

    if result.contains(',') {
        let has_dot = result.contains('.');
        let decimal_comma = !has_dot
            && result.matches(',').count() == 1
            && result
                .rsplit(',')
                .next()
                .is_some_and(|tail| (1..=2).contains(&tail.len()));
        result = if decimal_comma {
            result.replace(',', ".")
        } else {
            result.replace(',', "")
        };
    }
    result
}

/// Try to parse a string as a numeric value (f64).
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("Invalid regex: first number"));

static ROOMS_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s*-?\s*(?:otaqlı|otaqli|otaq|room|rooms|комн)")
        .expect("Invalid regex: rooms in text")
});

/// Extract the first number embedded in free text (`"85 m²"` gives 85).
pub fn extract_first_number(s: &str) -> Option<f64> {
    FIRST_NUMBER
        .find(s)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
}

/// Extract a room count from a free-text title (`"3 otaqlı mənzil"` gives 3).
pub fn extract_rooms_from_text(s: &str) -> Option<i64> {
    ROOMS_IN_TEXT
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

// =============================================================================
// Boolean Detection
// =============================================================================

/// Boolean true representations, including Azerbaijani forms.
pub const BOOLEAN_TRUE_VALUES: [&str; 11] = [
    "true", "yes", "1", "t", "y", "on", "var", "bəli", "beli", "hə", "he",
];

/// Boolean false representations, including Azerbaijani forms.
pub const BOOLEAN_FALSE_VALUES: [&str; 9] =
    ["false", "no", "0", "f", "n", "off", "yox", "xeyr", "yoxdur"];

/// Check if a string represents a boolean true value.
pub fn is_boolean_true(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    BOOLEAN_TRUE_VALUES.iter().any(|&v| v == lower)
}

/// Check if a string represents a boolean false value.
pub fn is_boolean_false(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    BOOLEAN_FALSE_VALUES.iter().any(|&v| v == lower)
}

// =============================================================================
// Text Keys
// =============================================================================

/// Lower-case, strip punctuation and collapse whitespace.
///
/// Used to compare location names coming from different platforms, e.g.
/// `"Nəsimi r., 28 May m."` and `"nəsimi r 28 may m"` produce the same key.
pub fn normalize_key_text(s: &str) -> String {
    let lowered: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("  "));
        assert!(is_placeholder("-"));
        assert!(is_placeholder("N/A"));
        assert!(is_placeholder("NaN"));
        assert!(is_placeholder("  MISSING  "));
        assert!(!is_placeholder("0"));
        assert!(!is_placeholder("Bakı"));
    }

    #[test]
    fn test_non_placeholder() {
        assert_eq!(non_placeholder(Some("  Xətai ")), Some("Xətai"));
        assert_eq!(non_placeholder(Some("null")), None);
        assert_eq!(non_placeholder(None), None);
    }

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("150 000 AZN"), "150000");
        assert_eq!(clean_numeric_string("95 000 ₼"), "95000");
        assert_eq!(clean_numeric_string("1\u{a0}250"), "1250");
        assert_eq!(clean_numeric_string("12,5"), "12.5");
        assert_eq!(clean_numeric_string("120,000"), "120000");
        assert_eq!(clean_numeric_string("1,200,000"), "1200000");
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("-500"), Some(-500.0));
        assert_eq!(parse_numeric_string("250 000 manat"), Some(250_000.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("razılaşma"), None);
    }

    #[test]
    fn test_extract_first_number() {
        assert_eq!(extract_first_number("85 m²"), Some(85.0));
        assert_eq!(extract_first_number("Sahə: 72.5 kv.m"), Some(72.5));
        assert_eq!(extract_first_number("3 otaqlı"), Some(3.0));
        assert_eq!(extract_first_number("studio"), None);
    }

    #[test]
    fn test_extract_rooms_from_text() {
        assert_eq!(extract_rooms_from_text("Satılır 3 otaqlı mənzil"), Some(3));
        assert_eq!(extract_rooms_from_text("2-otaqlı yeni tikili"), Some(2));
        assert_eq!(extract_rooms_from_text("4 rooms, sea view"), Some(4));
        assert_eq!(extract_rooms_from_text("Həyət evi"), None);
    }

    #[test]
    fn test_boolean_values() {
        assert!(is_boolean_true("Var"));
        assert!(is_boolean_true("bəli"));
        assert!(is_boolean_true("TRUE"));
        assert!(is_boolean_false("yox"));
        assert!(is_boolean_false("0"));
        assert!(!is_boolean_true("maybe"));
        assert!(!is_boolean_false("maybe"));
    }

    #[test]
    fn test_normalize_key_text() {
        assert_eq!(normalize_key_text("Nəsimi r., 28 May m."), "nəsimi r 28 may m");
        assert_eq!(normalize_key_text("  YASAMAL   "), "yasamal");
    }
}
