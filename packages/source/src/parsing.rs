//! Shared parsing utilities for published statistics tables.

/// Markers used by statistical agencies for suppressed or unavailable
/// cells.
const MISSING_MARKERS: &[&str] = &["", "..", "...", "x", "X", "F", "NA", "n/a"];

/// Parses the reference year from a period label such as `"2021"`,
/// `"2021-01"` or `"2021/2022"`. Returns `None` if the label does not start
/// with exactly four digits.
#[must_use]
pub fn parse_period(s: &str) -> Option<i32> {
    let s = s.trim();
    let digits = s.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s[4..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether a cell is a missing-value marker rather than a number.
#[must_use]
pub fn is_missing_marker(s: &str) -> bool {
    MISSING_MARKERS.contains(&s.trim())
}

/// Parses a numeric cell, tolerating thousands separators. Returns `None`
/// if the cell is not a finite number.
#[must_use]
pub fn parse_value(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Strips a UTF-8 byte-order mark and surrounding whitespace from a header.
#[must_use]
pub fn normalize_header(s: &str) -> &str {
    s.trim_start_matches('\u{feff}').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_year() {
        assert_eq!(parse_period("2021"), Some(2021));
        assert_eq!(parse_period(" 1998 "), Some(1998));
    }

    #[test]
    fn parses_year_prefixed_labels() {
        assert_eq!(parse_period("2021-01"), Some(2021));
        assert_eq!(parse_period("2021/2022"), Some(2021));
    }

    #[test]
    fn rejects_invalid_period() {
        assert_eq!(parse_period("21"), None);
        assert_eq!(parse_period("20210"), None);
        assert_eq!(parse_period("FY21"), None);
    }

    #[test]
    fn recognizes_missing_markers() {
        assert!(is_missing_marker(".."));
        assert!(is_missing_marker(" "));
        assert!(is_missing_marker("x"));
        assert!(!is_missing_marker("0"));
    }

    #[test]
    fn parses_values_with_separators() {
        assert_eq!(parse_value("1,234.5"), Some(1234.5));
        assert_eq!(parse_value("-3"), Some(-3.0));
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("inf"), None);
    }

    #[test]
    fn strips_bom_from_header() {
        assert_eq!(normalize_header("\u{feff}REF_DATE"), "REF_DATE");
    }
}
