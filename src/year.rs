// 📅 Year Extractor - Free-form date strings → year labels
// Heuristic: first four-digit 19xx/20xx run wins, otherwise Unknown

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// YEAR LABEL
// ============================================================================

/// Bucket key for a row. Derived ordering puts every year before `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum YearLabel {
    Year(u16),
    Unknown,
}

impl YearLabel {
    /// Worksheet name used in year-sheet workbooks
    pub fn sheet_name(&self) -> String {
        match self {
            YearLabel::Year(year) => format!("Year_{}", year),
            YearLabel::Unknown => "Unknown_Year".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, YearLabel::Unknown)
    }
}

impl fmt::Display for YearLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearLabel::Year(year) => write!(f, "{}", year),
            YearLabel::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A digit run of exactly four, so "1980-81" → 1980 but "19801" → nothing
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)").expect("year pattern is valid")
    })
}

/// Extract a best-effort year from a free-form date or date-range string
///
/// # Examples:
/// ```
/// use playbill_archive::year::{extract_year, YearLabel};
///
/// assert_eq!(extract_year("1980-81"), YearLabel::Year(1980));
/// assert_eq!(extract_year("Spring 1982 season"), YearLabel::Year(1982));
/// assert_eq!(extract_year(""), YearLabel::Unknown);
/// ```
///
/// Several years in one string: the first one wins, whatever it means.
pub fn extract_year(dates: &str) -> YearLabel {
    let dates = dates.trim();
    if dates.is_empty() {
        return YearLabel::Unknown;
    }

    year_pattern()
        .captures(dates)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(YearLabel::Year)
        .unwrap_or(YearLabel::Unknown)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_yields_start_year() {
        assert_eq!(extract_year("1980-81"), YearLabel::Year(1980));
        assert_eq!(extract_year("1981–82"), YearLabel::Year(1981));
    }

    #[test]
    fn test_single_year() {
        assert_eq!(extract_year("1980"), YearLabel::Year(1980));
        assert_eq!(extract_year("Spring 1982 season"), YearLabel::Year(1982));
        assert_eq!(extract_year("2004-10-05"), YearLabel::Year(2004));
    }

    #[test]
    fn test_unknown_inputs() {
        assert_eq!(extract_year(""), YearLabel::Unknown);
        assert_eq!(extract_year("   "), YearLabel::Unknown);
        assert_eq!(extract_year("no date here"), YearLabel::Unknown);
        assert_eq!(extract_year("October 5-12"), YearLabel::Unknown);
    }

    #[test]
    fn test_rejects_runs_that_are_not_four_digits() {
        assert_eq!(extract_year("19801"), YearLabel::Unknown);
        assert_eq!(extract_year("Program no. 1875"), YearLabel::Unknown);
        assert_eq!(extract_year("ref 219804"), YearLabel::Unknown);
    }

    #[test]
    fn test_year_adjacent_to_letters() {
        assert_eq!(extract_year("the 1980s revival"), YearLabel::Year(1980));
    }

    #[test]
    fn test_first_year_wins() {
        assert_eq!(
            extract_year("reprinted 2020 program from 1980"),
            YearLabel::Year(2020)
        );
    }

    #[test]
    fn test_label_ordering_puts_unknown_last() {
        let mut labels = vec![
            YearLabel::Unknown,
            YearLabel::Year(1999),
            YearLabel::Year(1980),
        ];
        labels.sort();
        assert_eq!(
            labels,
            vec![YearLabel::Year(1980), YearLabel::Year(1999), YearLabel::Unknown]
        );
    }

    #[test]
    fn test_display_and_sheet_names() {
        assert_eq!(YearLabel::Year(1980).to_string(), "1980");
        assert_eq!(YearLabel::Unknown.to_string(), "Unknown");
        assert_eq!(YearLabel::Year(1980).sheet_name(), "Year_1980");
        assert_eq!(YearLabel::Unknown.sheet_name(), "Unknown_Year");
    }
}
