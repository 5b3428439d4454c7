// 🔀 Record Normalizer - Documents → flat rows → year buckets → summary
// Pure value transformations, no I/O

use crate::parser::SourceDocument;
use crate::year::{extract_year, YearLabel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Column order of every flat table
pub const FLAT_COLUMNS: [&str; 6] = ["SHOW", "DATES", "ROLE", "ARTIST", "OTHER", "FILENAME"];

/// Column order of the Summary sheet
pub const SUMMARY_COLUMNS: [&str; 3] = ["YEAR", "ROW_COUNT", "SHOW_COUNT"];

// ============================================================================
// FLAT ROW
// ============================================================================

/// FlatRow - One output record; empty string stands in for "absent"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    #[serde(rename = "SHOW")]
    pub show: String,

    #[serde(rename = "DATES")]
    pub dates: String,

    #[serde(rename = "ROLE")]
    pub role: String,

    #[serde(rename = "ARTIST")]
    pub artist: String,

    #[serde(rename = "OTHER")]
    pub other: String,

    #[serde(rename = "FILENAME")]
    pub filename: String,
}

impl FlatRow {
    /// Cells in `FLAT_COLUMNS` order
    pub fn cells(&self) -> [&str; 6] {
        [
            self.show.as_str(),
            self.dates.as_str(),
            self.role.as_str(),
            self.artist.as_str(),
            self.other.as_str(),
            self.filename.as_str(),
        ]
    }

    /// Year bucket this row belongs to
    pub fn year(&self) -> YearLabel {
        extract_year(&self.dates)
    }
}

/// Expand a document into one row per role entry
///
/// Document-level fields are copied into every row. A document with no
/// roles contributes nothing.
pub fn flatten(document: &SourceDocument) -> Vec<FlatRow> {
    let show = document.show.clone().unwrap_or_default();
    let dates = document.dates.clone().unwrap_or_default();

    document
        .roles
        .iter()
        .map(|entry| FlatRow {
            show: show.clone(),
            dates: dates.clone(),
            role: entry.role.clone().unwrap_or_default(),
            artist: entry.artist.clone().unwrap_or_default(),
            other: entry.other.clone().unwrap_or_default(),
            filename: document.filename.clone(),
        })
        .collect()
}

// ============================================================================
// YEAR BUCKETS
// ============================================================================

/// Rows grouped by year label. Iteration is ascending with `Unknown` last.
pub type YearBuckets = BTreeMap<YearLabel, Vec<FlatRow>>;

/// Stable grouping of rows by the year found in their `dates` field
pub fn bucket(rows: impl IntoIterator<Item = FlatRow>) -> YearBuckets {
    let mut buckets = YearBuckets::new();
    for row in rows {
        buckets.entry(row.year()).or_default().push(row);
    }
    buckets
}

/// Total rows across all buckets
pub fn total_rows(buckets: &YearBuckets) -> usize {
    buckets.values().map(Vec::len).sum()
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub year: YearLabel,
    pub row_count: usize,
    pub show_count: usize,
}

impl SummaryRecord {
    pub fn sheet_name(&self) -> String {
        self.year.sheet_name()
    }
}

/// One record per bucket, ordered by year with `Unknown` last
///
/// Show names are compared exactly; "Tosca" and "TOSCA" count twice.
pub fn summarize(buckets: &YearBuckets) -> Vec<SummaryRecord> {
    buckets
        .iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(year, rows)| {
            let shows: HashSet<&str> = rows
                .iter()
                .map(|row| row.show.as_str())
                .filter(|show| !show.is_empty())
                .collect();

            SummaryRecord {
                year: *year,
                row_count: rows.len(),
                show_count: shows.len(),
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RoleEntry;

    fn row(show: &str, dates: &str, role: &str) -> FlatRow {
        FlatRow {
            show: show.to_string(),
            dates: dates.to_string(),
            role: role.to_string(),
            artist: "Someone".to_string(),
            other: String::new(),
            filename: "test.json".to_string(),
        }
    }

    #[test]
    fn test_flatten_empty_roles() {
        let doc = SourceDocument::new("empty.json").with_show("Aida").with_dates("1985");
        assert!(flatten(&doc).is_empty());
    }

    #[test]
    fn test_flatten_row_count_matches_roles() {
        let doc = SourceDocument::new("tosca.json")
            .with_show("Tosca")
            .with_dates("1981-82")
            .with_role(RoleEntry::new("Director", "B. Lee"))
            .with_role(RoleEntry::new("Tosca", "C. Jones").with_other("Act II only"))
            .with_role(RoleEntry::default());

        let rows = flatten(&doc);
        assert_eq!(rows.len(), doc.roles.len());

        assert_eq!(rows[0].show, "Tosca");
        assert_eq!(rows[0].dates, "1981-82");
        assert_eq!(rows[0].role, "Director");
        assert_eq!(rows[0].artist, "B. Lee");
        assert_eq!(rows[0].other, "");
        assert_eq!(rows[0].filename, "tosca.json");
        assert_eq!(rows[1].other, "Act II only");
    }

    #[test]
    fn test_flatten_missing_document_fields_become_empty() {
        let doc = SourceDocument::new("bare.json").with_role(RoleEntry::default());
        let rows = flatten(&doc);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells(), ["", "", "", "", "", "bare.json"]);
    }

    #[test]
    fn test_bucket_is_stable_partition() {
        let rows = vec![
            row("A", "1980", "r1"),
            row("B", "1981-82", "r2"),
            row("C", "", "r3"),
            row("D", "Fall 1980", "r4"),
            row("E", "n.d.", "r5"),
        ];

        let buckets = bucket(rows.clone());

        assert_eq!(buckets.len(), 3);
        assert_eq!(total_rows(&buckets), rows.len());

        let roles = |label: YearLabel| {
            buckets[&label]
                .iter()
                .map(|r| r.role.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(roles(YearLabel::Year(1980)), vec!["r1", "r4"]);
        assert_eq!(roles(YearLabel::Year(1981)), vec!["r2"]);
        assert_eq!(roles(YearLabel::Unknown), vec!["r3", "r5"]);

        // Every input row lands in exactly one bucket
        for r in &rows {
            let hits = buckets.values().filter(|b| b.contains(r)).count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_bucket_without_unknown_rows_has_no_unknown_bucket() {
        let buckets = bucket(vec![row("A", "1990", "r1")]);
        assert!(!buckets.contains_key(&YearLabel::Unknown));
    }

    #[test]
    fn test_bucket_empty_input() {
        assert!(bucket(Vec::new()).is_empty());
    }

    #[test]
    fn test_summarize_counts_and_order() {
        let buckets = bucket(vec![
            row("Tosca", "n.d.", "r0"),
            row("Aida", "1999", "r1"),
            row("Carmen", "1980", "r2"),
            row("Carmen", "1980", "r3"),
            row("", "1980", "r4"),
            row("carmen", "1980", "r5"),
        ]);

        let summary = summarize(&buckets);
        let years: Vec<YearLabel> = summary.iter().map(|s| s.year).collect();
        assert_eq!(
            years,
            vec![YearLabel::Year(1980), YearLabel::Year(1999), YearLabel::Unknown]
        );

        // Empty show ignored, case-sensitive distinct
        assert_eq!(summary[0].row_count, 4);
        assert_eq!(summary[0].show_count, 2);

        for record in &summary {
            assert_eq!(record.row_count, buckets[&record.year].len());
            assert!(record.show_count <= record.row_count);
        }
        assert_eq!(summary[2].sheet_name(), "Unknown_Year");
    }
}
