// 🚚 Conversion Pipeline - ingest → write → archive, plus the run report
// The sink only runs once every readable file has been flattened

use crate::archive::{ArchiveReport, Archiver};
use crate::config::{InputConfig, SinkConfig};
use crate::ingest::{ingest, BatchResult};
use crate::normalize::{summarize, FlatRow, SummaryRecord};
use crate::sink::{write, WriteOutcome};
use anyhow::Result;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub batch: BatchResult,
    pub summary: Vec<SummaryRecord>,
    pub outcome: WriteOutcome,
    pub archive: Option<ArchiveReport>,
}

impl ConversionReport {
    /// First `limit` rows in output order
    pub fn preview(&self, limit: usize) -> &[FlatRow] {
        let end = limit.min(self.batch.rows.len());
        &self.batch.rows[..end]
    }
}

/// Convert every payload the input config finds into the configured sink
///
/// A schema conflict on the destination fails the whole conversion and
/// nothing is archived. With `archive` set, consumed files are moved only
/// after the sink was written.
pub fn convert(input: &InputConfig, sink: &SinkConfig, archive: bool) -> Result<ConversionReport> {
    sink.validate()?;

    let batch = ingest(input)?;
    if !batch.has_rows() {
        warn!("No valid data extracted from any files");
    }

    let outcome = write(&batch.rows, sink)?;
    let summary = summarize(&batch.buckets());

    let archive = if archive && outcome.written {
        let archiver = Archiver::timestamped(input.base_dir());
        Some(archiver.archive_all(&batch.processed))
    } else {
        None
    };

    Ok(ConversionReport {
        batch,
        summary,
        outcome,
        archive,
    })
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Conversion Report")?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;

        let batch = &self.batch;
        writeln!(
            f,
            "✓ Files processed: {} ({} without roles)",
            batch.processed.len(),
            batch.empty.len()
        )?;
        for (path, rows) in batch.processed_files() {
            if rows == 0 {
                writeln!(f, "   - {} (no roles)", path.display())?;
            } else {
                writeln!(f, "   - {} ({} rows)", path.display(), rows)?;
            }
        }
        writeln!(f, "✓ Files skipped: {}", batch.skipped.len())?;
        for item in &batch.skipped {
            writeln!(f, "   - {} [{}]: {}", item.path.display(), item.kind, item.reason)?;
        }

        writeln!(
            f,
            "✓ Rows: {} from {} documents",
            batch.rows.len(),
            batch.documents
        )?;
        for record in &self.summary {
            writeln!(
                f,
                "   {:<8} {:>6} rows {:>4} shows",
                record.year.to_string(),
                record.row_count,
                record.show_count
            )?;
        }

        if self.outcome.written {
            write!(
                f,
                "✓ Output: {} ({} new rows",
                self.outcome.destination.display(),
                self.outcome.rows_written
            )?;
            if self.outcome.existing_rows > 0 {
                write!(f, ", {} existing", self.outcome.existing_rows)?;
            }
            writeln!(f, ")")?;
            if !self.outcome.sheets.is_empty() {
                writeln!(f, "   Sheets: {}", self.outcome.sheets.join(", "))?;
            }
        } else {
            writeln!(f, "⚠️  No data to save")?;
        }

        if let Some(archive) = &self.archive {
            writeln!(
                f,
                "📁 Archived: {} files ({} failed)",
                archive.moved_count(),
                archive.failed.len()
            )?;
            for (file, reason) in &archive.failed {
                writeln!(f, "   - {}: {}", file.display(), reason)?;
            }
        }

        Ok(())
    }
}

/// Fixed-width sample of rows for the terminal
pub fn format_preview(rows: &[FlatRow], total: usize) -> String {
    let rule = "-".repeat(90);
    let mut out = String::new();

    out.push_str(&format!("Sample of converted data (first {} rows):\n", rows.len()));
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(
        "{:<20} {:<10} {:<25} {:<20} {}\n",
        "SHOW", "DATES", "ROLE", "ARTIST", "OTHER"
    ));
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{:<20} {:<10} {:<25} {:<20} {}\n",
            row.show, row.dates, row.role, row.artist, row.other
        ));
    }
    if total > rows.len() {
        out.push_str(&format!("... and {} more rows\n", total - rows.len()));
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputFormat, SinkMode};
    use crate::ingest::PROCESSED_DIR;
    use std::fs;

    const CARMEN: &str = r#"{"result": {"contents": [{"fields": {
        "SHOW": {"valueString": "Carmen"},
        "DATES": {"valueString": "1980"},
        "ROLES": {"valueArray": [
            {"valueObject": {"ROLE": {"valueString": "Conductor"}, "ARTIST": {"valueString": "A. Smith"}}}
        ]}}}]}}"#;

    #[test]
    fn test_convert_with_archive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("carmen_result.json"), CARMEN).unwrap();
        fs::write(dir.path().join("broken.json"), "nope").unwrap();

        let out = dir.path().join("by_year.xlsx");
        let sink = SinkConfig::new(&out, OutputFormat::Excel, SinkMode::YearSheets);
        let report = convert(&InputConfig::new(dir.path()), &sink, true).unwrap();

        assert!(out.exists());
        assert_eq!(report.batch.processed.len(), 1);
        assert_eq!(report.batch.skipped.len(), 1);
        assert_eq!(report.summary.len(), 1);

        let archive = report.archive.as_ref().unwrap();
        assert_eq!(archive.moved_count(), 1);
        assert!(!dir.path().join("carmen_result.json").exists());
        // Skipped files stay where they were
        assert!(dir.path().join("broken.json").exists());
        assert!(dir.path().join(PROCESSED_DIR).is_dir());

        let text = report.to_string();
        assert!(text.contains("Files processed: 1"));
        assert!(text.contains("carmen_result.json (1 rows)"));
        assert!(text.contains("Files skipped: 1"));
        assert!(text.contains("malformed-json"));
        assert!(text.contains("Year_1980, Summary"));
        assert!(text.contains("Archived: 1 files"));
    }

    #[test]
    fn test_convert_schema_conflict_archives_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("carmen_result.json");
        fs::write(&payload, CARMEN).unwrap();

        let out = dir.path().join("table.csv");
        fs::write(&out, "NAME,YEAR\nx,1\n").unwrap();

        let sink = SinkConfig::new(&out, OutputFormat::Csv, SinkMode::Flat).with_append(true);
        assert!(convert(&InputConfig::new(dir.path()), &sink, true).is_err());
        assert!(payload.exists());
    }

    #[test]
    fn test_convert_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        let sink = SinkConfig::new(&out, OutputFormat::Csv, SinkMode::Flat);

        let report = convert(&InputConfig::new(dir.path()), &sink, true).unwrap();
        assert!(!report.outcome.written);
        assert!(report.archive.is_none());
        assert!(!out.exists());
        assert!(report.to_string().contains("No data to save"));
    }

    #[test]
    fn test_preview_limits_rows() {
        let rows: Vec<FlatRow> = (0..7)
            .map(|i| FlatRow {
                show: format!("Show {}", i),
                dates: "1980".to_string(),
                role: "Role".to_string(),
                artist: "Artist".to_string(),
                other: String::new(),
                filename: "f.json".to_string(),
            })
            .collect();

        let text = format_preview(&rows[..5], rows.len());
        assert!(text.contains("Show 4"));
        assert!(!text.contains("Show 5"));
        assert!(text.contains("... and 2 more rows"));
    }
}
