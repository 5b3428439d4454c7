// 📥 Batch Ingester - Discover payload files, flatten them, skip the bad ones
// Strictly sequential: one file at a time, one bad file never stops the batch

use crate::config::InputConfig;
use crate::error::PlaybillError;
use crate::normalize::{bucket, flatten, FlatRow, YearBuckets};
use crate::parser::load_documents;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Subfolder that receives consumed files; never walked during discovery
pub const PROCESSED_DIR: &str = "processed";

// ============================================================================
// FILE PATTERNS
// ============================================================================

/// Case-insensitive file name match with `*` wildcards
///
/// Without a `*` the whole name must match.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern_lower = pattern.to_lowercase();
    let text_lower = name.to_lowercase();

    if !pattern_lower.contains('*') {
        return pattern_lower == text_lower;
    }

    let parts: Vec<&str> = pattern_lower.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    // Prefix and suffix may not overlap
    if text_lower.len() < first.len() + last.len() {
        return false;
    }
    if !text_lower.starts_with(first) || !text_lower.ends_with(last) {
        return false;
    }

    // Middle parts appear in order between prefix and suffix
    let end = text_lower.len() - last.len();
    let mut current_pos = first.len();
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match text_lower[current_pos..end].find(part) {
            Some(pos) => current_pos += pos + part.len(),
            None => return false,
        }
    }

    true
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Payload files for a run, sorted by path
///
/// A file input is taken as-is. A directory input yields its files whose
/// names match the pattern, descending only when `recursive` is set and
/// never into `processed/`.
pub fn discover_inputs(config: &InputConfig) -> Result<Vec<PathBuf>> {
    let input = &config.input;

    if input.is_file() {
        return Ok(vec![input.clone()]);
    }

    if !input.is_dir() {
        return Err(anyhow!(
            "Input path '{}' is neither a file nor a directory",
            input.display()
        ));
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(input)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != PROCESSED_DIR);

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if matches_pattern(&config.pattern, &name) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// BATCH
// ============================================================================

/// An input the batch could not use, with the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub kind: String,
    pub reason: String,
}

impl SkippedItem {
    fn from_error(path: &Path, err: &PlaybillError) -> Self {
        SkippedItem {
            path: path.to_path_buf(),
            kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Everything one batch produced
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// All rows from all files, in file order then document order
    pub rows: Vec<FlatRow>,
    /// Files read successfully, including those that produced no rows
    pub processed: Vec<PathBuf>,
    /// Row count of each entry in `processed`, same order
    pub processed_rows: Vec<usize>,
    /// Subset of `processed` that held no roles at all
    pub empty: Vec<PathBuf>,
    pub skipped: Vec<SkippedItem>,
    pub documents: usize,
}

impl BatchResult {
    pub fn buckets(&self) -> YearBuckets {
        bucket(self.rows.iter().cloned())
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Each processed file with the rows it produced
    pub fn processed_files(&self) -> impl Iterator<Item = (&PathBuf, usize)> + '_ {
        self.processed.iter().zip(self.processed_rows.iter().copied())
    }
}

/// Load and flatten each file in order; per-item failures are recorded and skipped
pub fn ingest_files(paths: &[PathBuf]) -> BatchResult {
    let mut batch = BatchResult::default();

    for path in paths {
        info!(file = %path.display(), "Processing");

        match load_documents(path) {
            Ok(documents) => {
                let rows: Vec<FlatRow> = documents.iter().flat_map(flatten).collect();

                if rows.is_empty() {
                    info!(file = %path.display(), "No role entries found");
                    batch.empty.push(path.clone());
                } else {
                    info!(file = %path.display(), rows = rows.len(), "Extracted rows");
                }

                batch.documents += documents.len();
                batch.processed_rows.push(rows.len());
                batch.rows.extend(rows);
                batch.processed.push(path.clone());
            }
            Err(err) => {
                warn!(file = %path.display(), kind = err.kind(), "Skipping: {}", err);
                batch.skipped.push(SkippedItem::from_error(path, &err));
            }
        }
    }

    batch
}

/// Discover and ingest in one step
pub fn ingest(config: &InputConfig) -> Result<BatchResult> {
    let files = discover_inputs(config)?;
    if files.is_empty() {
        warn!(
            input = %config.input.display(),
            pattern = %config.pattern,
            "No JSON files found"
        );
    } else {
        info!(count = files.len(), "Found JSON files to process");
    }
    Ok(ingest_files(&files))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn payload(show: &str, dates: &str, roles: &[(&str, &str)]) -> String {
        let roles: Vec<serde_json::Value> = roles
            .iter()
            .map(|(role, artist)| {
                serde_json::json!({ "valueObject": {
                    "ROLE": { "valueString": role },
                    "ARTIST": { "valueString": artist }
                }})
            })
            .collect();

        serde_json::json!({
            "result": { "contents": [{ "fields": {
                "SHOW": { "valueString": show },
                "DATES": { "valueString": dates },
                "ROLES": { "valueArray": roles }
            }}]}
        })
        .to_string()
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("*.json", "carmen_result.json"));
        assert!(matches_pattern("*.json", "CARMEN.JSON"));
        assert!(!matches_pattern("*.json", "carmen.csv"));
        assert!(matches_pattern("*_result.json", "tosca_result.json"));
        assert!(!matches_pattern("*_result.json", "tosca.json"));
        assert!(matches_pattern("19*_*.json", "1980_carmen.json"));
        assert!(matches_pattern("exact.json", "exact.json"));
        assert!(!matches_pattern("exact.json", "not_exact.json"));
        assert!(matches_pattern("*", "anything"));
        // Prefix and suffix cannot share characters
        assert!(!matches_pattern("ab*ba", "aba"));
    }

    #[test]
    fn test_discover_flat_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.json"), "{}").unwrap();

        let files = discover_inputs(&InputConfig::new(dir.path())).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_discover_recursive_skips_processed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.json"), "{}").unwrap();
        fs::create_dir(dir.path().join(PROCESSED_DIR)).unwrap();
        fs::write(dir.path().join(PROCESSED_DIR).join("PROCESSED_x.json"), "{}").unwrap();

        let config = InputConfig::new(dir.path()).with_recursive(true);
        let files = discover_inputs(&config).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| !p.to_string_lossy().contains("PROCESSED_")));
    }

    #[test]
    fn test_discover_single_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.json");
        fs::write(&file, "{}").unwrap();

        assert_eq!(discover_inputs(&InputConfig::new(&file)).unwrap(), vec![file]);
        assert!(discover_inputs(&InputConfig::new(dir.path().join("missing"))).is_err());
    }

    #[test]
    fn test_ingest_skips_bad_files_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("1_good.json");
        let broken = dir.path().join("2_broken.json");
        let wrong = dir.path().join("3_wrong.json");
        let empty = dir.path().join("4_empty.json");
        let later = dir.path().join("5_later.json");

        fs::write(&good, payload("Carmen", "1980", &[("Conductor", "A. Smith")])).unwrap();
        fs::write(&broken, "{ not json").unwrap();
        fs::write(&wrong, r#"{"status": "Failed"}"#).unwrap();
        fs::write(&empty, payload("Aida", "1985", &[])).unwrap();
        fs::write(
            &later,
            payload("Tosca", "1981-82", &[("Director", "B. Lee"), ("Tosca", "C. Jones")]),
        )
        .unwrap();

        let batch = ingest(&InputConfig::new(dir.path())).unwrap();

        assert_eq!(batch.rows.len(), 3);
        assert_eq!(batch.processed, vec![good, empty.clone(), later]);
        assert_eq!(batch.empty, vec![empty]);
        assert_eq!(batch.documents, 3);
        let counts: Vec<usize> = batch.processed_files().map(|(_, n)| n).collect();
        assert_eq!(counts, vec![1, 0, 2]);

        let kinds: Vec<&str> = batch.skipped.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["malformed-json", "schema-mismatch"]);
        assert_eq!(batch.skipped[0].path, broken);
        assert!(batch.skipped[1].reason.contains("3_wrong.json"));

        // File order preserved in flat output
        assert_eq!(batch.rows[0].show, "Carmen");
        assert_eq!(batch.rows[2].artist, "C. Jones");
        assert_eq!(batch.rows[2].filename, "5_later.json");
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.json");

        let batch = ingest_files(&[missing.clone()]);
        assert!(batch.processed.is_empty());
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].kind, "io");
        assert!(!batch.has_rows());
    }
}
