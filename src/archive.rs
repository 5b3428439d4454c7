// 📁 Archiver - Move consumed files into processed/
// A file is moved at most once and never overwrites another; clashing names get a counter

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ingest::PROCESSED_DIR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// (from, to) for every file moved
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// (file, reason) for every file left in place
    pub failed: Vec<(PathBuf, String)>,
}

impl ArchiveReport {
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}

pub struct Archiver {
    folder: PathBuf,
    prefix: String,
}

impl Archiver {
    /// `<base>/processed/PROCESSED_<YYYYmmdd_HHMMSS>_<name>` for converted payloads
    pub fn timestamped(base_dir: &Path) -> Self {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Archiver {
            folder: base_dir.join(PROCESSED_DIR),
            prefix: format!("PROCESSED_{}_", stamp),
        }
    }

    /// `<dir>/processed/DONE_<name>` for images already sent for extraction
    pub fn done_marker(image_dir: &Path) -> Self {
        Archiver {
            folder: image_dir.join(PROCESSED_DIR),
            prefix: "DONE_".to_string(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Where `source` would land: the first free name, `_<n>` added before the
    /// extension when an earlier file already took it
    pub fn destination_for(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("No file name in {}", source.display()))?;

        let candidate = self.folder.join(format!("{}{}", self.prefix, name));
        if !candidate.exists() {
            return Ok(candidate);
        }

        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
            _ => (name, String::new()),
        };
        (1..)
            .map(|n| {
                self.folder
                    .join(format!("{}{}_{}{}", self.prefix, stem, n, extension))
            })
            .find(|path| !path.exists())
            .ok_or_else(|| anyhow!("No free archive name for {}", source.display()))
    }

    /// Move one file; an existing archive entry is never replaced
    pub fn archive(&self, source: &Path) -> Result<PathBuf> {
        if !source.exists() {
            return Err(anyhow!("Source file no longer exists: {}", source.display()));
        }

        fs::create_dir_all(&self.folder)
            .with_context(|| format!("Failed to create {}", self.folder.display()))?;

        let destination = self.destination_for(source)?;
        fs::rename(source, &destination).with_context(|| {
            format!(
                "Failed to move {} to {}",
                source.display(),
                destination.display()
            )
        })?;

        Ok(destination)
    }

    /// Move every file; one failure does not stop the rest
    pub fn archive_all(&self, sources: &[PathBuf]) -> ArchiveReport {
        let mut report = ArchiveReport::default();

        for source in sources {
            match self.archive(source) {
                Ok(destination) => {
                    info!(
                        from = %source.display(),
                        to = %destination.display(),
                        "Moved to processed folder"
                    );
                    report.moved.push((source.clone(), destination));
                }
                Err(err) => {
                    warn!(file = %source.display(), "Error moving file: {:#}", err);
                    report.failed.push((source.clone(), format!("{:#}", err)));
                }
            }
        }

        report
    }
}

// ============================================================================
// TESTS
// ============================================================================
