// 🛰️ Extraction - Scanned images → analyze-result JSON files
// The document-understanding service is an opaque collaborator behind a trait

#[cfg(feature = "extract")]
pub mod client;

#[cfg(feature = "extract")]
pub use client::ContentUnderstandingClient;

use crate::archive::{ArchiveReport, Archiver};
use crate::config::ExtractionSettings;
use crate::ingest::SkippedItem;
use crate::parser::parse_value;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name prefix of images that were already sent for extraction
pub const DONE_PREFIX: &str = "DONE_";

// ============================================================================
// EXTRACTOR TRAIT
// ============================================================================

/// Anything that turns one image into an analyze-result payload
pub trait DocumentExtractor {
    fn analyze(&self, image: &Path) -> Result<Value>;
}

// ============================================================================
// REQUEST SHAPE (pure, shared with the HTTP client)
// ============================================================================

/// Analyze endpoint for an analyzer
pub fn analyze_url(settings: &ExtractionSettings) -> String {
    format!(
        "{}/contentunderstanding/analyzers/{}:analyze?api-version={}&stringEncoding=utf16",
        settings.endpoint, settings.analyzer_id, settings.api_version
    )
}

/// Auth and user-agent headers; a subscription key wins over a token
pub fn auth_headers(settings: &ExtractionSettings) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some(key) = settings.effective_subscription_key() {
        headers.push(("ocp-apim-subscription-key", key.to_string()));
    } else if let Some(token) = settings.effective_aad_token() {
        headers.push(("authorization", format!("Bearer {}", token)));
    }
    headers.push(("x-ms-useragent", settings.user_agent.clone()));
    headers
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Succeeded,
    Failed,
    Running,
}

/// Status of a polled operation; anything unrecognised counts as still running
pub fn operation_status(body: &Value) -> OperationStatus {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    match status.as_str() {
        "succeeded" => OperationStatus::Succeeded,
        "failed" => OperationStatus::Failed,
        _ => OperationStatus::Running,
    }
}

/// Short id of an operation for log lines
pub fn operation_id(operation_location: &str) -> &str {
    let last = operation_location.rsplit('/').next().unwrap_or(operation_location);
    last.split('?').next().unwrap_or(last)
}

// ============================================================================
// BATCH
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// (image, result file) per successful extraction
    pub saved: Vec<(PathBuf, PathBuf)>,
    pub failed: Vec<SkippedItem>,
    pub archive: ArchiveReport,
}

/// Images waiting for extraction: plain files not yet marked `DONE_`, sorted
///
/// A missing folder has nothing pending.
pub fn pending_images(image_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    if !image_dir.exists() {
        warn!(folder = %image_dir.display(), "Image folder not found");
        return Ok(images);
    }
    for entry in fs::read_dir(image_dir)
        .with_context(|| format!("Failed to read image folder: {}", image_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_file() && !name.starts_with(DONE_PREFIX) && !name.starts_with('.') {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Result file name for an image: `<stem>_result.json`
pub fn result_path(results_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    results_dir.join(format!("{}_result.json", stem))
}

/// Send each pending image through the extractor, save its JSON, mark it done
///
/// One failing image is recorded and the batch moves on; it stays in place
/// so the next run offers it again.
pub fn extract_images(
    extractor: &dyn DocumentExtractor,
    image_dir: &Path,
    results_dir: &Path,
) -> Result<ExtractionReport> {
    fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create {}", results_dir.display()))?;

    let images = pending_images(image_dir)?;
    info!(count = images.len(), folder = %image_dir.display(), "Images to extract");

    let mut report = ExtractionReport::default();
    let mut done = Vec::new();

    for image in images {
        info!(file = %image.display(), "Processing file");

        let saved = extractor.analyze(&image).and_then(|payload| {
            let target = result_path(results_dir, &image);
            let file_name = target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            match parse_value(payload.clone(), &file_name) {
                Ok(docs) => info!(file = %file_name, documents = docs.len(), "Result decoded"),
                Err(err) => warn!(file = %file_name, "Result will be skipped on conversion: {}", err),
            }

            let text = serde_json::to_string_pretty(&payload)?;
            fs::write(&target, text)
                .with_context(|| format!("Failed to save {}", target.display()))?;
            Ok(target)
        });

        match saved {
            Ok(target) => {
                info!(result = %target.display(), "Result saved");
                report.saved.push((image.clone(), target));
                done.push(image);
            }
            Err(err) => {
                warn!(file = %image.display(), "Extraction failed: {:#}", err);
                report.failed.push(SkippedItem {
                    path: image,
                    kind: "extraction".to_string(),
                    reason: format!("{:#}", err),
                });
            }
        }
    }

    report.archive = Archiver::done_marker(image_dir).archive_all(&done);
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
