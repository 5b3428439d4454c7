// ⚠️ Error Types - Per-item vs per-destination failures
// Item errors skip one input file; sink errors fail one destination

use std::path::PathBuf;
use thiserror::Error;

/// Result type for playbill operations with a typed error
pub type Result<T> = std::result::Result<T, PlaybillError>;

#[derive(Error, Debug)]
pub enum PlaybillError {
    /// Input bytes are not JSON at all
    #[error("Malformed JSON in '{file}': {source}")]
    MalformedJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON parsed, but the extraction envelope is missing or mistyped
    #[error("Schema mismatch in '{file}': {reason}")]
    SchemaMismatch { file: String, reason: String },

    /// Append destination carries a different column layout
    #[error("Schema conflict on append to {}: expected columns {expected:?}, found {found:?}", .path.display())]
    SchemaConflict {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Output layout not representable in the chosen format
    #[error("Layout error: {0}")]
    Layout(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybillError {
    /// True for failures that only affect a single input item
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            PlaybillError::MalformedJson { .. }
                | PlaybillError::SchemaMismatch { .. }
                | PlaybillError::Io(_)
        )
    }

    /// Short kind label for run reports
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybillError::MalformedJson { .. } => "malformed-json",
            PlaybillError::SchemaMismatch { .. } => "schema-mismatch",
            PlaybillError::SchemaConflict { .. } => "schema-conflict",
            PlaybillError::Layout(_) => "layout",
            PlaybillError::Config(_) => "config",
            PlaybillError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_errors_are_classified() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let malformed = PlaybillError::MalformedJson {
            file: "a.json".to_string(),
            source: err,
        };
        let mismatch = PlaybillError::SchemaMismatch {
            file: "b.json".to_string(),
            reason: "missing result".to_string(),
        };
        let conflict = PlaybillError::SchemaConflict {
            path: PathBuf::from("out.csv"),
            expected: vec!["SHOW".to_string()],
            found: vec!["NAME".to_string()],
        };

        assert!(malformed.is_item_error());
        assert!(mismatch.is_item_error());
        assert!(!conflict.is_item_error());
        assert_eq!(conflict.kind(), "schema-conflict");
    }

    #[test]
    fn test_error_messages_name_the_file() {
        let mismatch = PlaybillError::SchemaMismatch {
            file: "tosca_result.json".to_string(),
            reason: "missing result.contents".to_string(),
        };
        let msg = mismatch.to_string();
        assert!(msg.contains("tosca_result.json"));
        assert!(msg.contains("missing result.contents"));
    }
}
