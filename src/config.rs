// ⚙️ Configuration - Explicit values built once at startup
// Library code never reads the environment; main() does and passes these in

use crate::error::{PlaybillError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Csv,
    Excel,
}

impl OutputFormat {
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "xlsx",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OutputFormat::Csv => "CSV",
            OutputFormat::Excel => "Excel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkMode {
    /// All rows in one table
    Flat,
    /// One sheet per year plus Summary
    YearSheets,
}

/// Where and how the Sink Writer puts its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub destination: PathBuf,
    pub format: OutputFormat,
    pub mode: SinkMode,
    pub append: bool,
}

impl SinkConfig {
    pub fn new(destination: impl Into<PathBuf>, format: OutputFormat, mode: SinkMode) -> Self {
        SinkConfig {
            destination: destination.into(),
            format,
            mode,
            append: false,
        }
    }

    /// Builder pattern: append to an existing flat table
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == SinkMode::YearSheets && self.format != OutputFormat::Excel {
            return Err(PlaybillError::Layout(format!(
                "year-sheet mode needs a multi-sheet format, got {}",
                self.format.name()
            )));
        }

        if self.mode == SinkMode::YearSheets && self.append {
            return Err(PlaybillError::Config(
                "append is only supported in flat mode".to_string(),
            ));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(PlaybillError::Config("destination path is empty".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// INPUT
// ============================================================================

/// Which payload files a batch run picks up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    /// A single JSON file or a directory of them
    pub input: PathBuf,
    pub recursive: bool,
    /// File name pattern with `*` wildcards
    pub pattern: String,
}

impl InputConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        InputConfig {
            input: input.into(),
            recursive: false,
            pattern: default_pattern(),
        }
    }

    /// Builder pattern: descend into subdirectories
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Builder pattern: custom file pattern
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = pattern.to_string();
        self
    }

    /// Output path when none is given
    ///
    /// Directory input: `<dir>/combined_data.<ext>`.
    /// File input: the same file with the format's extension.
    pub fn default_destination(&self, format: OutputFormat) -> PathBuf {
        if self.input.is_dir() {
            self.input
                .join(format!("combined_data.{}", format.extension()))
        } else {
            self.input.with_extension(format.extension())
        }
    }

    /// Directory that holds `processed/` after archival
    pub fn base_dir(&self) -> &Path {
        if self.input.is_dir() {
            &self.input
        } else {
            self.input.parent().unwrap_or_else(|| Path::new("."))
        }
    }
}

fn default_pattern() -> String {
    "*.json".to_string()
}

// ============================================================================
// EXTRACTION SERVICE
// ============================================================================

pub const DEFAULT_API_VERSION: &str = "2025-05-01-preview";
pub const DEFAULT_USER_AGENT: &str = "cu-sample-code";

/// Credentials and polling settings for the document-understanding service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub endpoint: String,
    pub api_version: String,
    pub subscription_key: Option<String>,
    pub aad_token: Option<String>,
    pub analyzer_id: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ExtractionSettings {
    pub fn new(endpoint: &str, analyzer_id: &str) -> Self {
        ExtractionSettings {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            subscription_key: None,
            aad_token: None,
            analyzer_id: analyzer_id.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Builder pattern: subscription key auth
    pub fn with_subscription_key(mut self, key: Option<String>) -> Self {
        self.subscription_key = key;
        self
    }

    /// Builder pattern: bearer token auth
    pub fn with_aad_token(mut self, token: Option<String>) -> Self {
        self.aad_token = token;
        self
    }

    /// Builder pattern: polling bounds
    pub fn with_polling(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Usable subscription key; a placeholder equal to the variable name counts as absent
    pub fn effective_subscription_key(&self) -> Option<&str> {
        usable(&self.subscription_key, "AZURE_CONTENT_UNDERSTANDING_SUBSCRIPTION_KEY")
    }

    pub fn effective_aad_token(&self) -> Option<&str> {
        usable(&self.aad_token, "AZURE_CONTENT_UNDERSTANDING_AAD_TOKEN")
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(PlaybillError::Config("Endpoint must be provided".to_string()));
        }
        if self.api_version.is_empty() {
            return Err(PlaybillError::Config("API version must be provided".to_string()));
        }
        if self.analyzer_id.is_empty() {
            return Err(PlaybillError::Config("Analyzer id must be provided".to_string()));
        }
        if self.effective_subscription_key().is_none() && self.effective_aad_token().is_none() {
            return Err(PlaybillError::Config(
                "Either a subscription key or an AAD token must be provided".to_string(),
            ));
        }
        Ok(())
    }
}

fn usable<'a>(value: &'a Option<String>, placeholder: &str) -> Option<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != placeholder)
}

// ============================================================================
// TESTS
// ============================================================================
