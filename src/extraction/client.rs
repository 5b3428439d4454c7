// Blocking HTTP client for the document-understanding analyze API

use super::{analyze_url, auth_headers, operation_id, operation_status, DocumentExtractor, OperationStatus};
use crate::config::ExtractionSettings;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

pub struct ContentUnderstandingClient {
    settings: ExtractionSettings,
    http: Client,
    headers: HeaderMap,
}

impl ContentUnderstandingClient {
    pub fn new(settings: ExtractionSettings) -> Result<Self> {
        settings.validate()?;

        let mut headers = HeaderMap::new();
        for (name, value) in auth_headers(&settings) {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).context("Invalid header value")?,
            );
        }

        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ContentUnderstandingClient {
            settings,
            http,
            headers,
        })
    }

    /// Submit a local file (raw bytes) or a URL; returns the operation location
    pub fn begin_analyze(&self, file_location: &str) -> Result<String> {
        let url = analyze_url(&self.settings);
        let request = self.http.post(&url).headers(self.headers.clone());

        let request = if Path::new(file_location).exists() {
            let data = fs::read(file_location)
                .with_context(|| format!("Failed to read {}", file_location))?;
            request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data)
        } else if file_location.starts_with("https://") || file_location.starts_with("http://") {
            request.json(&json!({ "url": file_location }))
        } else {
            bail!("File location must be a valid path or URL: {}", file_location);
        };

        let response = request
            .send()
            .context("Analyze request failed")?
            .error_for_status()
            .context("Analyze request rejected")?;

        info!(
            file = file_location,
            analyzer = %self.settings.analyzer_id,
            "Analyzing file"
        );

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or_else(|| anyhow!("Operation location not found in response headers"))
    }

    /// Poll until the operation succeeds, fails, or the timeout passes
    pub fn poll_result(&self, operation_location: &str) -> Result<Value> {
        let start = Instant::now();
        let timeout = self.settings.timeout;

        loop {
            let elapsed = start.elapsed();
            debug!(elapsed = elapsed.as_secs_f64(), "Waiting for service response");
            if elapsed > timeout {
                bail!(
                    "Operation timed out after {:.2} seconds",
                    timeout.as_secs_f64()
                );
            }

            let body: Value = self
                .http
                .get(operation_location)
                .headers(self.headers.clone())
                .send()
                .context("Poll request failed")?
                .error_for_status()
                .context("Poll request rejected")?
                .json()
                .context("Poll response is not JSON")?;

            match operation_status(&body) {
                OperationStatus::Succeeded => {
                    info!(
                        elapsed = elapsed.as_secs_f64(),
                        "Request result is ready"
                    );
                    return Ok(body);
                }
                OperationStatus::Failed => {
                    error!(reason = %body, "Request failed");
                    bail!("Request {} failed", operation_id(operation_location));
                }
                OperationStatus::Running => {
                    info!(
                        operation = operation_id(operation_location),
                        "Request in progress ..."
                    );
                }
            }

            thread::sleep(self.settings.poll_interval);
        }
    }
}

impl DocumentExtractor for ContentUnderstandingClient {
    fn analyze(&self, image: &Path) -> Result<Value> {
        let location = image.to_string_lossy();
        let operation = self.begin_analyze(&location)?;
        self.poll_result(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_credentials() {
        let settings = ExtractionSettings::new("https://example.com", "analyzer");
        assert!(ContentUnderstandingClient::new(settings).is_err());
    }

    #[test]
    fn test_client_builds_auth_headers() {
        let settings = ExtractionSettings::new("https://example.com", "analyzer")
            .with_subscription_key(Some("secret".to_string()));
        let client = ContentUnderstandingClient::new(settings).unwrap();

        assert_eq!(client.headers.get("ocp-apim-subscription-key").unwrap(), "secret");
        assert_eq!(client.headers.get("x-ms-useragent").unwrap(), "cu-sample-code");
    }

    #[test]
    fn test_begin_analyze_rejects_unknown_location() {
        let settings = ExtractionSettings::new("https://example.com", "analyzer")
            .with_subscription_key(Some("secret".to_string()));
        let client = ContentUnderstandingClient::new(settings).unwrap();

        let err = client.begin_analyze("/definitely/not/here.jpg").unwrap_err();
        assert!(err.to_string().contains("valid path or URL"));
    }
}
