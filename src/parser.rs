// 🏗️ Payload Parser - Extraction envelope → SourceDocument
// Decodes the document-understanding service's analyze result

use crate::error::{PlaybillError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// RoleEntry - One cast/crew assignment on a program page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: Option<String>,
    pub artist: Option<String>,
    pub other: Option<String>,
}

impl RoleEntry {
    pub fn new(role: &str, artist: &str) -> Self {
        RoleEntry {
            role: Some(role.to_string()),
            artist: Some(artist.to_string()),
            other: None,
        }
    }

    /// Builder pattern: add auxiliary note
    pub fn with_other(mut self, other: &str) -> Self {
        self.other = Some(other.to_string());
        self
    }
}

/// SourceDocument - One extraction result for one scanned image
/// Read-only once decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub show: Option<String>,
    pub dates: Option<String>,
    pub roles: Vec<RoleEntry>,

    // Provenance
    pub filename: String,
}

impl SourceDocument {
    pub fn new(filename: &str) -> Self {
        SourceDocument {
            show: None,
            dates: None,
            roles: Vec::new(),
            filename: filename.to_string(),
        }
    }

    /// Builder pattern: add show name
    pub fn with_show(mut self, show: &str) -> Self {
        self.show = Some(show.to_string());
        self
    }

    /// Builder pattern: add date string
    pub fn with_dates(mut self, dates: &str) -> Self {
        self.dates = Some(dates.to_string());
        self
    }

    /// Builder pattern: add one role
    pub fn with_role(mut self, role: RoleEntry) -> Self {
        self.roles.push(role);
        self
    }
}

// ============================================================================
// WIRE FORMAT (analyze result envelope)
// ============================================================================
//
// { "result": { "contents": [ { "fields": {
//     "SHOW": {"valueString"}, "DATES": {"valueString"} | "DATE": {"valueDate"},
//     "ROLES": {"valueArray": [ {"valueObject": {"ROLE", "ARTIST", "OTHER"}} ]} } } ] } }

#[derive(Debug, Deserialize)]
struct AnalyzeEnvelope {
    result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    contents: Option<Vec<ContentItem>>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(default)]
    fields: Option<DocumentFields>,
}

#[derive(Debug, Deserialize)]
struct DocumentFields {
    #[serde(rename = "SHOW")]
    show: Option<StringField>,

    #[serde(rename = "DATES")]
    dates: Option<StringField>,

    #[serde(rename = "DATE")]
    date: Option<DateField>,

    #[serde(rename = "ROLES")]
    roles: Option<ArrayField>,
}

#[derive(Debug, Deserialize)]
struct StringField {
    #[serde(rename = "valueString")]
    value_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateField {
    #[serde(rename = "valueDate")]
    value_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArrayField {
    #[serde(rename = "valueArray", default)]
    value_array: Vec<ObjectField>,
}

#[derive(Debug, Deserialize)]
struct ObjectField {
    #[serde(rename = "valueObject")]
    value_object: Option<RoleFields>,
}

#[derive(Debug, Deserialize)]
struct RoleFields {
    #[serde(rename = "ROLE")]
    role: Option<StringField>,

    #[serde(rename = "ARTIST")]
    artist: Option<StringField>,

    #[serde(rename = "OTHER")]
    other: Option<StringField>,
}

fn string_value(field: Option<StringField>) -> Option<String> {
    field.and_then(|f| f.value_string)
}

impl DocumentFields {
    fn into_document(self, filename: &str) -> SourceDocument {
        // DATES wins over DATE when both are present
        let dates = string_value(self.dates).or_else(|| self.date.and_then(|d| d.value_date));

        let roles = self
            .roles
            .map(|array| {
                array
                    .value_array
                    .into_iter()
                    .map(|entry| match entry.value_object {
                        Some(obj) => RoleEntry {
                            role: string_value(obj.role),
                            artist: string_value(obj.artist),
                            other: string_value(obj.other),
                        },
                        None => RoleEntry::default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        SourceDocument {
            show: string_value(self.show),
            dates,
            roles,
            filename: filename.to_string(),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Decode one analyze-result payload
///
/// # Returns
/// * `Ok(Vec<SourceDocument>)` - one document per `result.contents` entry with `fields`
/// * `Err(MalformedJson)` - text is not JSON
/// * `Err(SchemaMismatch)` - JSON without `result.contents`, or mistyped fields
pub fn parse_payload(text: &str, filename: &str) -> Result<Vec<SourceDocument>> {
    let value: Value = serde_json::from_str(text).map_err(|source| PlaybillError::MalformedJson {
        file: filename.to_string(),
        source,
    })?;

    parse_value(value, filename)
}

/// Decode an already-parsed payload (used by the extraction client)
pub fn parse_value(value: Value, filename: &str) -> Result<Vec<SourceDocument>> {
    let mismatch = |reason: String| PlaybillError::SchemaMismatch {
        file: filename.to_string(),
        reason,
    };

    if !value.is_object() {
        return Err(mismatch("top-level value is not an object".to_string()));
    }

    let envelope: AnalyzeEnvelope =
        serde_json::from_value(value).map_err(|e| mismatch(e.to_string()))?;

    let contents = envelope
        .result
        .ok_or_else(|| mismatch("missing 'result'".to_string()))?
        .contents
        .ok_or_else(|| mismatch("missing 'result.contents'".to_string()))?;

    Ok(contents
        .into_iter()
        .filter_map(|item| item.fields)
        .map(|fields| fields.into_document(filename))
        .collect())
}

/// Read and decode a payload file; documents carry the file's base name
pub fn load_documents(path: &Path) -> Result<Vec<SourceDocument>> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.json")
        .to_string();

    let text = fs::read_to_string(path)?;
    parse_payload(&text, &filename)
}

// ============================================================================
// TESTS
// ============================================================================
