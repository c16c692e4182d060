//! JSON document import and export for event collections

mod converter;

pub use converter::{DocumentConverter, parse_timestamp};

use crate::core::{ArchiveError, EventRecord, Result};
use serde_json::Value as JsonValue;

/// Parse a JSON array of event documents.
///
/// The whole batch is rejected if any document is invalid; the error names
/// the index of the offending document.
pub fn parse_documents(input: &str) -> Result<Vec<EventRecord>> {
    let value: JsonValue = serde_json::from_str(input)?;
    let documents = value.as_array().ok_or_else(|| {
        ArchiveError::InvalidDocument("Expected JSON array of objects".to_string())
    })?;

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            DocumentConverter::to_record(doc).map_err(|e| {
                ArchiveError::InvalidDocument(format!("document {}: {}", i, e))
            })
        })
        .collect()
}

/// Render records as a pretty JSON array.
pub fn to_documents(records: &[EventRecord]) -> Result<String> {
    let docs: Vec<JsonValue> = records.iter().map(DocumentConverter::to_document).collect();
    Ok(serde_json::to_string_pretty(&docs)?)
}
