//! Record shapes exchanged with the realtime database.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Section, SectionId, UserId};

/// Partial update that only touches the elapsed counter of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedTimePatch {
    #[serde(rename = "ElapsedTime")]
    pub elapsed_seconds: u64,
}

/// Path segments of a user's `sections` document, unencoded.
pub fn sections_path(user_id: &UserId) -> Vec<String> {
    vec![
        "users".to_string(),
        user_id.as_str().to_string(),
        "sections.json".to_string(),
    ]
}

pub fn section_path(user_id: &UserId, section_id: &SectionId) -> Vec<String> {
    vec![
        "users".to_string(),
        user_id.as_str().to_string(),
        "sections".to_string(),
        format!("{}.json", section_id.as_str()),
    ]
}

/// A record under `sections` that could not be read as a section, such as
/// the remnant a late elapsed-time patch leaves behind after a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionsDocument {
    pub sections: Vec<Section>,
    pub rejected: Vec<RejectedRecord>,
}

/// Decodes a `sections` document: `null`, an object keyed by section id, or
/// an array (possibly sparse). Sections keep the order the document lists
/// them in; unreadable records are set aside instead of failing the load.
pub fn decode_sections_document(document: Value) -> Result<SectionsDocument, serde_json::Error> {
    let records: Vec<(String, Value)> = match document {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected an object of sections, found {other}"
            )))
        }
    };

    let mut decoded = SectionsDocument::default();
    for (key, record) in records {
        match serde_json::from_value::<Section>(record) {
            Ok(section) => decoded.sections.push(section),
            Err(err) => decoded.rejected.push(RejectedRecord {
                key,
                reason: err.to_string(),
            }),
        }
    }
    Ok(decoded)
}
