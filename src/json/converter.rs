//! JSON document <-> EventRecord conversion
//!
//! Documents look like the ones an event collection usually holds:
//!
//! ```json
//! {
//!     "_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
//!     "user_id": "u1",
//!     "event_time": "2024-05-01T10:00:00Z",
//!     "user_info": { "registration_date": { "$date": "2024-03-01T00:00:00Z" } },
//!     "event_type": "login"
//! }
//! ```
//!
//! `_id` is optional. Timestamps may be RFC 3339 strings, extended-JSON
//! `{"$date": ...}` wrappers, or epoch milliseconds. All other fields are
//! preserved as attributes.

use crate::core::{ArchiveError, EventRecord, RecordId, Result, UserId, UserInfo};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

const ID_FIELD: &str = "_id";
const USER_ID_FIELD: &str = "user_id";
const EVENT_TIME_FIELD: &str = "event_time";
const USER_INFO_FIELD: &str = "user_info";
const REGISTRATION_FIELD: &str = "registration_date";

pub struct DocumentConverter;

impl DocumentConverter {
    pub fn to_record(document: &JsonValue) -> Result<EventRecord> {
        let mut fields = document
            .as_object()
            .cloned()
            .ok_or_else(|| invalid("expected a JSON object".to_string()))?;

        let id = match fields.remove(ID_FIELD) {
            None | Some(JsonValue::Null) => RecordId::new(),
            Some(JsonValue::String(s)) => uuid::Uuid::parse_str(&s)
                .map(RecordId::from_uuid)
                .map_err(|e| invalid(format!("invalid {}: {}", ID_FIELD, e)))?,
            Some(other) => return Err(invalid(format!("invalid {}: {}", ID_FIELD, other))),
        };

        let user_id = match fields.remove(USER_ID_FIELD) {
            Some(JsonValue::String(s)) if !s.is_empty() => UserId::new(s),
            Some(JsonValue::Number(n)) => UserId::new(n.to_string()),
            Some(other) => return Err(invalid(format!("invalid {}: {}", USER_ID_FIELD, other))),
            None => return Err(invalid(format!("missing field '{}'", USER_ID_FIELD))),
        };

        let event_time = fields
            .remove(EVENT_TIME_FIELD)
            .ok_or_else(|| invalid(format!("missing field '{}'", EVENT_TIME_FIELD)))
            .and_then(|v| parse_timestamp(&v, EVENT_TIME_FIELD))?;

        let mut info_fields = match fields.remove(USER_INFO_FIELD) {
            Some(JsonValue::Object(map)) => map,
            Some(other) => return Err(invalid(format!("invalid {}: {}", USER_INFO_FIELD, other))),
            None => return Err(invalid(format!("missing field '{}'", USER_INFO_FIELD))),
        };
        let registration_date = info_fields
            .remove(REGISTRATION_FIELD)
            .ok_or_else(|| {
                invalid(format!(
                    "missing field '{}.{}'",
                    USER_INFO_FIELD, REGISTRATION_FIELD
                ))
            })
            .and_then(|v| parse_timestamp(&v, REGISTRATION_FIELD))?;

        Ok(EventRecord {
            id,
            user_id,
            event_time,
            user_info: UserInfo {
                registration_date,
                extra: info_fields.into_iter().collect(),
            },
            attributes: fields.into_iter().collect(),
        })
    }

    pub fn to_document(record: &EventRecord) -> JsonValue {
        let mut info = Map::new();
        info.insert(
            REGISTRATION_FIELD.to_string(),
            JsonValue::String(record.user_info.registration_date.to_rfc3339()),
        );
        for (k, v) in &record.user_info.extra {
            info.insert(k.clone(), v.clone());
        }

        let mut doc = Map::new();
        doc.insert(ID_FIELD.to_string(), JsonValue::String(record.id.to_string()));
        doc.insert(
            USER_ID_FIELD.to_string(),
            JsonValue::String(record.user_id.to_string()),
        );
        doc.insert(
            EVENT_TIME_FIELD.to_string(),
            JsonValue::String(record.event_time.to_rfc3339()),
        );
        doc.insert(USER_INFO_FIELD.to_string(), JsonValue::Object(info));
        for (k, v) in &record.attributes {
            doc.entry(k.clone()).or_insert_with(|| v.clone());
        }
        JsonValue::Object(doc)
    }
}

/// Parse an RFC 3339 string, `{"$date": ...}` or epoch milliseconds.
pub fn parse_timestamp(value: &JsonValue, field: &str) -> Result<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| invalid(format!("invalid timestamp in '{}': {}", field, e))),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| invalid(format!("timestamp out of range in '{}': {}", field, n))),
        JsonValue::Object(map) => match map.get("$date") {
            Some(JsonValue::Object(inner)) => match inner.get("$numberLong") {
                Some(JsonValue::String(ms)) => ms
                    .parse::<i64>()
                    .ok()
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .ok_or_else(|| invalid(format!("invalid $numberLong in '{}': {}", field, ms))),
                _ => Err(invalid(format!("unsupported $date form in '{}'", field))),
            },
            Some(inner) => parse_timestamp(inner, field),
            None => Err(invalid(format!("expected a timestamp in '{}'", field))),
        },
        other => Err(invalid(format!("expected a timestamp in '{}', got {}", field, other))),
    }
}

fn invalid(msg: String) -> ArchiveError {
    ArchiveError::InvalidDocument(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!("2024-05-01T10:00:00Z"), "t").unwrap(), expected);
        assert_eq!(parse_timestamp(&json!("2024-05-01T12:00:00+02:00"), "t").unwrap(), expected);
        assert_eq!(
            parse_timestamp(&json!({"$date": "2024-05-01T10:00:00Z"}), "t").unwrap(),
            expected
        );
        let millis = expected.timestamp_millis();
        assert_eq!(parse_timestamp(&json!(millis), "t").unwrap(), expected);
        assert_eq!(
            parse_timestamp(&json!({"$date": {"$numberLong": millis.to_string()}}), "t").unwrap(),
            expected
        );
        assert!(parse_timestamp(&json!("yesterday"), "t").is_err());
        assert!(parse_timestamp(&json!(true), "t").is_err());
    }

    #[test]
    fn test_document_to_record_keeps_extra_fields() {
        let doc = json!({
            "user_id": 42,
            "event_time": "2024-05-01T10:00:00Z",
            "user_info": {"registration_date": "2024-03-01T00:00:00Z", "name": "Ann"},
            "event_type": "login"
        });
        let record = DocumentConverter::to_record(&doc).unwrap();

        assert_eq!(record.user_id, UserId::from("42"));
        assert_eq!(record.user_info.extra["name"], json!("Ann"));
        assert_eq!(record.attributes["event_type"], json!("login"));

        let back = DocumentConverter::to_document(&record);
        assert_eq!(back["event_type"], json!("login"));
        assert_eq!(back["user_info"]["name"], json!("Ann"));
        assert_eq!(back["_id"], json!(record.id.to_string()));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let no_user = json!({"event_time": "2024-05-01T10:00:00Z", "user_info": {"registration_date": "2024-03-01T00:00:00Z"}});
        let no_reg = json!({"user_id": "u1", "event_time": "2024-05-01T10:00:00Z", "user_info": {}});
        let no_info = json!({"user_id": "u1", "event_time": "2024-05-01T10:00:00Z"});

        for doc in [no_user, no_reg, no_info, json!([1, 2])] {
            assert!(matches!(
                DocumentConverter::to_record(&doc),
                Err(ArchiveError::InvalidDocument(_))
            ));
        }
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let doc = json!({
            "_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "user_id": "u1",
            "event_time": "2024-05-01T10:00:00Z",
            "user_info": {"registration_date": "2024-03-01T00:00:00Z"}
        });
        let record = DocumentConverter::to_record(&doc).unwrap();
        assert_eq!(record.id.to_string(), "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
    }
}
