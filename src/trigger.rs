//! Parsing of the payloads that start each stage
//!
//! The scrape stage is started by a push-delivered queue message whose
//! base64 `data` decodes to `{"url": "..."}`. The process stage is started by
//! a storage notification, which arrives either with `bucket` and `name`
//! fields or as an audit-log entry naming the object as
//! `.../buckets/{bucket}/objects/{name}`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::storage::ObjectRef;

/// Error type for malformed trigger payloads
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid Pub/Sub message format: missing 'message' key.")]
    MissingMessage,

    #[error("Invalid Pub/Sub message format: missing 'data' key in 'message'.")]
    MissingData,

    #[error("Error decoding Pub/Sub message data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Error decoding Pub/Sub message data: payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Error decoding Pub/Sub message data: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("URL not found in Pub/Sub message payload.")]
    MissingUrl,

    #[error("Storage event does not name an object: {0}")]
    MissingObject(String),
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: Option<PushMessage>,
}

#[derive(Debug, Deserialize)]
struct PushMessage {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlPayload {
    url: Option<String>,
}

/// Extract the target URL from a push envelope body
pub fn parse_push_envelope(body: &[u8]) -> Result<String, TriggerError> {
    // Bodies that are not a JSON object are treated as having no message
    let envelope: PushEnvelope =
        serde_json::from_slice(body).map_err(|_| TriggerError::MissingMessage)?;
    let message = envelope.message.ok_or(TriggerError::MissingMessage)?;
    let data = message.data.ok_or(TriggerError::MissingData)?;

    let decoded = STANDARD.decode(data.trim())?;
    let text = String::from_utf8(decoded).map_err(|_| TriggerError::InvalidUtf8)?;
    let payload: UrlPayload = serde_json::from_str(&text)?;

    payload
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(TriggerError::MissingUrl)
}

/// Target URL for a scrape request: the envelope's URL, or `default_url`
/// when the request has no body at all
pub fn scrape_target(body: &[u8], default_url: Option<&str>) -> Result<String, TriggerError> {
    let blank = body.iter().all(u8::is_ascii_whitespace);
    match (blank, default_url) {
        (true, Some(url)) => Ok(url.to_string()),
        _ => parse_push_envelope(body),
    }
}

/// Extract the object reference from a storage notification body
pub fn parse_storage_event(body: &[u8]) -> Result<ObjectRef, TriggerError> {
    let value: Value = serde_json::from_slice(body)?;
    object_from_value(&value)
}

fn object_from_value(value: &Value) -> Result<ObjectRef, TriggerError> {
    match value {
        Value::String(resource) => parse_resource_name(resource),
        Value::Object(map) => {
            if let (Some(Value::String(bucket)), Some(Value::String(name))) =
                (map.get("bucket"), map.get("name"))
            {
                if !bucket.is_empty() && !name.is_empty() {
                    return Ok(ObjectRef::new(bucket.as_str(), name.as_str()));
                }
            }

            if let Some(resource) = value
                .pointer("/protoPayload/resourceName")
                .or_else(|| map.get("resourceName"))
                .and_then(Value::as_str)
            {
                return parse_resource_name(resource);
            }

            // CloudEvents in structured mode wrap the notification in `data`
            match map.get("data") {
                Some(inner) => object_from_value(inner),
                None => Err(TriggerError::MissingObject(
                    "expected 'bucket' and 'name' or a resource name".to_string(),
                )),
            }
        }
        _ => Err(TriggerError::MissingObject("event is not an object".to_string())),
    }
}

/// Parse `.../buckets/{bucket}/objects/{name}`; the name may contain `/`
pub fn parse_resource_name(resource: &str) -> Result<ObjectRef, TriggerError> {
    let invalid = || TriggerError::MissingObject(format!("unrecognised resource name {:?}", resource));

    let rest = resource
        .strip_prefix("buckets/")
        .or_else(|| resource.split_once("/buckets/").map(|(_, rest)| rest))
        .ok_or_else(invalid)?;
    let (bucket, name) = rest.split_once("/objects/").ok_or_else(invalid)?;

    if bucket.is_empty() || bucket.contains('/') || name.is_empty() {
        return Err(invalid());
    }
    Ok(ObjectRef::new(bucket, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(payload: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "message": {"data": STANDARD.encode(payload), "messageId": "1"},
            "subscription": "projects/p/subscriptions/s"
        }))
        .unwrap()
    }

    #[test]
    fn test_push_envelope() {
        let body = envelope(r#"{"url": "http://example.com"}"#);
        assert_eq!(parse_push_envelope(&body).unwrap(), "http://example.com");
    }

    #[test]
    fn test_push_envelope_errors() {
        assert!(matches!(parse_push_envelope(b"not json"), Err(TriggerError::MissingMessage)));
        assert!(matches!(parse_push_envelope(b"{}"), Err(TriggerError::MissingMessage)));
        assert!(matches!(
            parse_push_envelope(br#"{"message": {}}"#),
            Err(TriggerError::MissingData)
        ));
        assert!(matches!(
            parse_push_envelope(br#"{"message": {"data": "***"}}"#),
            Err(TriggerError::InvalidBase64(_))
        ));

        let not_utf8 = serde_json::to_vec(&serde_json::json!({
            "message": {"data": STANDARD.encode([0xffu8, 0xfe])}
        }))
        .unwrap();
        assert!(matches!(parse_push_envelope(&not_utf8), Err(TriggerError::InvalidUtf8)));

        assert!(matches!(
            parse_push_envelope(&envelope("{broken")),
            Err(TriggerError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_push_envelope(&envelope(r#"{"link": "http://example.com"}"#)),
            Err(TriggerError::MissingUrl)
        ));
        assert!(matches!(
            parse_push_envelope(&envelope(r#"{"url": ""}"#)),
            Err(TriggerError::MissingUrl)
        ));
    }

    #[test]
    fn test_scrape_target_default() {
        assert_eq!(
            scrape_target(b"  \n", Some("https://example.com")).unwrap(),
            "https://example.com"
        );
        assert!(matches!(scrape_target(b"", None), Err(TriggerError::MissingMessage)));

        // An explicit envelope wins over the default
        let body = envelope(r#"{"url": "https://other.com"}"#);
        assert_eq!(
            scrape_target(&body, Some("https://example.com")).unwrap(),
            "https://other.com"
        );
    }

    #[test]
    fn test_direct_storage_event() {
        let object =
            parse_storage_event(br#"{"bucket": "raw", "name": "example.com/page.html"}"#).unwrap();
        assert_eq!(object, ObjectRef::new("raw", "example.com/page.html"));
    }

    #[test]
    fn test_cloud_event_wrapper() {
        let object = parse_storage_event(
            br#"{"specversion": "1.0", "type": "google.cloud.storage.object.v1.finalized",
                 "data": {"bucket": "raw", "name": "a/b.html"}}"#,
        )
        .unwrap();
        assert_eq!(object, ObjectRef::new("raw", "a/b.html"));
    }

    #[test]
    fn test_audit_log_event() {
        let object = parse_storage_event(
            br#"{"protoPayload": {"resourceName": "projects/_/buckets/raw-bucket/objects/www.example.com/catalogue/page-2.html"}}"#,
        )
        .unwrap();
        assert_eq!(
            object,
            ObjectRef::new("raw-bucket", "www.example.com/catalogue/page-2.html")
        );
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(
            parse_resource_name("buckets/raw/objects/x.html").unwrap(),
            ObjectRef::new("raw", "x.html")
        );
        assert!(parse_resource_name("projects/_/buckets/raw").is_err());
        assert!(parse_resource_name("projects/_/buckets//objects/x.html").is_err());
        assert!(parse_resource_name("projects/_/buckets/raw/objects/").is_err());
        assert!(parse_resource_name("mybuckets/raw/objects/x").is_err());
    }

    #[test]
    fn test_storage_event_errors() {
        assert!(matches!(parse_storage_event(b"{oops"), Err(TriggerError::InvalidJson(_))));
        assert!(matches!(
            parse_storage_event(br#"{"bucket": "raw"}"#),
            Err(TriggerError::MissingObject(_))
        ));
        assert!(matches!(parse_storage_event(b"[1, 2]"), Err(TriggerError::MissingObject(_))));
    }
}
