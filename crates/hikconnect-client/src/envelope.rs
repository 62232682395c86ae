//! Cloud response envelope and call-status payload parsing
//!
//! Every cloud endpoint wraps its payload in the same envelope:
//!
//! ```text
//! {
//!   "meta": { "code": <int>, "message": <str> },
//!   "data": <JSON-encoded string | object>,
//!   "connectionInfos": { ... }   (pagelist only)
//! }
//! ```
//!
//! The `data` field arrives either as a JSON-encoded string or as an
//! embedded object, depending on endpoint and firmware.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{remap_caller_info, ApiError, CallStatus, CallerInfo, FetchResult};

/// Response envelope wrapping every cloud payload
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub meta: Meta,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, rename = "connectionInfos")]
    pub connection_infos: Option<Map<String, Value>>,
}

/// Envelope status block
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl Meta {
    /// Message text for error construction
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

impl Envelope {
    /// Decode the `data` field, unwrapping the string encoding when present
    pub fn decode_data(&self) -> Result<Value, ApiError> {
        match &self.data {
            Some(Value::String(s)) => serde_json::from_str(s)
                .map_err(|e| ApiError::Payload(format!("data is not valid JSON: {e}"))),
            Some(value) => Ok(value.clone()),
            None => Err(ApiError::Payload("no data in response".to_string())),
        }
    }
}

/// Parse a successful call-status envelope into a normalized result
pub fn parse_call_status(envelope: &Envelope) -> Result<FetchResult, ApiError> {
    let data = envelope.decode_data()?;

    let code = data.get("callStatus").and_then(Value::as_i64).unwrap_or(0);
    let status = CallStatus::from_code(code);
    if status == CallStatus::Unknown && code != 0 {
        tracing::warn!("Unknown call status code: {}", code);
    }

    let info = match data.get("callerInfo").and_then(Value::as_object) {
        Some(raw) => remap_caller_info(raw),
        None => CallerInfo::new(),
    };

    Ok(FetchResult { status, info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_embedded_object_data() {
        let env = envelope(json!({
            "meta": { "code": 200, "message": "OK" },
            "data": { "callStatus": 2, "callerInfo": { "buildingNo": 3 } },
        }));
        let result = parse_call_status(&env).unwrap();
        assert_eq!(result.status, CallStatus::Ringing);
        assert_eq!(result.info.get("building_number"), Some(&json!(3)));
    }

    #[test]
    fn test_parse_string_encoded_data() {
        let env = envelope(json!({
            "meta": { "code": 200 },
            "data": "{\"callStatus\": 3}",
        }));
        let result = parse_call_status(&env).unwrap();
        assert_eq!(result.status, CallStatus::CallInProgress);
        assert!(result.info.is_empty());
    }

    #[test]
    fn test_missing_data_is_payload_error() {
        let env = envelope(json!({ "meta": { "code": 200 } }));
        assert!(matches!(
            parse_call_status(&env),
            Err(ApiError::Payload(_))
        ));
    }

    #[test]
    fn test_garbled_string_data_is_payload_error() {
        let env = envelope(json!({
            "meta": { "code": 200 },
            "data": "not json at all",
        }));
        assert!(matches!(env.decode_data(), Err(ApiError::Payload(_))));
    }

    #[test]
    fn test_unmapped_status_code_is_unknown() {
        let env = envelope(json!({
            "meta": { "code": 200 },
            "data": { "callStatus": 17 },
        }));
        let result = parse_call_status(&env).unwrap();
        assert_eq!(result.status, CallStatus::Unknown);
    }

    #[test]
    fn test_meta_defaults() {
        let env = envelope(json!({ "meta": {} }));
        assert_eq!(env.meta.code, 0);
        assert_eq!(env.meta.message_text(), "unknown error");
    }
}
