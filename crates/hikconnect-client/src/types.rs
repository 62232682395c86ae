//! Common types used throughout the client

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Generic cloud API error carrying the envelope code
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Device is offline (vendor code 2003, terminal)
    #[error("device offline ({code}): {message}")]
    DeviceOffline { code: i64, message: String },

    /// Device network abnormal (vendor code 2009, after one retry)
    #[error("device network abnormal ({code}): {message}")]
    DeviceNetwork { code: i64, message: String },

    /// No session identifier available for cloud calls
    #[error("not logged in: no session identifier")]
    NotLoggedIn,

    /// Malformed response payload
    #[error("malformed payload: {0}")]
    Payload(String),

    /// HTTP transport failure, timeouts included
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Digest authentication failure against the local device API
    #[error("digest auth error: {0}")]
    Digest(#[from] diqwest::error::Error),
}

/// Normalized intercom call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Idle,
    Ringing,
    CallInProgress,
    Unknown,
}

impl CallStatus {
    /// Map a vendor call-status code to a normalized state.
    /// Callers log nonzero unmapped codes as anomalous.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Idle,
            2 => Self::Ringing,
            3 => Self::CallInProgress,
            _ => Self::Unknown,
        }
    }

    /// Map a status keyword from the local device API (case-insensitive)
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_lowercase().as_str() {
            "idle" => Self::Idle,
            "ringing" => Self::Ringing,
            "ongoing" | "in progress" | "call in progress" => Self::CallInProgress,
            _ => Self::Unknown,
        }
    }
}

/// Caller metadata remapped from the vendor payload.
///
/// Only keys present in the payload appear; nothing is defaulted.
pub type CallerInfo = Map<String, Value>;

/// Vendor field -> output field rename table for caller info
const CALLER_INFO_FIELDS: &[(&str, &str)] = &[
    ("buildingNo", "building_number"),
    ("floorNo", "floor_number"),
    ("zoneNo", "zone_number"),
    ("unitNo", "unit_number"),
    ("devNo", "device_number"),
    ("devType", "device_type"),
    ("lockNum", "lock_number"),
];

/// Remap vendor caller-info fields to their stable output names
#[must_use]
pub fn remap_caller_info(raw: &Map<String, Value>) -> CallerInfo {
    let mut info = CallerInfo::new();
    for (vendor_key, out_key) in CALLER_INFO_FIELDS {
        if let Some(value) = raw.get(*vendor_key) {
            info.insert((*out_key).to_string(), value.clone());
        }
    }
    info
}

/// One normalized call-status observation
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub status: CallStatus,
    pub info: CallerInfo,
}

impl FetchResult {
    /// A result with no caller metadata, as produced by the local path
    #[must_use]
    pub fn status_only(status: CallStatus) -> Self {
        Self {
            status,
            info: CallerInfo::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_code_table() {
        assert_eq!(CallStatus::from_code(1), CallStatus::Idle);
        assert_eq!(CallStatus::from_code(2), CallStatus::Ringing);
        assert_eq!(CallStatus::from_code(3), CallStatus::CallInProgress);
        assert_eq!(CallStatus::from_code(0), CallStatus::Unknown);
        assert_eq!(CallStatus::from_code(42), CallStatus::Unknown);
        assert_eq!(CallStatus::from_code(-1), CallStatus::Unknown);
    }

    #[test]
    fn test_status_keywords_case_insensitive() {
        assert_eq!(CallStatus::from_keyword("Idle"), CallStatus::Idle);
        assert_eq!(CallStatus::from_keyword("RINGING"), CallStatus::Ringing);
        assert_eq!(CallStatus::from_keyword("onGoing"), CallStatus::CallInProgress);
        assert_eq!(CallStatus::from_keyword("busy"), CallStatus::Unknown);
    }

    #[test]
    fn test_caller_info_remaps_only_present_keys() {
        let raw = json!({
            "buildingNo": 1,
            "unitNo": 12,
            "devType": "indoor_station",
            "somethingElse": true,
        });
        let info = remap_caller_info(raw.as_object().unwrap());

        assert_eq!(info.get("building_number"), Some(&json!(1)));
        assert_eq!(info.get("unit_number"), Some(&json!(12)));
        assert_eq!(info.get("device_type"), Some(&json!("indoor_station")));
        // absent vendor keys never appear, unknown keys are dropped
        assert!(!info.contains_key("floor_number"));
        assert!(!info.contains_key("somethingElse"));
        assert_eq!(info.len(), 3);
    }

    #[test]
    fn test_caller_info_empty_payload() {
        let info = remap_caller_info(&Map::new());
        assert!(info.is_empty());
    }
}
