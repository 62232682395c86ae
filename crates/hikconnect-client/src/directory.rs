//! Device directory payload models for the pagelist endpoint

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::types::ApiError;

/// One device record from the account's device listing
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "deviceSerial")]
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "deviceType")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Connection metadata for a device (local and public addresses)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default, rename = "localIp")]
    pub local_ip: Option<String>,
    #[serde(default, rename = "netIp")]
    pub net_ip: Option<String>,
}

/// Parsed device directory: device records plus connection metadata
/// keyed by device serial
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    pub devices: Vec<DeviceRecord>,
    pub connections: HashMap<String, ConnectionInfo>,
}

impl DeviceDirectory {
    /// Parse a raw pagelist response body.
    ///
    /// `deviceInfos` and `connectionInfos` are both top-level siblings of
    /// `meta`; either may be absent on accounts without devices.
    pub fn parse(body: &Value) -> Result<Self, ApiError> {
        let code = body
            .pointer("/meta/code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if code != 200 {
            let message = body
                .pointer("/meta/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ApiError::Api { code, message });
        }

        let devices = match body.get("deviceInfos") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| ApiError::Payload(format!("bad deviceInfos: {e}")))?,
            None => Vec::new(),
        };

        let connections = match body.get("connectionInfos") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| ApiError::Payload(format!("bad connectionInfos: {e}")))?,
            None => HashMap::new(),
        };

        Ok(Self {
            devices,
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pagelist() {
        let body = json!({
            "meta": { "code": 200, "message": "OK" },
            "deviceInfos": [
                {
                    "deviceSerial": "DS-123456",
                    "name": "Front door",
                    "deviceType": "DS-KH6320",
                    "version": "V2.1.0"
                },
                { "deviceSerial": "DS-654321" }
            ],
            "connectionInfos": {
                "DS-123456": { "localIp": "192.168.1.50", "netIp": "203.0.113.9" }
            }
        });

        let directory = DeviceDirectory::parse(&body).unwrap();
        assert_eq!(directory.devices.len(), 2);
        assert_eq!(directory.devices[0].serial, "DS-123456");
        assert_eq!(directory.devices[0].name.as_deref(), Some("Front door"));
        assert_eq!(directory.devices[1].name, None);

        let conn = directory.connections.get("DS-123456").unwrap();
        assert_eq!(conn.local_ip.as_deref(), Some("192.168.1.50"));
        assert!(!directory.connections.contains_key("DS-654321"));
    }

    #[test]
    fn test_parse_error_meta() {
        let body = json!({ "meta": { "code": 1011, "message": "session expired" } });
        match DeviceDirectory::parse(&body) {
            Err(ApiError::Api { code, message }) => {
                assert_eq!(code, 1011);
                assert_eq!(message, "session expired");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_sections() {
        let body = json!({ "meta": { "code": 200 } });
        let directory = DeviceDirectory::parse(&body).unwrap();
        assert!(directory.devices.is_empty());
        assert!(directory.connections.is_empty());
    }
}
