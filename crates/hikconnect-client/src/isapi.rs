//! Local device API (ISAPI) client
//!
//! Talks HTTP directly to the indoor station on the local network,
//! bypassing the cloud entirely. Lower latency than the cloud path and
//! independent of remote service health.

use std::time::Duration;

use bytes::Bytes;
use diqwest::WithDigestAuth;
use reqwest::StatusCode;

use crate::types::{ApiError, CallStatus, FetchResult};

/// Call-status request timeout; kept short so a dead device falls
/// through to the cloud within the poll budget
pub const CALL_STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Snapshot request timeout
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default local API username
pub const DEFAULT_USERNAME: &str = "admin";

/// Client for the device's local HTTP API
#[derive(Debug, Clone)]
pub struct LocalClient {
    http: reqwest::Client,
    address: String,
    username: String,
    password: String,
}

impl LocalClient {
    /// Create a client for the device at `address` (IP or host)
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            address: address.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// GET with digest auth when a password is configured
    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, ApiError> {
        let req = self.http.get(url).timeout(timeout);
        if self.password.is_empty() {
            Ok(req.send().await?)
        } else {
            Ok(req
                .send_with_digest_auth(&self.username, &self.password)
                .await?)
        }
    }

    /// Query call status directly from the device.
    ///
    /// `Ok(None)` means "no result" (endpoint missing, non-200, or
    /// unrecognized content); the caller falls back to the cloud.
    pub async fn call_status(&self) -> Result<Option<FetchResult>, ApiError> {
        let url = format!("http://{}/ISAPI/VideoIntercom/callStatus", self.address);
        let response = self.get(&url, CALL_STATUS_TIMEOUT).await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                tracing::debug!("Local call status response: {}", body);
                Ok(interpret_call_status_body(&body))
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!("Local call status endpoint not found at {}", self.address);
                Ok(None)
            }
            status => {
                tracing::debug!("Local call status returned HTTP {}", status);
                Ok(None)
            }
        }
    }

    /// Fetch a still image from the door-station camera
    pub async fn snapshot(&self) -> Result<Bytes, ApiError> {
        let url = format!(
            "http://{}/ISAPI/Streaming/channels/101/picture",
            self.address
        );
        let response = self.get(&url, SNAPSHOT_TIMEOUT).await?;

        if response.status() != StatusCode::OK {
            return Err(ApiError::Api {
                code: i64::from(response.status().as_u16()),
                message: "snapshot request failed".to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Interpret a local call-status body.
///
/// Newer firmware answers JSON, either nested
/// (`{"CallStatus": {"status": ...}}`) or flat (`{"status": ...}`);
/// older firmware answers XML, matched by keyword. `None` means the body
/// carried nothing recognizable and the caller should try the cloud.
fn interpret_call_status_body(body: &str) -> Option<FetchResult> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let status_field = value
            .pointer("/CallStatus/status")
            .or_else(|| value.get("status"))
            .and_then(serde_json::Value::as_str);
        if let Some(keyword) = status_field {
            return Some(FetchResult::status_only(CallStatus::from_keyword(keyword)));
        }
    }

    let lower = body.to_ascii_lowercase();
    let status = if lower.contains("idle") {
        CallStatus::Idle
    } else if lower.contains("ringing") {
        CallStatus::Ringing
    } else if lower.contains("ongoing") || lower.contains("in progress") {
        CallStatus::CallInProgress
    } else {
        return None;
    };
    Some(FetchResult::status_only(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_json_status() {
        let result = interpret_call_status_body(r#"{"CallStatus":{"status":"Idle"}}"#).unwrap();
        assert_eq!(result.status, CallStatus::Idle);
        assert!(result.info.is_empty());
    }

    #[test]
    fn test_flat_json_status() {
        let result = interpret_call_status_body(r#"{"status":"RINGING"}"#).unwrap();
        assert_eq!(result.status, CallStatus::Ringing);
        assert!(result.info.is_empty());
    }

    #[test]
    fn test_json_with_unrecognized_keyword() {
        let result = interpret_call_status_body(r#"{"status":"onACall"}"#).unwrap();
        assert_eq!(result.status, CallStatus::Unknown);
    }

    #[test]
    fn test_xml_body_keyword_match() {
        let body = "<CallStatus><status>ringing</status></CallStatus>";
        let result = interpret_call_status_body(body).unwrap();
        assert_eq!(result.status, CallStatus::Ringing);
    }

    #[test]
    fn test_text_body_in_progress() {
        let result = interpret_call_status_body("call in progress").unwrap();
        assert_eq!(result.status, CallStatus::CallInProgress);
    }

    #[test]
    fn test_unrecognized_body_yields_no_result() {
        assert!(interpret_call_status_body("<html>login page</html>").is_none());
        assert!(interpret_call_status_body(r#"{"unrelated": true}"#).is_none());
    }
}
