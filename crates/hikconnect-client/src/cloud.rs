//! Hik-Connect cloud REST API client

use std::time::Duration;

use reqwest::{header, RequestBuilder};

use crate::directory::DeviceDirectory;
use crate::envelope::{parse_call_status, Envelope};
use crate::types::{ApiError, FetchResult};

/// Default cloud API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.hik-connect.com";

/// Per-request timeout for cloud calls
pub const CLOUD_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_TYPE: &str = "55";
const LANG: &str = "en-US";
const FEATURE_CODE: &str = "deadbeef";
/// User agent sent only on the extended-header retry
const RETRY_USER_AGENT: &str = "Hik-Connect/5.0.0 (Android)";

/// What to do after inspecting a call-status response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Success, parse the payload
    Parse,
    /// Vendor code 2003, terminal
    Offline,
    /// Vendor code 2009 on the first attempt, retry with extended headers
    RetryExtended,
    /// Vendor code 2009 again on the retry, terminal
    NetworkAbnormal,
    /// Any other non-200 code
    Fail,
}

/// Envelope dispatch for the call-status endpoint.
///
/// Code 2009 is retried exactly once; on the retry, every non-200 code
/// other than 2009 (2003 included) maps to the generic error.
fn next_step(code: i64, retried: bool) -> Step {
    match (code, retried) {
        (200, _) => Step::Parse,
        (2003, false) => Step::Offline,
        (2009, false) => Step::RetryExtended,
        (2009, true) => Step::NetworkAbnormal,
        _ => Step::Fail,
    }
}

/// Client for the vendor cloud REST API.
///
/// Holds the base URL and the opaque session identifier obtained at
/// login; all protocol state is per-request.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl CloudClient {
    /// Create a client for the given base URL.
    ///
    /// `session_id` is the opaque token required by every cloud call;
    /// without one, calls fail with [`ApiError::NotLoggedIn`] before any
    /// network I/O.
    pub fn new(
        base_url: impl Into<String>,
        session_id: Option<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(CLOUD_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            session_id,
        })
    }

    /// Whether a session identifier is configured
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a GET request carrying the vendor header set.
    ///
    /// The extended profile adds the user-agent and timestamp headers the
    /// mobile client sends, used on the one bounded retry.
    fn get(&self, url: &str, extended: bool) -> Result<RequestBuilder, ApiError> {
        let session_id = self.session_id.as_deref().ok_or(ApiError::NotLoggedIn)?;

        let mut req = self
            .http
            .get(url)
            .header("clientType", CLIENT_TYPE)
            .header("lang", LANG)
            .header("featureCode", FEATURE_CODE)
            .header("sessionId", session_id)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");

        if extended {
            req = req.header(header::USER_AGENT, RETRY_USER_AGENT).header(
                "X-Timestamp",
                chrono::Utc::now().timestamp_millis().to_string(),
            );
        }

        Ok(req)
    }

    /// Fetch the current call status for a device serial.
    ///
    /// Dispatches on the envelope code: 200 parses, 2003 is terminal
    /// (device offline), 2009 is retried once with extended headers and
    /// then terminal (device network abnormal), anything else is a
    /// generic API error.
    pub async fn call_status(&self, serial: &str) -> Result<FetchResult, ApiError> {
        let url = format!("{}/v3/devconfig/v1/call/{}/status", self.base_url, serial);

        let mut retried = false;
        loop {
            let envelope: Envelope = self.get(&url, retried)?.send().await?.json().await?;
            let code = envelope.meta.code;
            tracing::debug!("Call status for {} returned code {}", serial, code);

            match next_step(code, retried) {
                Step::Parse => return parse_call_status(&envelope),
                Step::Offline => {
                    return Err(ApiError::DeviceOffline {
                        code,
                        message: envelope.meta.message_text(),
                    })
                }
                Step::RetryExtended => {
                    tracing::debug!("Got code 2009, retrying with additional headers");
                    retried = true;
                }
                Step::NetworkAbnormal => {
                    return Err(ApiError::DeviceNetwork {
                        code,
                        message: envelope.meta.message_text(),
                    })
                }
                Step::Fail => {
                    return Err(ApiError::Api {
                        code,
                        message: envelope.meta.message_text(),
                    })
                }
            }
        }
    }

    /// Fetch the account's device directory, including per-device
    /// connection metadata (local addresses)
    pub async fn device_directory(&self) -> Result<DeviceDirectory, ApiError> {
        let url = format!("{}/v3/userdevices/v1/resources/pagelist", self.base_url);
        let body: serde_json::Value = self.get(&url, false)?.send().await?.json().await?;
        DeviceDirectory::parse(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_always_parses() {
        assert_eq!(next_step(200, false), Step::Parse);
        assert_eq!(next_step(200, true), Step::Parse);
    }

    #[test]
    fn test_offline_is_terminal_without_retry() {
        assert_eq!(next_step(2003, false), Step::Offline);
    }

    #[test]
    fn test_network_abnormal_retried_exactly_once() {
        assert_eq!(next_step(2009, false), Step::RetryExtended);
        assert_eq!(next_step(2009, true), Step::NetworkAbnormal);
    }

    #[test]
    fn test_other_codes_fail_generically() {
        assert_eq!(next_step(500, false), Step::Fail);
        assert_eq!(next_step(1001, true), Step::Fail);
        // offline on the retry maps to the generic error
        assert_eq!(next_step(2003, true), Step::Fail);
    }

    #[test]
    fn test_missing_session_fails_before_any_request() {
        let client = CloudClient::new(DEFAULT_BASE_URL, None).unwrap();
        assert!(!client.has_session());
        let err = client
            .get("https://api.hik-connect.com/x", false)
            .unwrap_err();
        assert!(matches!(err, ApiError::NotLoggedIn));
    }

    #[test]
    fn test_session_present_builds_request() {
        let client = CloudClient::new(DEFAULT_BASE_URL, Some("abc123".to_string())).unwrap();
        assert!(client.has_session());
        assert!(client.get("https://api.hik-connect.com/x", true).is_ok());
    }
}
