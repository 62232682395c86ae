//! Call-status fetch with local-first fallback

use crate::cloud::CloudClient;
use crate::isapi::LocalClient;
use crate::types::{ApiError, FetchResult};

/// Fetch the current call status for a device, preferring the local
/// device API over the cloud.
///
/// Every local failure is silent: transport errors, unusable responses
/// and missing endpoints all fall through to the cloud path. Cloud
/// failures surface as typed [`ApiError`]s.
pub async fn fetch_call_status(
    local: Option<&LocalClient>,
    cloud: &CloudClient,
    serial: &str,
) -> Result<FetchResult, ApiError> {
    if let Some(local) = local {
        match local.call_status().await {
            Ok(Some(result)) => return Ok(result),
            Ok(None) => {
                tracing::debug!("Local call status yielded no result, trying cloud");
            }
            Err(e) => {
                tracing::debug!("Local call status failed: {}, trying cloud", e);
            }
        }
    }

    cloud.call_status(serial).await
}
