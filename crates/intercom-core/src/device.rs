//! Intercom device representation

use std::time::Instant;

use hikconnect_client::CallStatus;
use serde::Serialize;

/// A video-intercom device known to the account
#[derive(Debug, Clone, Serialize)]
pub struct IntercomDevice {
    /// Vendor device serial
    pub serial: String,
    /// User-assigned device name
    pub name: Option<String>,
    /// Vendor device type string
    pub device_type: Option<String>,
    /// Firmware version
    pub version: Option<String>,
    /// Address on the local network, when known
    pub local_ip: Option<String>,
    /// Public address reported by the cloud
    pub net_ip: Option<String>,
    /// Whether the most recent poll succeeded
    pub available: bool,
    /// Last observed call status
    pub last_status: Option<CallStatus>,
    /// Last successful poll
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl IntercomDevice {
    /// Create a device with just its serial
    #[must_use]
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            name: None,
            device_type: None,
            version: None,
            local_ip: None,
            net_ip: None,
            available: false,
            last_status: None,
            last_seen: None,
        }
    }

    /// Get a display name (friendly name or serial)
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.serial.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_serial() {
        let mut device = IntercomDevice::new("DS-123456");
        assert_eq!(device.display_name(), "DS-123456");

        device.name = Some("Front door".to_string());
        assert_eq!(device.display_name(), "Front door");
    }
}
