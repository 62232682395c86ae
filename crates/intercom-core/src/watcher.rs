//! Call-status polling and device registry

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use hikconnect_client::{
    fetch_call_status, ApiError, CallStatus, CloudClient, FetchResult, LocalClient,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::device::IntercomDevice;

/// Default polling interval; generous enough for a local attempt plus
/// the cloud fallback
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Margin subtracted from the interval to bound each poll, so a stalled
/// request cannot overlap the next cycle
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_millis(500);

/// Watcher errors
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("device not found: {0}")]
    DeviceNotFound(String),
}

/// Watcher events
#[derive(Debug, Clone)]
pub enum WatcherEvent {
    /// Call status changed since the previous poll
    CallStatusChanged {
        serial: String,
        status: CallStatus,
        previous: Option<CallStatus>,
    },
    /// Status transitioned into ringing
    DoorbellRinging { serial: String },
    /// Device became available or unavailable
    AvailabilityChanged { serial: String, available: bool },
    /// Registry entry was updated from the cloud directory
    DeviceUpdated { serial: String },
}

/// Suppresses repeated identical error logs for one device.
///
/// The first occurrence of an error is logged; repeats are not, until a
/// different error or a successful poll re-arms the latch.
#[derive(Debug, Default)]
struct ErrorLatch {
    last: Option<String>,
}

impl ErrorLatch {
    /// Returns true when this error should be logged
    fn should_log(&mut self, error: &str) -> bool {
        if self.last.as_deref() == Some(error) {
            false
        } else {
            self.last = Some(error.to_string());
            true
        }
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Watches the account's intercom devices, polling each on a fixed
/// interval and broadcasting status transitions
pub struct CallWatcher {
    cloud: Arc<CloudClient>,
    local: Option<Arc<LocalClient>>,
    /// Known devices (keyed by serial)
    devices: Arc<DashMap<String, IntercomDevice>>,
    /// Serials with a running poll task
    polling: DashSet<String>,
    /// Event broadcaster
    event_tx: broadcast::Sender<WatcherEvent>,
    poll_interval: Duration,
}

impl CallWatcher {
    /// Create a watcher; call [`CallWatcher::refresh`] to populate the
    /// registry and start polling
    #[must_use]
    pub fn new(cloud: CloudClient, local: Option<LocalClient>, poll_interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            cloud: Arc::new(cloud),
            local: local.map(Arc::new),
            devices: Arc::new(DashMap::new()),
            polling: DashSet::new(),
            event_tx,
            poll_interval,
        }
    }

    /// Subscribe to watcher events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.event_tx.subscribe()
    }

    /// The configured local device client, if any
    #[must_use]
    pub fn local(&self) -> Option<&LocalClient> {
        self.local.as_deref()
    }

    /// Fetch the cloud device directory, upsert registry entries and
    /// start polling any device not yet watched. Returns the number of
    /// devices known after the refresh.
    pub async fn refresh(&self) -> Result<usize, WatcherError> {
        let directory = self.cloud.device_directory().await?;

        for record in &directory.devices {
            let connection = directory.connections.get(&record.serial);

            let mut entry = self
                .devices
                .entry(record.serial.clone())
                .or_insert_with(|| IntercomDevice::new(record.serial.clone()));
            entry.name = record.name.clone();
            entry.device_type = record.device_type.clone();
            entry.version = record.version.clone();
            // a configured local address wins over the directory's
            entry.local_ip = match &self.local {
                Some(local) => Some(local.address().to_string()),
                None => connection.and_then(|c| c.local_ip.clone()),
            };
            entry.net_ip = connection.and_then(|c| c.net_ip.clone());
            drop(entry);

            tracing::info!("Watching device {}", record.serial);
            let _ = self.event_tx.send(WatcherEvent::DeviceUpdated {
                serial: record.serial.clone(),
            });
        }

        for entry in self.devices.iter() {
            if self.polling.insert(entry.key().clone()) {
                self.spawn_poller(entry.key().clone());
            }
        }

        Ok(self.devices.len())
    }

    /// Fetch call status for one device right now, outside the poll
    /// cycle, through the full local-first fallback
    pub async fn fetch_now(&self, serial: &str) -> Result<FetchResult, WatcherError> {
        if !self.devices.contains_key(serial) {
            return Err(WatcherError::DeviceNotFound(serial.to_string()));
        }
        Ok(fetch_call_status(self.local.as_deref(), &self.cloud, serial).await?)
    }

    /// Get all known devices
    #[must_use]
    pub fn get_devices(&self) -> Vec<IntercomDevice> {
        self.devices.iter().map(|r| r.value().clone()).collect()
    }

    /// Get a specific device by serial
    #[must_use]
    pub fn get_device(&self, serial: &str) -> Option<IntercomDevice> {
        self.devices.get(serial).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Per-poll budget: slightly shorter than the interval so a stalled
    /// attempt cannot overlap the next cycle
    fn poll_timeout(&self) -> Duration {
        self.poll_interval
            .checked_sub(POLL_TIMEOUT_MARGIN)
            .unwrap_or(self.poll_interval / 2)
    }

    /// Spawn the polling task for one device. One logical request in
    /// flight per device per cycle; no shared mutable state across
    /// device tasks beyond the registry map.
    fn spawn_poller(&self, serial: String) {
        let cloud = Arc::clone(&self.cloud);
        let local = self.local.clone();
        let devices = Arc::clone(&self.devices);
        let event_tx = self.event_tx.clone();
        let poll_timeout = self.poll_timeout();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut latch = ErrorLatch::default();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let attempt = fetch_call_status(local.as_deref(), &cloud, &serial);
                match tokio::time::timeout(poll_timeout, attempt).await {
                    Ok(Ok(result)) => {
                        latch.clear();
                        record_success(&devices, &event_tx, &serial, &result);
                    }
                    Ok(Err(e)) => {
                        record_failure(&devices, &event_tx, &serial, &e, &mut latch);
                    }
                    Err(_) => {
                        // abandon the in-flight attempt for this cycle
                        tracing::debug!("Call status poll for {} timed out", serial);
                        mark_unavailable(&devices, &event_tx, &serial);
                    }
                }
            }
        });
    }
}

/// Record a successful poll and emit transition events
fn record_success(
    devices: &DashMap<String, IntercomDevice>,
    event_tx: &broadcast::Sender<WatcherEvent>,
    serial: &str,
    result: &FetchResult,
) {
    let mut previous = None;
    let mut became_available = false;

    if let Some(mut device) = devices.get_mut(serial) {
        previous = device.last_status;
        became_available = !device.available;
        device.available = true;
        device.last_status = Some(result.status);
        device.last_seen = Some(Instant::now());
    }

    if became_available {
        let _ = event_tx.send(WatcherEvent::AvailabilityChanged {
            serial: serial.to_string(),
            available: true,
        });
    }

    if previous != Some(result.status) {
        let _ = event_tx.send(WatcherEvent::CallStatusChanged {
            serial: serial.to_string(),
            status: result.status,
            previous,
        });
        if result.status == CallStatus::Ringing {
            let _ = event_tx.send(WatcherEvent::DoorbellRinging {
                serial: serial.to_string(),
            });
        }
    }
}

/// Record a failed poll, logging once per distinct error
fn record_failure(
    devices: &DashMap<String, IntercomDevice>,
    event_tx: &broadcast::Sender<WatcherEvent>,
    serial: &str,
    error: &ApiError,
    latch: &mut ErrorLatch,
) {
    let text = error.to_string();
    if latch.should_log(&text) {
        match error {
            ApiError::DeviceNetwork { .. } => {
                tracing::warn!(
                    "Call status unavailable for {}: {} (known cloud-side condition)",
                    serial,
                    text
                );
            }
            ApiError::DeviceOffline { .. } => {
                tracing::debug!("Device {} is offline", serial);
            }
            ApiError::Transport(_) | ApiError::Digest(_) => {
                tracing::debug!("Network error for {}: {}", serial, text);
            }
            _ => {
                tracing::warn!("API error for {}: {}", serial, text);
            }
        }
    }
    mark_unavailable(devices, event_tx, serial);
}

/// Mark a device unavailable for this cycle
fn mark_unavailable(
    devices: &DashMap<String, IntercomDevice>,
    event_tx: &broadcast::Sender<WatcherEvent>,
    serial: &str,
) {
    let mut changed = false;
    if let Some(mut device) = devices.get_mut(serial) {
        changed = device.available;
        device.available = false;
    }
    if changed {
        let _ = event_tx.send(WatcherEvent::AvailabilityChanged {
            serial: serial.to_string(),
            available: false,
        });
    }
}
