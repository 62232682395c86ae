//! Hik-Connect video-intercom client
//!
//! This crate implements the vendor's cloud REST API and the device's
//! local HTTP API (ISAPI), and normalizes both into a small stable
//! call-status vocabulary.

pub mod cloud;
pub mod directory;
pub mod envelope;
pub mod fetch;
pub mod isapi;
pub mod types;

pub use cloud::{CloudClient, DEFAULT_BASE_URL};
pub use directory::{ConnectionInfo, DeviceDirectory, DeviceRecord};
pub use envelope::{Envelope, Meta};
pub use fetch::fetch_call_status;
pub use isapi::{LocalClient, DEFAULT_USERNAME};
pub use types::{ApiError, CallStatus, CallerInfo, FetchResult};
