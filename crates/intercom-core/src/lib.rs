//! Intercom abstraction layer
//!
//! This crate provides device modeling and call-status polling on top of
//! the low-level Hik-Connect client.

pub mod device;
pub mod watcher;

pub use device::IntercomDevice;
pub use watcher::{CallWatcher, WatcherError, WatcherEvent};
