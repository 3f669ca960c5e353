// src/lib.rs
//! GPS Track Logger Library
//!
//! Finds the serial port a GPS receiver is attached to, samples its position
//! in the background and appends a time-stamped track to a daily CSV file.

pub mod config;
pub mod error;
pub mod gps;
pub mod monitor;
pub mod sampler;
pub mod signal;
pub mod track;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{DiscoveryError, GpsError, Result};
pub use gps::data::{Coordinate, GpsState, Sample, SentenceInventory};
pub use gps::scanner::{Port, SerialOpener, SystemSerial};
pub use monitor::GpsMonitor;
pub use signal::{ErrorFlag, GpsEvent, SignalObserver};
pub use track::{SessionDescriptor, TrackLog};
