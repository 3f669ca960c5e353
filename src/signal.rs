// src/signal.rs
//! Error signalling between the sampling loop and the surrounding application

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Events the sampling loop sends to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpsEvent {
    /// Query: is a read error currently shown?
    HasReadError,
    /// A whole read window passed without a valid fix
    ShowReadError,
    /// A fix arrived after a read error
    ClearErrors,
    /// Buffered samples could not be appended to the track file
    TrackWriteFailed { path: String, message: String },
}

/// Receiver for [`GpsEvent`]s.
///
/// The return value only matters for [`GpsEvent::HasReadError`]; notifications
/// may return anything.
pub trait SignalObserver: Send + Sync {
    fn signal(&self, event: GpsEvent) -> bool;
}

impl<F> SignalObserver for F
where
    F: Fn(GpsEvent) -> bool + Send + Sync,
{
    fn signal(&self, event: GpsEvent) -> bool {
        self(event)
    }
}

/// Level-triggered read error flag with counters, usable as an observer
#[derive(Debug, Default)]
pub struct ErrorFlag {
    raised: AtomicBool,
    raise_count: AtomicU64,
    clear_count: AtomicU64,
    write_failures: AtomicU64,
}

impl ErrorFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// How many times the error went from clear to shown
    pub fn raise_count(&self) -> u64 {
        self.raise_count.load(Ordering::Relaxed)
    }

    pub fn clear_count(&self) -> u64 {
        self.clear_count.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

impl SignalObserver for ErrorFlag {
    fn signal(&self, event: GpsEvent) -> bool {
        match event {
            GpsEvent::HasReadError => self.is_raised(),
            GpsEvent::ShowReadError => {
                if !self.raised.swap(true, Ordering::AcqRel) {
                    self.raise_count.fetch_add(1, Ordering::Relaxed);
                    log::warn!("No valid GPS fix received");
                }
                true
            }
            GpsEvent::ClearErrors => {
                if self.raised.swap(false, Ordering::AcqRel) {
                    self.clear_count.fetch_add(1, Ordering::Relaxed);
                    log::info!("GPS fix restored");
                }
                false
            }
            GpsEvent::TrackWriteFailed { path, message } => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                log::error!("Failed to write track file {}: {}", path, message);
                false
            }
        }
    }
}
