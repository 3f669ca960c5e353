// src/gps/data.rs
//! GPS data structures shared between the scanner, the sampler and the track log

use chrono::{Local, NaiveTime, Timelike};
use std::fmt;

/// Number of sentence types a receiver is probed for
pub const INVENTORY_SLOTS: usize = 3;

/// A position in signed decimal degrees, rounded to 6 places
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// One reading taken by the sampling loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: NaiveTime,
    /// `None` until the receiver has produced its first fix
    pub position: Option<Coordinate>,
}

impl Sample {
    pub fn new(time: NaiveTime, position: Option<Coordinate>) -> Self {
        Self { time, position }
    }

    /// Stamp a position with the current local time at second resolution
    pub fn now(position: Option<Coordinate>) -> Self {
        let now = Local::now().time();
        let time = now.with_nanosecond(0).unwrap_or(now);
        Self { time, position }
    }
}

/// Which sentence types a receiver has been seen emitting, in priority order.
///
/// Slot 0 is the primary type, slot 1 the secondary and slot 2 the tertiary.
/// A slot is bound at most once and a type never occupies two slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceInventory {
    slots: [Option<String>; INVENTORY_SLOTS],
}

impl SentenceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from explicit slot contents
    pub fn from_slots(slots: [Option<&str>; INVENTORY_SLOTS]) -> Self {
        let mut inventory = Self::new();
        for (index, slot) in slots.iter().enumerate() {
            if let Some(identifier) = slot {
                inventory.bind(index, identifier);
            }
        }
        inventory
    }

    /// Bind `identifier` to `slot`. Returns false if the slot is taken,
    /// out of range, or the type already sits in another slot.
    pub fn bind(&mut self, slot: usize, identifier: &str) -> bool {
        if slot >= INVENTORY_SLOTS || self.contains(identifier) {
            return false;
        }
        match self.slots[slot] {
            Some(_) => false,
            None => {
                self.slots[slot] = Some(identifier.to_string());
                true
            }
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.slots.iter().flatten().any(|bound| bound == identifier)
    }

    pub fn slot(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|slot| slot.as_deref())
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.bound_count() == INVENTORY_SLOTS
    }

    pub fn is_empty(&self) -> bool {
        self.bound_count() == 0
    }
}

impl fmt::Display for SentenceInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .slots
            .iter()
            .map(|slot| slot.as_deref().unwrap_or("-"))
            .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Snapshot of what the sampling loop has observed so far
#[derive(Debug, Clone, Default)]
pub struct GpsState {
    pub coordinate: Option<Coordinate>,
    pub time: Option<NaiveTime>,
    pub cycles: u64,
    pub fixes: u64,
    pub skipped_sentences: u64,
    pub dropped_samples: u64,
    pub flush_failures: u64,
}

impl GpsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fix(&self) -> bool {
        self.coordinate.is_some()
    }

    /// Format the current position for display
    pub fn format_coordinate(&self) -> String {
        match self.coordinate {
            Some(coordinate) => coordinate.to_string(),
            None => "No fix".to_string(),
        }
    }
}
