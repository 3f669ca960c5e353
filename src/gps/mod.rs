// src/gps/mod.rs
//! GPS discovery and sentence parsing

pub mod data;
pub mod nmea;
pub mod scanner;

pub use data::{Coordinate, SentenceInventory};
pub use scanner::{discover, Port};
