// src/error.rs
//! Error types for the GPS track logger

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug, Error)]
pub enum GpsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Track log error: {0}")]
    Track(String),
    /// The background sampling task panicked or was cancelled.
    #[error("Sampling task error: {0}")]
    Task(String),
}

/// Failures raised while probing serial ports for a receiver
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A single port could not be opened. The scan moves on to the next one.
    #[error("Error accessing port {port}: {reason}")]
    PortUnavailable { port: String, reason: String },
    /// No port produced any of the target sentences.
    #[error("{0}")]
    NotFound(String),
    #[error("Failed to list serial ports: {0}")]
    Enumerate(String),
}
