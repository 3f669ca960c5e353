// src/config.rs
//! Configuration management with platform-specific storage

use crate::{
    error::{GpsError, Result},
    gps::{data::INVENTORY_SLOTS, nmea::SentenceKind},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub baud_rate: u32,
    pub output_dir: PathBuf,
    /// How long each port is listened to during discovery
    pub probe_window_secs: u64,
    /// How long one sampling cycle waits for a valid sentence
    pub read_window_secs: u64,
    pub sample_interval_secs: u64,
    pub warmup_secs: u64,
    /// Sentence identifiers in priority order: primary, secondary, tertiary
    pub sentence_types: [String; INVENTORY_SLOTS],
    pub max_buffered_samples: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            output_dir: PathBuf::from("."),
            probe_window_secs: 5,
            read_window_secs: 5,
            sample_interval_secs: 2,
            warmup_secs: 1,
            sentence_types: [
                "$GPGGA".to_string(),
                "$GPRMC".to_string(),
                "$GPGLL".to_string(),
            ],
            max_buffered_samples: 10_000,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings the scanner and sampler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(GpsError::Config("baud_rate must be positive".to_string()));
        }
        if self.probe_window_secs == 0 || self.read_window_secs == 0 {
            return Err(GpsError::Config("read windows must be at least one second".to_string()));
        }
        if self.max_buffered_samples == 0 {
            return Err(GpsError::Config("max_buffered_samples must be positive".to_string()));
        }
        for identifier in &self.sentence_types {
            if SentenceKind::from_identifier(identifier).is_none() {
                return Err(GpsError::Config(format!(
                    "Unsupported sentence type '{}', expected a GGA, RMC or GLL identifier",
                    identifier
                )));
            }
        }
        for (index, identifier) in self.sentence_types.iter().enumerate() {
            if self.sentence_types[..index].contains(identifier) {
                return Err(GpsError::Config(format!("Sentence type '{}' listed twice", identifier)));
            }
        }
        Ok(())
    }

    pub fn probe_window(&self) -> Duration {
        Duration::from_secs(self.probe_window_secs)
    }

    pub fn read_window(&self) -> Duration {
        Duration::from_secs(self.read_window_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    /// Get config file path
    #[cfg(not(windows))]
    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("gps-tracklog").join("config.json"))
    }

    #[cfg(windows)]
    fn get_config_path() -> Result<PathBuf> {
        let app_data = std::env::var("APPDATA")
            .map_err(|_| GpsError::Config("APPDATA environment variable not set".to_string()))?;

        Ok(PathBuf::from(app_data).join("gps-tracklog").join("config.json"))
    }
}
