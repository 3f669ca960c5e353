// src/track.rs
//! Daily CSV track log with session continuation

use crate::{
    error::{GpsError, Result},
    gps::data::Sample,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

pub const TRACK_HEADER: [&str; 3] = ["Time", "Latitude", "Longitude"];

/// Date format used in track file names, e.g. `01Jan2024`
pub const TRACK_DATE_FORMAT: &str = "%d%b%Y";

/// Describes whether a previous logging session should be resumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub status: bool,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub counter: String,
}

impl SessionDescriptor {
    pub fn resume(date: &str, counter: &str) -> Self {
        Self {
            status: true,
            date: date.to_string(),
            counter: counter.to_string(),
        }
    }

    pub fn fresh() -> Self {
        Self::default()
    }

    /// Track file name this descriptor points at
    pub fn file_name(&self) -> String {
        if self.counter == "0" {
            format!("{}_track.csv", self.date)
        } else {
            format!("{}_track_{}.csv", self.date, self.counter)
        }
    }
}

/// Buffered, append-only CSV track writer
#[derive(Debug)]
pub struct TrackLog {
    output_dir: PathBuf,
    output_enabled: bool,
    csv_path: Option<PathBuf>,
    buffer: VecDeque<Sample>,
    max_buffered: usize,
}

impl TrackLog {
    pub fn new(output_dir: impl Into<PathBuf>, max_buffered: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_enabled: false,
            csv_path: None,
            buffer: VecDeque::new(),
            max_buffered: max_buffered.max(1),
        }
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    pub fn csv_path(&self) -> Option<&Path> {
        self.csv_path.as_deref()
    }

    /// Samples waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Enable or disable writing, creating today's track file if needed
    pub fn set_output_enabled(&mut self, enabled: bool) -> Result<()> {
        self.set_output_enabled_on(enabled, Local::now().date_naive())
    }

    /// Enable or disable writing, naming a new track file after `date`.
    ///
    /// A fresh file only gets created on a false to true transition with no
    /// path assigned. The header is written before the flag flips.
    pub fn set_output_enabled_on(&mut self, enabled: bool, date: NaiveDate) -> Result<()> {
        if enabled && !self.output_enabled && self.csv_path.is_none() {
            let path = self.create_track_file(&date.format(TRACK_DATE_FORMAT).to_string())?;
            log::info!("Started track file {}", path.display());
            self.csv_path = Some(path);
        }

        self.output_enabled = enabled;
        Ok(())
    }

    /// Resume an earlier track file or reset for a new one
    pub fn continue_session(&mut self, descriptor: &SessionDescriptor) {
        if !descriptor.status {
            log::debug!("Track session reset, next enable starts a new file");
            self.csv_path = None;
            self.output_enabled = false;
            return;
        }

        let path = self.output_dir.join(descriptor.file_name());
        log::info!("Continuing track file {}", path.display());
        self.csv_path = Some(path);
    }

    /// Queue a sample. Returns false when the oldest sample had to be
    /// dropped to stay within the buffer bound.
    pub fn push(&mut self, sample: Sample) -> bool {
        let mut kept_all = true;
        if self.buffer.len() >= self.max_buffered {
            self.buffer.pop_front();
            kept_all = false;
        }
        self.buffer.push_back(sample);
        kept_all
    }

    /// Append all buffered samples to the track file.
    ///
    /// The buffer is only cleared once every row is written, so a failed
    /// flush is retried in full next time.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let path = self
            .csv_path
            .as_ref()
            .ok_or_else(|| GpsError::Track("No track file assigned".to_string()))?;

        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for sample in &self.buffer {
            let (latitude, longitude) = match sample.position {
                Some(coordinate) => (coordinate.latitude.to_string(), coordinate.longitude.to_string()),
                None => (String::new(), String::new()),
            };
            writer.write_record([sample.time.format("%H:%M:%S").to_string(), latitude, longitude])?;
        }
        writer.flush()?;

        let written = self.buffer.len();
        self.buffer.clear();
        log::debug!("Appended {} samples to {}", written, path.display());
        Ok(written)
    }

    /// Create the first of `<stem>.csv`, `<stem>_1.csv`, `<stem>_2.csv`, ...
    /// that does not exist yet and write the header to it.
    ///
    /// Creation is exclusive, so a file that appears between attempts is
    /// never truncated; the next suffix is tried instead.
    fn create_track_file(&self, date: &str) -> Result<PathBuf> {
        let stem = format!("{}_track", date);
        let mut path = self.output_dir.join(format!("{}.csv", stem));
        let mut counter = 1u32;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_header(file)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    path = self.output_dir.join(format!("{}_{}.csv", stem, counter));
                    counter += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn write_header(file: File) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(TRACK_HEADER)?;
    writer.flush()?;
    Ok(())
}
