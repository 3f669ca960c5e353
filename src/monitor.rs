// src/monitor.rs
//! Main GPS acquisition coordination

use crate::{
    config::TrackerConfig,
    error::{GpsError, Result},
    gps::{
        data::{Coordinate, GpsState, SentenceInventory},
        scanner::{self, Port, SerialOpener, SystemSerial},
    },
    sampler::{Sampler, SamplerTiming},
    signal::SignalObserver,
    track::{SessionDescriptor, TrackLog},
};
use chrono::NaiveTime;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
};
use tokio::task::JoinHandle;

/// Finds the receiver, runs the sampling task and exposes its results
/// to the rest of the application.
pub struct GpsMonitor<O: SerialOpener + 'static = SystemSerial> {
    config: TrackerConfig,
    opener: Arc<O>,
    observer: Arc<dyn SignalObserver>,
    state: Arc<RwLock<GpsState>>,
    track: Arc<Mutex<TrackLog>>,
    selected: Option<(Port, SentenceInventory)>,
    task: Option<SamplingTask>,
}

/// A spawned sampler together with the flag that keeps it looping
struct SamplingTask {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

impl SamplingTask {
    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.handle.is_finished()
    }

    async fn join(self) -> Result<()> {
        self.stop();
        self.handle
            .await
            .map_err(|e| GpsError::Task(format!("Sampling task failed: {}", e)))?
    }
}

impl GpsMonitor<SystemSerial> {
    /// Create a monitor for the serial ports on this machine
    pub fn new(config: TrackerConfig, observer: Arc<dyn SignalObserver>) -> Self {
        Self::with_opener(config, SystemSerial, observer)
    }
}

impl<O: SerialOpener + 'static> GpsMonitor<O> {
    pub fn with_opener(config: TrackerConfig, opener: O, observer: Arc<dyn SignalObserver>) -> Self {
        let track = TrackLog::new(config.output_dir.clone(), config.max_buffered_samples);
        Self {
            config,
            opener: Arc::new(opener),
            observer,
            state: Arc::new(RwLock::new(GpsState::new())),
            track: Arc::new(Mutex::new(track)),
            selected: None,
            task: None,
        }
    }

    /// Probe the serial ports and start sampling the one that carries a GPS.
    ///
    /// This takes up to the probe window per port. A sampling task left from
    /// an earlier call is stopped and awaited first so the port is free and
    /// only one sampler ever runs. The track session is kept across calls.
    pub async fn find_gps_port(&mut self) -> Result<(Port, SentenceInventory)> {
        if let Some(previous) = self.task.take() {
            if let Err(e) = previous.join().await {
                log::warn!("Previous sampling task ended with an error: {}", e);
            }
        }

        let (port, inventory) = scanner::discover(
            self.opener.as_ref(),
            self.config.baud_rate,
            self.config.probe_window(),
            &self.config.sentence_types,
        )
        .await?;

        self.start_sampling(port.clone(), inventory.clone());
        self.selected = Some((port.clone(), inventory.clone()));
        Ok((port, inventory))
    }

    fn start_sampling(&mut self, port: Port, inventory: SentenceInventory) {
        let timing = SamplerTiming {
            warmup: self.config.warmup(),
            read_window: self.config.read_window(),
            interval: self.config.sample_interval(),
        };
        let sampler = Sampler::new(
            inventory,
            timing,
            Arc::clone(&self.state),
            Arc::clone(&self.track),
            Arc::clone(&self.observer),
        );

        let opener = Arc::clone(&self.opener);
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(sampler.run(opener, port, Arc::clone(&running)));
        self.task = Some(SamplingTask { running, handle });
    }

    /// Ask the sampling task to finish its current cycle and exit
    pub fn stop(&self) {
        if let Some(task) = &self.task {
            task.stop();
        }
    }

    /// Stop sampling and wait until the port has been released
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task.join().await,
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(SamplingTask::is_running)
    }

    /// Port and inventory chosen by the last successful discovery
    pub fn selected(&self) -> Option<&(Port, SentenceInventory)> {
        self.selected.as_ref()
    }

    /// Last recorded coordinates
    pub fn coordinates(&self) -> Option<Coordinate> {
        self.snapshot().coordinate
    }

    /// Overwrite the last recorded coordinates
    pub fn set_coordinates(&self, coordinate: Option<Coordinate>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).coordinate = coordinate;
    }

    /// Time of the last sample
    pub fn time(&self) -> Option<NaiveTime> {
        self.snapshot().time
    }

    /// A copy of everything the sampling task has recorded
    pub fn snapshot(&self) -> GpsState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn track_csv_path(&self) -> Option<PathBuf> {
        self.track().csv_path().map(PathBuf::from)
    }

    pub fn output_enabled(&self) -> bool {
        self.track().output_enabled()
    }

    /// Turn track output on or off, creating today's file on first enable
    pub fn set_output_enabled(&self, enabled: bool) -> Result<()> {
        self.track().set_output_enabled(enabled)
    }

    /// Resume an earlier track file or reset so the next enable starts a new one
    pub fn continue_session(&self, descriptor: &SessionDescriptor) {
        self.track().continue_session(descriptor);
    }

    fn track(&self) -> MutexGuard<'_, TrackLog> {
        self.track.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<O: SerialOpener + 'static> Drop for GpsMonitor<O> {
    fn drop(&mut self) {
        self.stop();
    }
}
