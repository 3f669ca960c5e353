// src/sampler.rs
//! Background sampling loop: read a fix, stamp it, queue it, flush it

use crate::{
    error::Result,
    gps::{
        data::{Coordinate, GpsState, Sample, SentenceInventory},
        nmea::{self, LineOutcome},
        scanner::{Port, SerialOpener},
    },
    signal::{GpsEvent, SignalObserver},
    track::TrackLog,
};
use std::{
    io::ErrorKind,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    time::{sleep, timeout_at, Instant},
};

/// Result of one read window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowOutcome {
    pub fix: Option<Coordinate>,
    /// Consultable sentences that failed their validity gate
    pub skipped: u64,
}

/// Read lines until the best available fix is known or `window` runs out.
///
/// A primary-slot fix ends the window at once. A lower-priority fix is held
/// while later lines might still bring a better one, and is returned once its
/// own sentence type comes round again, since by then the receiver has sent
/// everything it had for that epoch. End of stream also ends the window.
pub async fn read_window<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    inventory: &SentenceInventory,
    window: Duration,
) -> WindowOutcome {
    let deadline = Instant::now() + window;
    let mut outcome = WindowOutcome::default();
    let mut held: Option<(usize, Coordinate)> = None;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match timeout_at(deadline, reader.read_until(b'\n', &mut raw)).await {
            Err(_) | Ok(Ok(0)) => break,
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => continue,
            Ok(Err(e)) => {
                log::warn!("Error reading from serial port: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&raw);
        let parsed = nmea::classify(&line, inventory);
        let repeats_held = matches!((held, parsed.slot()), (Some((held_slot, _)), Some(slot)) if slot == held_slot);

        match parsed {
            LineOutcome::Fix { slot: 0, coordinate } => {
                held = Some((0, coordinate));
                break;
            }
            LineOutcome::Fix { slot, coordinate } => {
                if held.map_or(true, |(held_slot, _)| slot <= held_slot) {
                    held = Some((slot, coordinate));
                }
            }
            LineOutcome::Skipped { kind, .. } => {
                outcome.skipped += 1;
                log::debug!("Skipped {:?} sentence without a valid fix: {}", kind, line.trim_end());
            }
            LineOutcome::Ignored => {}
        }

        if repeats_held {
            break;
        }
    }

    outcome.fix = held.map(|(_, coordinate)| coordinate);
    outcome
}

/// Cadence of the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerTiming {
    /// Pause before reopening the port the scanner just closed
    pub warmup: Duration,
    pub read_window: Duration,
    pub interval: Duration,
}

impl Default for SamplerTiming {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(1),
            read_window: Duration::from_secs(5),
            interval: Duration::from_secs(2),
        }
    }
}

/// Owns the parsing side of one acquisition session
pub struct Sampler {
    inventory: SentenceInventory,
    timing: SamplerTiming,
    state: Arc<RwLock<GpsState>>,
    track: Arc<Mutex<TrackLog>>,
    observer: Arc<dyn SignalObserver>,
}

impl Sampler {
    pub fn new(
        inventory: SentenceInventory,
        timing: SamplerTiming,
        state: Arc<RwLock<GpsState>>,
        track: Arc<Mutex<TrackLog>>,
        observer: Arc<dyn SignalObserver>,
    ) -> Self {
        Self {
            inventory,
            timing,
            state,
            track,
            observer,
        }
    }

    pub fn inventory(&self) -> &SentenceInventory {
        &self.inventory
    }

    /// Run one sampling cycle against `reader` and return the queued sample
    pub async fn cycle<R: AsyncBufRead + Unpin>(&self, reader: &mut R) -> Sample {
        let outcome = read_window(reader, &self.inventory, self.timing.read_window).await;

        let position = {
            let mut state = write_state(&self.state);
            state.cycles += 1;
            state.skipped_sentences += outcome.skipped;
            if let Some(coordinate) = outcome.fix {
                state.coordinate = Some(coordinate);
                state.fixes += 1;
            }
            state.coordinate
        };

        if outcome.fix.is_some() {
            if self.observer.signal(GpsEvent::HasReadError) {
                self.observer.signal(GpsEvent::ClearErrors);
            }
        } else if !self.observer.signal(GpsEvent::HasReadError) {
            self.observer.signal(GpsEvent::ShowReadError);
        }

        let sample = Sample::now(position);
        write_state(&self.state).time = Some(sample.time);
        self.record(sample);
        sample
    }

    /// Queue a sample and flush it if output is on. Never fails: problems
    /// are counted and reported through the observer.
    fn record(&self, sample: Sample) {
        let mut track = lock_track(&self.track);

        if !track.push(sample) {
            write_state(&self.state).dropped_samples += 1;
            log::debug!("Track buffer full, dropped the oldest sample");
        }

        if !track.output_enabled() {
            return;
        }
        if let Err(e) = track.flush() {
            let path = track
                .csv_path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            drop(track);

            log::warn!("Track flush failed, keeping {} sample(s) for retry", self.pending());
            write_state(&self.state).flush_failures += 1;
            self.observer.signal(GpsEvent::TrackWriteFailed {
                path,
                message: e.to_string(),
            });
        }
    }

    fn pending(&self) -> usize {
        lock_track(&self.track).pending()
    }

    /// Open `port` and sample it until `running` is cleared.
    ///
    /// The flag is checked once per cycle. The port is dropped when this
    /// returns.
    pub async fn run<O: SerialOpener>(self, opener: Arc<O>, port: Port, running: Arc<AtomicBool>) -> Result<()> {
        sleep(self.timing.warmup).await;

        let stream = match opener.open(&port) {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Failed to open {} for sampling: {}", port, e);
                if !self.observer.signal(GpsEvent::HasReadError) {
                    self.observer.signal(GpsEvent::ShowReadError);
                }
                return Err(e);
            }
        };
        let mut reader = BufReader::new(stream);
        log::info!("Sampling {} every {:?}", port, self.timing.interval);

        while running.load(Ordering::Relaxed) {
            let sample = self.cycle(&mut reader).await;
            log::debug!("Sample at {}: {:?}", sample.time, sample.position);

            if !running.load(Ordering::Relaxed) {
                break;
            }
            sleep(self.timing.interval).await;
        }

        log::info!("Sampling stopped, releasing {}", port.name);
        Ok(())
    }
}

fn write_state(state: &RwLock<GpsState>) -> RwLockWriteGuard<'_, GpsState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock_track(track: &Mutex<TrackLog>) -> MutexGuard<'_, TrackLog> {
    track.lock().unwrap_or_else(PoisonError::into_inner)
}
