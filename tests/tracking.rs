use gps_tracklog::{
    sampler::{Sampler, SamplerTiming},
    Coordinate, ErrorFlag, GpsError, GpsEvent, GpsMonitor, GpsState, Port, Result, SentenceInventory, SerialOpener,
    SessionDescriptor, TrackLog, TrackerConfig,
};
use std::{
    io::Cursor,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

/// Serial ports backed by canned NMEA text
struct CannedSerial {
    ports: Vec<(&'static str, &'static str)>,
}

impl SerialOpener for CannedSerial {
    type Stream = Cursor<&'static [u8]>;

    fn list_ports(&self) -> Result<Vec<String>> {
        Ok(self.ports.iter().map(|(name, _)| name.to_string()).collect())
    }

    fn open(&self, port: &Port) -> Result<Self::Stream> {
        self.ports
            .iter()
            .find(|(name, _)| *name == port.name)
            .map(|&(_, data)| Cursor::new(data.as_bytes()))
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such port").into())
    }
}

fn gga(lat: &str, lon: &str) -> String {
    format!("$GPGGA,123519,{},N,{},E,1,08,0.9,545.4,M,46.9,M,,*47\r\n", lat, lon)
}

const RMC_VOID: &str = "$GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

#[tokio::test]
async fn alternating_cycles_keep_prior_fix_and_toggle_error() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = SentenceInventory::from_slots([Some("$GPGGA"), Some("$GPRMC"), None]);
    let state = Arc::new(RwLock::new(GpsState::new()));
    let track = Arc::new(Mutex::new(TrackLog::new(dir.path(), 100)));
    let flag = Arc::new(ErrorFlag::new());
    let sampler = Sampler::new(
        inventory,
        SamplerTiming::default(),
        Arc::clone(&state),
        Arc::clone(&track),
        flag.clone(),
    );

    let mut previous: Option<Coordinate> = None;
    for cycle in 1..=10u32 {
        if cycle % 2 == 1 {
            let sample = sampler.cycle(&mut RMC_VOID.as_bytes()).await;
            assert_eq!(sample.position, previous, "cycle {} changed the coordinate", cycle);
            assert!(flag.is_raised());
        } else {
            let minutes = format!("{:02}.000", cycle);
            let line = gga(&format!("48{}", minutes), &format!("011{}", minutes));
            let sample = sampler.cycle(&mut line.as_bytes()).await;

            let position = sample.position.expect("even cycles carry a fix");
            let expected = 48.0 + cycle as f64 / 60.0;
            assert!((position.latitude - expected).abs() < 0.000001);
            assert_ne!(Some(position), previous);
            assert!(!flag.is_raised());
            previous = Some(position);
        }
    }

    assert_eq!(track.lock().unwrap().pending(), 10);
    assert_eq!(flag.raise_count(), 5);
    assert_eq!(flag.clear_count(), 5);

    let state = state.read().unwrap();
    assert_eq!(state.cycles, 10);
    assert_eq!(state.fixes, 5);
    assert_eq!(state.skipped_sentences, 5);
}

const DEVICE: &str = "$GPGSV,3,1,12,01,40,083,46*75\r\n\
$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n\
$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n\
$GPGLL,4807.038,N,01131.000,E,013604,A,A*54\r\n";

fn config(dir: &std::path::Path) -> TrackerConfig {
    TrackerConfig {
        output_dir: dir.to_path_buf(),
        ..TrackerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn monitor_discovers_samples_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let opener = CannedSerial {
        ports: vec![("/dev/ttyS0", "modem noise\r\n"), ("/dev/ttyUSB0", DEVICE)],
    };
    let flag = Arc::new(ErrorFlag::new());
    let mut monitor = GpsMonitor::with_opener(config(dir.path()), opener, flag.clone());

    let (port, inventory) = monitor.find_gps_port().await.unwrap();
    assert_eq!(port.name, "/dev/ttyUSB0");
    assert!(inventory.is_complete());
    assert!(monitor.is_running());

    monitor.set_output_enabled(true).unwrap();
    let path = monitor.track_csv_path().expect("enabling output assigns a file");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let fix = monitor.coordinates().expect("first cycle reads the GGA fix");
    assert!((fix.latitude - 48.1173).abs() < 0.0001);
    assert!(monitor.time().is_some());

    monitor.shutdown().await.unwrap();
    assert!(!monitor.is_running());

    let contents = std::fs::read_to_string(path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("Time,Latitude,Longitude"));
    assert!(lines.next().unwrap().ends_with(",48.1173,11.516667"));
}

#[tokio::test]
async fn monitor_reports_missing_gps() {
    let dir = tempfile::tempdir().unwrap();
    let opener = CannedSerial {
        ports: vec![("/dev/ttyS0", "modem noise\r\n")],
    };
    let mut monitor = GpsMonitor::with_opener(config(dir.path()), opener, Arc::new(ErrorFlag::new()));

    let err = monitor.find_gps_port().await.unwrap_err();
    assert_eq!(err.to_string(), "Could not find a connected GPS");
    assert!(!monitor.is_running());
}

#[tokio::test]
async fn monitor_session_continuation() {
    let dir = tempfile::tempdir().unwrap();
    let opener = CannedSerial { ports: vec![] };
    let monitor = GpsMonitor::with_opener(config(dir.path()), opener, Arc::new(ErrorFlag::new()));

    monitor.continue_session(&SessionDescriptor::resume("01Jan2024", "2"));
    assert_eq!(monitor.track_csv_path(), Some(dir.path().join("01Jan2024_track_2.csv")));

    monitor.set_output_enabled(true).unwrap();
    assert!(monitor.output_enabled());
    // Resumed files already have a header; nothing is created on enable.
    assert!(!dir.path().join("01Jan2024_track_2.csv").exists());

    monitor.continue_session(&SessionDescriptor::fresh());
    assert_eq!(monitor.track_csv_path(), None);
    assert!(!monitor.output_enabled());
}

#[tokio::test(start_paused = true)]
async fn rediscovery_after_stop_keeps_a_single_sampler() {
    let dir = tempfile::tempdir().unwrap();
    let opener = CannedSerial {
        ports: vec![("/dev/ttyUSB0", DEVICE)],
    };
    let mut monitor = GpsMonitor::with_opener(config(dir.path()), opener, Arc::new(ErrorFlag::new()));

    monitor.find_gps_port().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(monitor.snapshot().cycles, 1);

    // The first task is still sleeping between cycles when discovery restarts.
    monitor.stop();
    monitor.find_gps_port().await.unwrap();
    assert!(monitor.is_running());

    let before = monitor.snapshot().cycles;
    tokio::time::sleep(Duration::from_secs(20)).await;
    let cycles = monitor.snapshot().cycles - before;

    // One cycle every 2 s after a 1 s warm-up.
    assert_eq!(cycles, 10, "{} cycles in 20 s", cycles);
    assert!(monitor.is_running());

    monitor.shutdown().await.unwrap();
    assert!(!monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn monitor_reports_crashed_sampler_as_task_error() {
    let dir = tempfile::tempdir().unwrap();
    let opener = CannedSerial {
        ports: vec![("/dev/ttyUSB0", DEVICE)],
    };
    let observer = Arc::new(|_event: GpsEvent| -> bool { panic!("observer failed") });
    let mut monitor = GpsMonitor::with_opener(config(dir.path()), opener, observer);

    monitor.find_gps_port().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!monitor.is_running());

    match monitor.shutdown().await {
        Err(GpsError::Task(message)) => assert!(message.contains("Sampling task failed")),
        other => panic!("unexpected result: {:?}", other),
    }
}
