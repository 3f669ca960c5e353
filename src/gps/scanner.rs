// src/gps/scanner.rs
//! Serial port discovery: find the port a GPS receiver talks on

use super::data::{SentenceInventory, INVENTORY_SLOTS};
use crate::error::{DiscoveryError, GpsError, Result};
use std::{fmt, io::ErrorKind, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    time::{timeout_at, Instant},
};
use tokio_serial::SerialPortBuilderExt;

/// Per-read timeout applied to every opened port
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// A serial device and the baud rate it is opened at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub baud_rate: u32,
}

impl Port {
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            baud_rate,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} baud", self.name, self.baud_rate)
    }
}

/// Source of serial ports and byte streams
pub trait SerialOpener: Send + Sync {
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Names of the ports visible to the host
    fn list_ports(&self) -> Result<Vec<String>>;

    fn open(&self, port: &Port) -> Result<Self::Stream>;
}

/// Ports on the local machine, opened through `tokio-serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialOpener for SystemSerial {
    type Stream = tokio_serial::SerialStream;

    fn list_ports(&self) -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports()?;
        Ok(ports.into_iter().map(|port| port.port_name).collect())
    }

    fn open(&self, port: &Port) -> Result<Self::Stream> {
        tokio_serial::new(&port.name, port.baud_rate)
            .timeout(SERIAL_READ_TIMEOUT)
            .open_native_async()
            .map_err(GpsError::from)
    }
}

/// Probe every port for the target sentence types and pick one.
///
/// Each port is listened to for up to `window`. A port showing all target
/// types wins immediately. Otherwise the last port that showed any of them is
/// accepted with its partial inventory. What one port showed is never carried
/// over to the next.
pub async fn discover<O: SerialOpener>(
    opener: &O,
    baud_rate: u32,
    window: Duration,
    target_types: &[String; INVENTORY_SLOTS],
) -> std::result::Result<(Port, SentenceInventory), DiscoveryError> {
    let names = opener
        .list_ports()
        .map_err(|e| DiscoveryError::Enumerate(e.to_string()))?;
    log::info!("Probing {} serial port(s) at {} baud", names.len(), baud_rate);

    let mut best: Option<(Port, SentenceInventory)> = None;
    let mut failures: Vec<DiscoveryError> = Vec::new();

    for name in &names {
        let port = Port::new(name.as_str(), baud_rate);
        let stream = match opener.open(&port) {
            Ok(stream) => stream,
            Err(e) => {
                let failure = DiscoveryError::PortUnavailable {
                    port: name.clone(),
                    reason: e.to_string(),
                };
                log::warn!("{}", failure);
                failures.push(failure);
                continue;
            }
        };

        let inventory = probe_port(stream, window, target_types).await;
        log::debug!("Port {} showed {}", name, inventory);

        if inventory.is_complete() {
            log::info!("Found GPS on {} with {}", port, inventory);
            return Ok((port, inventory));
        }
        if !inventory.is_empty() {
            best = Some((port, inventory));
        }
    }

    if let Some((port, inventory)) = best {
        log::info!("Using GPS on {} with partial inventory {}", port, inventory);
        return Ok((port, inventory));
    }

    if !names.is_empty() && failures.len() == names.len() {
        let messages: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
        return Err(DiscoveryError::NotFound(messages.join("; ")));
    }
    Err(DiscoveryError::NotFound("Could not find a connected GPS".to_string()))
}

/// Listen to one port and record which target sentences appear on it
pub async fn probe_port<R: AsyncRead + Unpin>(
    stream: R,
    window: Duration,
    target_types: &[String; INVENTORY_SLOTS],
) -> SentenceInventory {
    let deadline = Instant::now() + window;
    let mut reader = BufReader::new(stream);
    let mut inventory = SentenceInventory::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match timeout_at(deadline, reader.read_until(b'\n', &mut line)).await {
            Err(_) | Ok(Ok(0)) => break,
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => continue,
            Ok(Err(e)) => {
                log::debug!("Read error while probing: {}", e);
                break;
            }
        }

        for (slot, identifier) in target_types.iter().enumerate() {
            if contains_bytes(&line, identifier.as_bytes()) {
                inventory.bind(slot, identifier);
            }
        }
        if inventory.is_complete() {
            break;
        }
    }

    inventory
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

/// List available serial ports
pub fn list_serial_ports<O: SerialOpener>(opener: &O) -> Result<()> {
    let ports = opener.list_ports()?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {}", port);
        }
    }

    Ok(())
}
