// src/main.rs
//! GPS Track Logger - find a serial GPS and record its track to CSV

use anyhow::Context;
use clap::{Parser, Subcommand};
use gps_tracklog::{
    gps::scanner::{self, list_serial_ports},
    *,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "gps-tracklog", version, about = "Record a GPS track from a serial receiver")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports visible to this machine
    ListPorts,
    /// Probe ports and report which one carries a GPS
    Discover {
        #[arg(short, long)]
        baud: Option<u32>,
    },
    /// Find the GPS and sample it until Ctrl+C
    Run {
        #[arg(short, long)]
        baud: Option<u32>,
        /// Directory track files are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Write the track to CSV
        #[arg(short, long)]
        record: bool,
        /// JSON session descriptor to continue an earlier track file
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the default config location
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load_from(path),
        None => TrackerConfig::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Command::ListPorts => list_serial_ports(&SystemSerial)?,
        Command::Discover { baud } => {
            if let Some(baud) = baud {
                config.baud_rate = baud;
            }
            config.validate()?;
            discover(&config).await?;
        }
        Command::Run {
            baud,
            output_dir,
            record,
            resume,
        } => {
            if let Some(baud) = baud {
                config.baud_rate = baud;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.validate()?;
            run(config, record, resume).await?;
        }
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = config.save()?;
                println!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}

async fn discover(config: &TrackerConfig) -> anyhow::Result<()> {
    println!("Probing serial ports at {} baud...", config.baud_rate);

    let (port, inventory) = scanner::discover(
        &SystemSerial,
        config.baud_rate,
        config.probe_window(),
        &config.sentence_types,
    )
    .await?;

    println!("GPS found on {}", port);
    println!("Sentence types: {}", inventory);
    Ok(())
}

async fn run(config: TrackerConfig, record: bool, resume: Option<PathBuf>) -> anyhow::Result<()> {
    let interval = config.sample_interval().max(Duration::from_secs(1));
    let flag = Arc::new(ErrorFlag::new());
    let mut monitor = GpsMonitor::new(config, flag.clone());

    if let Some(path) = resume {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let descriptor: SessionDescriptor = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid session file {}", path.display()))?;
        monitor.continue_session(&descriptor);
    }

    println!("Searching for a GPS...");
    let (port, inventory) = monitor.find_gps_port().await?;
    println!("Connected to {} ({})", port, inventory);

    if record {
        monitor.set_output_enabled(true)?;
        if let Some(path) = monitor.track_csv_path() {
            println!("Recording track to {}", path.display());
        }
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if !monitor.is_running() {
                    break;
                }
                let state = monitor.snapshot();
                let time = state
                    .time
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "--:--:--".to_string());
                let status = if flag.is_raised() { "NO FIX" } else { "OK" };
                println!("{}  {}  [{}]", time, state.format_coordinate(), status);
            }
        }
    }

    println!("Stopping...");
    monitor.shutdown().await?;

    let state = monitor.snapshot();
    println!(
        "{} samples, {} fixes, {} skipped sentences, {} dropped samples",
        state.cycles, state.fixes, state.skipped_sentences, state.dropped_samples
    );
    Ok(())
}
