//! Core dispatch loop for `switchbot-listener`.
//!
//! Decoupled from CLI parsing and process exit codes so it can be tested
//! deterministically with an injected advertisement source, injected sinks
//! and an injected error stream.

use crate::change::ChangeDetector;
use crate::device::DeviceRegistry;
use crate::meter;
use crate::reading::Reading;
use crate::scanner::{Advertisement, ScanError};
use crate::sink::{OutputFormat, Sink, SinkError};
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for the capture process.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Console output format (csv or json so you can pipe it onward).
    #[arg(short = 'o', long, value_enum, default_value_t)]
    pub output: OutputFormat,

    /// Emit every reading, regardless of state change.
    /// Expect one every few seconds per device.
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Device registry file (address -> type/location/id).
    #[arg(long, default_value = "devices.yaml")]
    pub devices: PathBuf,

    /// Verbose output, log dropped malformed payloads.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Also publish readings to this MQTT broker.
    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: Option<String>,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD")]
    pub mqtt_password: Option<String>,

    /// Base topic for MQTT publishes.
    #[arg(long, env = "MQTT_TOPIC", default_value = "home/sensors")]
    pub mqtt_topic: String,

    /// Publish MQTT messages with the retain flag.
    #[arg(long)]
    pub mqtt_retain: bool,

    /// Also append Influx line protocol to this file ('-' for stdout).
    #[arg(long)]
    pub influx_file: Option<String>,
}

/// Errors returned by the capture run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Device(#[from] crate::device::DeviceError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// An advertisement broke the one-manufacturer-data-entry assumption.
    /// Not a transient glitch: the loop drains and the process exits.
    #[error("protocol violation: advertisement carried {0} manufacturer data entries")]
    ProtocolViolation(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Advertisement source abstraction to enable deterministic unit tests
/// without Bluetooth hardware.
pub trait AdvertisementSource: Send + Sync {
    fn start_scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>;
}

/// Real source that delegates to the compiled-in scanner backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSource;

impl AdvertisementSource for RealSource {
    fn start_scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan().await })
    }
}

/// Open every sink in order, fail-fast.
///
/// If one fails, the sinks that did open are closed again and the loop
/// never starts.
fn open_all(sinks: &mut [Box<dyn Sink>]) -> Result<(), RunError> {
    for i in 0..sinks.len() {
        if let Err(e) = sinks[i].open() {
            for sink in &mut sinks[..i] {
                let _ = sink.close();
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Run the capture loop: decode advertisements for known devices, suppress
/// unchanged readings, and fan new ones out to every sink in order.
///
/// Diagnostics go to `err`; data only ever goes through the sinks. On any
/// exit path every opened sink receives exactly one `close` attempt.
pub async fn run_with_io(
    options: &Options,
    devices: &DeviceRegistry,
    source: &dyn AdvertisementSource,
    mut sinks: Vec<Box<dyn Sink>>,
    cancel: CancellationToken,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    open_all(&mut sinks)?;

    let result = dispatch(options, devices, source, &mut sinks, cancel, err).await;

    // Draining: every sink gets its close attempt even if one fails.
    for sink in &mut sinks {
        if let Err(e) = sink.close() {
            let _ = writeln!(err, "sink close failed: {e}");
        }
    }

    result
}

async fn dispatch(
    options: &Options,
    devices: &DeviceRegistry,
    source: &dyn AdvertisementSource,
    sinks: &mut [Box<dyn Sink>],
    cancel: CancellationToken,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let mut events = source.start_scan().await?;
    let mut detector = ChangeDetector::new(options.all);

    loop {
        // Cancellation gates only the acceptance of new advertisements; a
        // record mid-dispatch always completes.
        let advertisement = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(advertisement) => advertisement,
                None => break,
            },
        };

        // Not one of ours.
        let Some(profile) = devices.get(&advertisement.mac) else {
            continue;
        };

        let count = advertisement.manufacturer_data.len();
        if count != 1 {
            // The single-entry assumption no longer holds; stop accepting
            // input and drain.
            writeln!(
                err,
                "protocol violation: {count} manufacturer data entries from {}",
                advertisement.mac
            )?;
            return Err(RunError::ProtocolViolation(count));
        }

        let payload = &advertisement.manufacturer_data[0].1;
        match meter::decode(profile.kind, payload) {
            Ok(values) => {
                if detector.should_emit(advertisement.mac, &values) {
                    let reading = Reading::from_observation(profile, advertisement.rssi, &values);
                    for sink in sinks.iter_mut() {
                        // A failing sink never blocks its siblings, and the
                        // record is not retried.
                        if let Err(e) = sink.write(&reading) {
                            writeln!(err, "{e}")?;
                        }
                    }
                }
            }
            Err(e) => {
                if options.verbose {
                    writeln!(err, "{e}")?;
                }
            }
        }
    }

    Ok(())
}
