//! Output sinks for readings.
//!
//! A [`Sink`] receives every emitted [`Reading`](crate::reading::Reading)
//! and delivers it to one destination: a console format, an MQTT broker or
//! an InfluxDB line-protocol file. The lifecycle is strict: `open` exactly
//! once before any `write`, `close` exactly once on every exit path, and a
//! failing sink must never block delivery to its siblings.

pub mod csv;
pub mod influx;
pub mod json;
pub mod mqtt;
pub mod pretty;

use crate::reading::Reading;
use std::io::Write;

/// Errors returned by sink operations.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// `open` failed. If the sink is part of a configured set, the process
    /// must not start delivering.
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    /// A single `write` failed. Logged and skipped; the record is not
    /// retried (at-most-once per sink per record).
    #[error("sink write failed: {0}")]
    Write(String),
    /// The sink needs an optional capability this build does not carry.
    /// A configuration error, reported at construction time.
    #[error("{0}")]
    MissingDependency(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An output target with a uniform open/write/close lifecycle.
pub trait Sink: Send {
    /// Establish whatever connection or handle the sink needs.
    fn open(&mut self) -> Result<(), SinkError>;

    /// Deliver one reading. Must not block indefinitely; transports that
    /// can stall hand off to an internal worker instead.
    fn write(&mut self, reading: &Reading) -> Result<(), SinkError>;

    /// Release the sink's resources. Safe to call even if `open` failed.
    fn close(&mut self) -> Result<(), SinkError>;
}

/// Console output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines with aligned columns.
    #[default]
    Pp,
    /// Comma-separated values with a header from the first record.
    Csv,
    /// One compact JSON object per line, pipeable into the relay.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pp => write!(f, "pp"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Build the console sink for the selected format, writing to `out`.
pub fn console_sink(format: OutputFormat, out: Box<dyn Write + Send>) -> Box<dyn Sink> {
    match format {
        OutputFormat::Pp => Box::new(pretty::PrettySink::new(out)),
        OutputFormat::Csv => Box::new(csv::CsvSink::new(out)),
        OutputFormat::Json => Box::new(json::JsonSink::new(out)),
    }
}

/// Build an MQTT sink backed by the compiled-in client.
///
/// # Errors
/// [`SinkError::MissingDependency`] when the crate was built without the
/// `mqtt` feature.
#[cfg(feature = "mqtt")]
pub fn mqtt_sink(config: mqtt::MqttConfig) -> Result<Box<dyn Sink>, SinkError> {
    Ok(Box::new(mqtt::MqttSink::with_rumqttc(config)))
}

#[cfg(not(feature = "mqtt"))]
pub fn mqtt_sink(_config: mqtt::MqttConfig) -> Result<Box<dyn Sink>, SinkError> {
    Err(SinkError::MissingDependency(
        "MQTT output requires the 'mqtt' feature; rebuild with --features mqtt".into(),
    ))
}

/// Build an Influx line-protocol sink writing to `path` ("-" for stdout).
pub fn influx_sink(path: &str) -> Box<dyn Sink> {
    Box::new(influx::InfluxSink::new(path))
}
