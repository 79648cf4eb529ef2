//! InfluxDB line protocol output.
//!
//! Writes one `env` measurement line per reading to stdout or an
//! append-mode file, suitable for Telegraf's file input or `influx write`.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

/// Measurement name for every line.
const MEASUREMENT: &str = "env";

/// Field values in InfluxDB line protocol.
///
/// Integers carry the `i` type suffix; floats are bare. Which variant a
/// reading field maps to is fixed by the schema below, never guessed.
#[derive(Debug, PartialEq)]
enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Integer(num) => write!(f, "{num}i"),
            FieldValue::Float(num) => write!(f, "{num}"),
        }
    }
}

/// Escape a tag value: space, comma and `=` are significant in the
/// protocol and must be backslash-prefixed.
fn escape_tag(value: &str) -> String {
    value
        .replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}

/// Map a reading onto line-protocol fields, in fixed order.
///
/// Temperature and the VOC index are floats by schema; everything else is
/// an integer and gets the `i` suffix. Absent fields are skipped entirely.
fn field_set(reading: &Reading) -> Vec<(&'static str, FieldValue)> {
    let mut fields = Vec::new();

    if let Some(temp) = reading.temp {
        fields.push(("temperature_c", FieldValue::Float(temp)));
    }
    if let Some(humidity) = reading.humidity {
        fields.push(("humidity_pct", FieldValue::Integer(i64::from(humidity))));
    }
    if let Some(light) = reading.light {
        fields.push(("light", FieldValue::Integer(i64::from(light))));
    }
    if let Some(rssi) = reading.rssi {
        fields.push(("rssi_dbm", FieldValue::Integer(i64::from(rssi))));
    }
    if let Some(co2) = reading.co2_ppm {
        fields.push(("co2_ppm", FieldValue::Integer(co2 as i64)));
    }
    if let Some(voc) = reading.voc_index {
        fields.push(("voc_index", FieldValue::Float(voc)));
    }

    fields
}

/// Render one reading as a protocol line, or `None` when the reading has no
/// mappable fields (a line without fields is invalid, so none is written).
pub fn format_line(reading: &Reading) -> Option<String> {
    let fields = field_set(reading);
    if fields.is_empty() {
        return None;
    }

    let fields = fields
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",");

    let ts_ns = reading
        .time
        .unwrap_or_else(crate::reading::epoch_seconds)
        .saturating_mul(1_000_000_000);

    Some(format!(
        "{MEASUREMENT},room={},device={} {} {}",
        escape_tag(&reading.location),
        escape_tag(&reading.id),
        fields,
        ts_ns,
    ))
}

/// Line-protocol sink writing to stdout (`-` or empty path) or a file.
///
/// Files are opened in append mode so several processes can interleave
/// whole lines without coordination.
pub struct InfluxSink {
    path: String,
    out: Option<Box<dyn Write + Send>>,
}

impl InfluxSink {
    pub fn new(path: &str) -> Self {
        InfluxSink {
            path: path.to_string(),
            out: None,
        }
    }
}

impl Sink for InfluxSink {
    fn open(&mut self) -> Result<(), SinkError> {
        self.out = Some(if self.path.is_empty() || self.path == "-" {
            Box::new(std::io::stdout())
        } else {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.path)
                .map_err(|e| SinkError::Unavailable(format!("{}: {e}", self.path)))?;
            Box::new(file)
        });
        Ok(())
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let Some(out) = self.out.as_mut() else {
            return Err(SinkError::Write("influx sink is not open".into()));
        };
        if let Some(line) = format_line(reading) {
            writeln!(out, "{line}")?;
            out.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        // Dropping the handle closes it; stdout is shared and left alone.
        self.out = None;
        Ok(())
    }
}
