//! Human-readable console output.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::io::Write;

/// Pretty-printer for watching readings live in a terminal.
///
/// One line per reading: local-time stamp, location and id in fixed-width
/// columns, signal strength, then the values. The light annotation appears
/// only when the reading carries a non-zero light level.
pub struct PrettySink {
    out: Box<dyn Write + Send>,
}

impl PrettySink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        PrettySink { out }
    }
}

fn fmt_opt(value: &Option<impl Display>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn local_time(epoch: Option<u64>) -> String {
    let stamp: Option<DateTime<Local>> = epoch.and_then(|t| Local.timestamp_opt(t as i64, 0).single());
    stamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Render one reading as a display line, without the trailing newline.
pub fn format_reading(reading: &Reading) -> String {
    let light = match reading.light {
        Some(level) if level != 0 => format!("light level = {level}"),
        _ => String::new(),
    };
    format!(
        "{}\t{:<15} {:<10} ({:>4}dBm)\ttemp = {}c humidity = {}% {}",
        local_time(reading.time),
        reading.location,
        reading.id,
        fmt_opt(&reading.rssi),
        fmt_opt(&reading.temp),
        fmt_opt(&reading.humidity),
        light,
    )
}

impl Sink for PrettySink {
    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        writeln!(self.out, "{}", format_reading(reading))?;
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SharedBuf, base_reading};

    #[test]
    fn test_format_columns() {
        let line = format_reading(&base_reading());
        assert!(line.contains("living room     hub2      "));
        assert!(line.contains("( -60dBm)"));
        assert!(line.contains("temp = 2.5c humidity = 44%"));
    }

    #[test]
    fn test_light_annotation_only_when_nonzero() {
        let mut reading = base_reading();
        assert!(!format_reading(&reading).contains("light level"));

        reading.light = Some(0);
        assert!(!format_reading(&reading).contains("light level"));

        reading.light = Some(30);
        assert!(format_reading(&reading).contains("light level = 30"));
    }

    #[test]
    fn test_wide_location_is_not_truncated() {
        let mut reading = base_reading();
        reading.location = "a very long location name".into();
        assert!(format_reading(&reading).contains("a very long location name"));
    }

    #[test]
    fn test_write_appends_newline() {
        let buf = SharedBuf::default();
        let mut sink = PrettySink::new(Box::new(buf.clone()));
        sink.open().unwrap();
        sink.write(&base_reading()).unwrap();
        sink.close().unwrap();

        let out = buf.contents();
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with('\n'));
    }
}
