//! JSON-lines console output.
//!
//! One compact object per line. This is the relay's input format, so the
//! capture process is typically run as
//! `switchbot-listener -a -o json | switchbot-relay ...`.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use std::io::Write;

pub struct JsonSink {
    out: Box<dyn Write + Send>,
}

impl JsonSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        JsonSink { out }
    }
}

impl Sink for JsonSink {
    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let line = serde_json::to_string(reading)
            .map_err(|e| SinkError::Write(format!("serialize reading: {e}")))?;
        writeln!(self.out, "{line}")?;
        // Flush per line so downstream pipes see records as they happen.
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
