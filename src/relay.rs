//! Relay core: re-publish a serialized reading stream.
//!
//! Reads JSON lines (as produced by the capture process in `-o json` mode,
//! typically over a pipe), parses each into a reading and forwards it to
//! the configured remote sinks. Decouples capture from delivery: the
//! capture box only needs a pipe, the relay owns the network connections.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use std::io;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Errors returned by the relay run.
///
/// Unparseable input lines are not errors: they are passed through to the
/// error channel verbatim and processing continues.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Drain `input` to EOF, forwarding every parsed reading to every sink.
///
/// Blank lines are skipped. Lines that do not parse as a reading are
/// foreign output (log lines from the producer, shell noise) and are passed
/// through to `err` unchanged. Per-sink write failures are logged and do
/// not affect other sinks or later lines. On every exit path each sink
/// receives exactly one `close` attempt.
pub fn run(
    input: impl BufRead,
    mut sinks: Vec<Box<dyn Sink>>,
    err: &mut dyn Write,
) -> Result<(), RelayError> {
    open_all(&mut sinks)?;

    let result = forward(input, &mut sinks, err);

    for sink in &mut sinks {
        if let Err(e) = sink.close() {
            let _ = writeln!(err, "sink close failed: {e}");
        }
    }

    result
}

/// Open every sink in order, fail-fast, rolling back the ones that opened.
fn open_all(sinks: &mut [Box<dyn Sink>]) -> Result<(), RelayError> {
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

fn forward(
    input: impl BufRead,
    sinks: &mut [Box<dyn Sink>],
    err: &mut dyn Write,
) -> Result<(), RelayError> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reading: Reading = match serde_json::from_str(line) {
            Ok(reading) => reading,
            Err(_) => {
                // Foreign passthrough, never fatal.
                writeln!(err, "{line}")?;
                continue;
            }
        };

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.write(&reading) {
                writeln!(err, "{e}")?;
            }
        }
    }

    Ok(())
}
