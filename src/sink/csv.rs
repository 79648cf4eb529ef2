//! CSV console output.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use serde_json::Value;
use std::io::Write;

/// Serialized field names in record order. The JSON object for a reading
/// only ever contains a subset of these.
const FIELD_ORDER: [&str; 9] = [
    "time",
    "location",
    "id",
    "rssi",
    "temp",
    "humidity",
    "light",
    "co2_ppm",
    "voc_index",
];

/// CSV writer whose header is derived from the first record.
///
/// The first `write` locks the field set: a header row is emitted with the
/// fields present on that record, and later records render missing fields
/// as empty cells while fields outside the locked set are dropped.
pub struct CsvSink {
    out: Box<dyn Write + Send>,
    fields: Option<Vec<&'static str>>,
}

impl CsvSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        CsvSink { out, fields: None }
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
    }
}

impl Sink for CsvSink {
    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let value = serde_json::to_value(reading)
            .map_err(|e| SinkError::Write(format!("serialize reading: {e}")))?;
        let map = value.as_object().expect("a reading serializes to an object");

        if self.fields.is_none() {
            let fields: Vec<&'static str> = FIELD_ORDER
                .into_iter()
                .filter(|f| map.contains_key(*f))
                .collect();
            writeln!(self.out, "{}", fields.join(","))?;
            self.fields = Some(fields);
        }
        let fields = self.fields.as_ref().expect("locked by the first write");

        let row: Vec<String> = fields.iter().map(|f| cell(map.get(*f))).collect();
        writeln!(self.out, "{}", row.join(","))?;
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
    fn test_header_from_first_record() {
        let buf = SharedBuf::default();
        let mut sink = CsvSink::new(Box::new(buf.clone()));
        sink.open().unwrap();

        let mut reading = base_reading();
        reading.light = Some(30);
        sink.write(&reading).unwrap();
        sink.close().unwrap();

        let out = buf.contents();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time,location,id,rssi,temp,humidity,light"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1000000000,living room,hub2,-60,2.5,44,30"
        );
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let buf = SharedBuf::default();
        let mut sink = CsvSink::new(Box::new(buf.clone()));
        sink.open().unwrap();

        let mut first = base_reading();
        first.light = Some(30);
        sink.write(&first).unwrap();

        // Second record has no light; the locked field set still applies.
        sink.write(&base_reading()).unwrap();
        sink.close().unwrap();

        let out = buf.contents();
        let last = out.lines().last().unwrap();
        assert_eq!(last, "1000000000,living room,hub2,-60,2.5,44,");
    }

    #[test]
    fn test_field_set_locked_after_first_write() {
        let buf = SharedBuf::default();
        let mut sink = CsvSink::new(Box::new(buf.clone()));
        sink.open().unwrap();

        sink.write(&base_reading()).unwrap();

        // Light first appears on the second record, after the lock: dropped.
        let mut second = base_reading();
        second.light = Some(30);
        sink.write(&second).unwrap();
        sink.close().unwrap();

        let out = buf.contents();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), "time,location,id,rssi,temp,humidity");
        assert_eq!(
            lines.next().unwrap(),
            "1000000000,living room,hub2,-60,2.5,44"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1000000000,living room,hub2,-60,2.5,44"
        );
    }

    #[test]
    fn test_single_header_for_many_records() {
        let buf = SharedBuf::default();
        let mut sink = CsvSink::new(Box::new(buf.clone()));
        sink.open().unwrap();
        for _ in 0..3 {
            sink.write(&base_reading()).unwrap();
        }
        sink.close().unwrap();

        let out = buf.contents();
        assert_eq!(out.lines().count(), 4);
        assert_eq!(out.matches("time,").count(), 1);
    }
}
