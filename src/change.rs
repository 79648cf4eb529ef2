//! Per-device change detection.
//!
//! The meters broadcast every few seconds whether or not anything changed,
//! so the dispatch loop remembers the last emitted values per device and
//! suppresses exact repeats. Comparison is exact: the decoder is
//! deterministic, so unchanged bytes produce bit-identical values and no
//! epsilon is needed.

use crate::mac_address::MacAddress;
use crate::meter::MeterValues;
use std::collections::HashMap;

/// Decides whether a decoded observation is worth emitting.
///
/// Owned by the dispatch loop, reset on restart. Independent loops (tests,
/// multiple instances in one process) each carry their own detector.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    /// Emit every observation regardless of change. Downstream consumers
    /// that want a steady heartbeat set this instead of change-only events.
    all_readings: bool,
    /// Last emitted values per device.
    last_seen: HashMap<MacAddress, MeterValues>,
}

impl ChangeDetector {
    pub fn new(all_readings: bool) -> Self {
        ChangeDetector {
            all_readings,
            last_seen: HashMap::new(),
        }
    }

    /// Check whether `values` should be emitted for `mac`.
    ///
    /// The first observation for a device is always emitted. Whenever the
    /// decision is emit (including forced emits in all-readings mode) the
    /// stored values are replaced, so change detection stays consistent if
    /// the mode is ever toggled between runs.
    pub fn should_emit(&mut self, mac: MacAddress, values: &MeterValues) -> bool {
        let emit = self.all_readings || self.last_seen.get(&mac) != Some(values);
        if emit {
            self.last_seen.insert(mac, values.clone());
        }
        emit
    }
}
