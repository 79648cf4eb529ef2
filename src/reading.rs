//! The canonical reading record shared by every sink and the relay.

use crate::device::DeviceProfile;
use crate::meter::MeterValues;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One emitted observation.
///
/// Field names double as the JSON wire format, so a capture process run with
/// `-o json` pipes straight into the relay. Absent optional fields are
/// omitted from JSON entirely (never `null`); `location` and `id` are the
/// only required fields, which lets the relay accept partial records from
/// other producers. `co2_ppm` and `voc_index` are never produced by the
/// meter decoder but are forwarded when present on relay input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the Unix epoch, stamped at emit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Human-readable placement from the device registry.
    pub location: String,
    /// Short display id from the device registry.
    pub id: String,
    /// Received signal strength in dBm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
    /// Temperature in Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    /// Relative humidity in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    /// Ambient light level, hub devices only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<u8>,
    /// CO2 concentration in ppm (relay passthrough only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_ppm: Option<u64>,
    /// VOC index (relay passthrough only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voc_index: Option<f64>,
}

impl Reading {
    /// Build the record the dispatch loop emits for one decoded observation.
    pub fn from_observation(profile: &DeviceProfile, rssi: i16, values: &MeterValues) -> Self {
        Reading {
            time: Some(epoch_seconds()),
            location: profile.location.clone(),
            id: profile.id.clone(),
            rssi: Some(rssi),
            temp: Some(values.temperature),
            humidity: Some(values.humidity),
            light: values.light,
            co2_ppm: None,
            voc_index: None,
        }
    }
}

/// Current wall-clock time as Unix seconds.
pub fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
