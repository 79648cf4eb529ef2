//! Decoder for SwitchBot meter advertisement payloads.
//!
//! The meters broadcast their current readings in the manufacturer data of
//! every advertisement, so no connection is ever made. Two layouts exist:
//! the Hub 2 packs an extra light-level byte and shifts the other fields,
//! plain meters don't. In both, the first 6 payload bytes repeat the device
//! MAC and are skipped.
//!
//! See <https://github.com/OpenWonderLabs/SwitchBotAPI-BLE/blob/latest/devicetypes/meter.md>

use crate::device::DeviceKind;
use thiserror::Error;

/// Byte offsets per layout: (temp low, temp high, humidity).
const SENSOR_OFFSETS: (usize, usize, usize) = (8, 9, 10);
const HUB_OFFSETS: (usize, usize, usize) = (13, 14, 15);

/// Light level byte in the Hub 2 layout.
const HUB_LIGHT_OFFSET: usize = 12;

/// Errors returned when a payload cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload too short for the claimed device kind. The advertisement is
    /// dropped; nothing is emitted and the cache is left untouched.
    #[error("malformed {kind:?} payload: need {needed} bytes, got {got}")]
    MalformedPayload {
        kind: DeviceKind,
        needed: usize,
        got: usize,
    },
}

/// Physical values decoded from one advertisement.
///
/// `light` is `Some` for [`DeviceKind::Hub`] and `None` for
/// [`DeviceKind::Sensor`]. Absent is not zero: a hub reporting a dark room
/// yields `Some(0)`, and the two must never compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterValues {
    /// Temperature in Celsius, 0.1 degree resolution.
    pub temperature: f64,
    /// Relative humidity in percent (0-127).
    pub humidity: u8,
    /// Ambient light level (0-127), hub layout only.
    pub light: Option<u8>,
}

/// Low 7 bits; bit 7 is a status flag and must not leak into the value.
fn humidity(b: u8) -> u8 {
    b & 0x7F
}

/// Temperature is split across two bytes: tenths of a degree in the low
/// nibble of the first, whole degrees in the low 7 bits of the second, with
/// bit 7 of the second selecting the sign. The sign multiplies only the
/// whole-degree term; the tenths are always added, so -1.5 comes over the
/// air as low=0x05, high=0x02. Reproduced as the firmware encodes it.
fn temperature(low: u8, high: u8) -> f64 {
    let sign = if (high & 0x80) > 0 { 1.0 } else { -1.0 };
    f64::from(low & 0x0F) * 0.1 + f64::from(high & 0x7F) * sign
}

/// Low 7 bits, same flag masking as humidity.
fn light(b: u8) -> u8 {
    b & 0x7F
}

/// Decode a manufacturer-data payload according to the device kind.
///
/// Pure and deterministic: the same bytes always produce the same values.
///
/// # Errors
/// [`DecodeError::MalformedPayload`] if the payload is shorter than the
/// highest offset the layout reads.
pub fn decode(kind: DeviceKind, payload: &[u8]) -> Result<MeterValues, DecodeError> {
    let (temp_low, temp_high, humidity_at) = match kind {
        DeviceKind::Hub => HUB_OFFSETS,
        DeviceKind::Sensor => SENSOR_OFFSETS,
    };

    let needed = humidity_at + 1;
    if payload.len() < needed {
        return Err(DecodeError::MalformedPayload {
            kind,
            needed,
            got: payload.len(),
        });
    }

    Ok(MeterValues {
        temperature: temperature(payload[temp_low], payload[temp_high]),
        humidity: humidity(payload[humidity_at]),
        light: match kind {
            DeviceKind::Hub => Some(light(payload[HUB_LIGHT_OFFSET])),
            DeviceKind::Sensor => None,
        },
    })
}
