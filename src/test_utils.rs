use crate::device::{DeviceKind, DeviceProfile, DeviceRegistry};
use crate::mac_address::MacAddress;
use crate::reading::Reading;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// A stable sensor MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A stable hub MAC address for unit tests.
pub const HUB_MAC: MacAddress = MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// Build a minimal sensor-layout payload (temp at 8/9, humidity at 10).
pub fn sensor_payload(temp_low: u8, temp_high: u8, humidity: u8) -> Vec<u8> {
    let mut payload = vec![0u8; 11];
    payload[8] = temp_low;
    payload[9] = temp_high;
    payload[10] = humidity;
    payload
}

/// Build a minimal hub-layout payload (light at 12, temp at 13/14,
/// humidity at 15).
pub fn hub_payload(temp_low: u8, temp_high: u8, humidity: u8, light: u8) -> Vec<u8> {
    let mut payload = vec![0u8; 16];
    payload[12] = light;
    payload[13] = temp_low;
    payload[14] = temp_high;
    payload[15] = humidity;
    payload
}

/// Registry with one sensor ([`TEST_MAC`]) and one hub ([`HUB_MAC`]).
pub fn test_registry() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.insert(
        TEST_MAC,
        DeviceProfile {
            kind: DeviceKind::Sensor,
            location: "green house".into(),
            id: "gh-01".into(),
        },
    );
    registry.insert(
        HUB_MAC,
        DeviceProfile {
            kind: DeviceKind::Hub,
            location: "living room".into(),
            id: "hub2".into(),
        },
    );
    registry
}

/// A fully populated sensor reading with a fixed timestamp.
///
/// Tests override just the fields they care about.
pub fn base_reading() -> Reading {
    Reading {
        time: Some(1_000_000_000),
        location: "living room".into(),
        id: "hub2".into(),
        rssi: Some(-60),
        temp: Some(2.5),
        humidity: Some(44),
        light: None,
        co2_ppm: None,
        voc_index: None,
    }
}

/// Cloneable in-memory writer so tests can hand a sink its output stream
/// and still read it back afterwards.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
