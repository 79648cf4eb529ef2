//! BLE advertisement source.
//!
//! The scanner is a thin event source: it watches for LE advertisements and
//! forwards each device's manufacturer data over a channel, untouched. All
//! decoding, filtering and delivery happens in the dispatch loop, so the
//! Bluetooth callback path never does blocking work.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::mac_address::MacAddress;
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel buffer size for advertisement events.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// One received advertisement, as delivered by the radio.
///
/// `manufacturer_data` keeps every entry of the advertisement's
/// manufacturer-data map: well-formed meter broadcasts carry exactly one,
/// and the dispatch loop treats any other count as a protocol violation
/// rather than guessing which entry to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub mac: MacAddress,
    /// (company id, payload) pairs, in ascending company-id order.
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
    /// Received signal strength in dBm, 0 when the adapter didn't report it.
    pub rssi: i16,
}

impl Advertisement {
    /// Build an event from a manufacturer-data map, ordering entries by
    /// company id so equal advertisements compare equal.
    pub fn new<I>(mac: MacAddress, manufacturer_data: I, rssi: i16) -> Self
    where
        I: IntoIterator<Item = (u16, Vec<u8>)>,
    {
        let mut manufacturer_data: Vec<(u16, Vec<u8>)> = manufacturer_data.into_iter().collect();
        manufacturer_data.sort_by_key(|(company, _)| *company);
        Advertisement {
            mac,
            manufacturer_data,
            rssi,
        }
    }
}

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("bluetooth error: {0}")]
    Bluetooth(String),
    /// Backend not available (not compiled in)
    #[allow(dead_code)]
    #[error("backend '{0}' not available (not compiled in)")]
    BackendNotAvailable(String),
}

/// Start scanning for advertisements with the compiled-in backend.
///
/// # Returns
/// A receiver of advertisement events; the channel closes when the
/// underlying session ends.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    #[cfg(feature = "bluer")]
    {
        bluer::start_scan().await
    }
    #[cfg(not(feature = "bluer"))]
    {
        Err(ScanError::BackendNotAvailable("bluer".into()))
    }
}
