//! BlueZ D-Bus backend.
//!
//! Uses the `bluer` crate to talk to the bluetoothd daemon. Discovery runs
//! with duplicate-data reporting enabled so the meters' periodic broadcasts
//! keep arriving after the first one.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, ScanError};
use crate::mac_address::MacAddress;
use bluer::{
    Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty, DiscoveryFilter,
    DiscoveryTransport, Session,
};
use futures::StreamExt;
use std::collections::HashSet;
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start scanning for LE advertisements via BlueZ.
///
/// The adapter is powered on and put into LE discovery. Each discovered
/// device gets a watcher task that forwards its manufacturer-data updates
/// into the returned channel. Runs until the receiver is dropped.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let filter = DiscoveryFilter {
        transport: DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };
    adapter.set_discovery_filter(filter).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    // The spawned task owns all Bluetooth state for the lifetime of the scan.
    tokio::spawn(async move {
        let _session = session;
        let mut watched: HashSet<Address> = HashSet::new();

        let discover = match adapter.discover_devices().await {
            Ok(discover) => discover,
            Err(e) => {
                log::warn!("discovery failed: {e}");
                return;
            }
        };
        futures::pin_mut!(discover);

        while let Some(event) = discover.next().await {
            if let AdapterEvent::DeviceAdded(address) = event {
                if !watched.insert(address) {
                    continue;
                }
                if let Err(e) = watch_device(&adapter, address, tx.clone()).await {
                    log::warn!("device {address}: {e}");
                }
            }
        }
    });

    Ok(rx)
}

/// Snapshot the device's current advertisement, then follow its property
/// changes and forward every manufacturer-data update.
async fn watch_device(
    adapter: &Adapter,
    address: Address,
    tx: mpsc::Sender<Advertisement>,
) -> bluer::Result<()> {
    let device = adapter.device(address)?;
    let mac = MacAddress::from(address);
    let mut rssi = device.rssi().await?.unwrap_or(0);

    if let Some(data) = device.manufacturer_data().await? {
        let _ = tx.send(Advertisement::new(mac, data, rssi)).await;
    }

    tokio::spawn(async move {
        let events = match device.events().await {
            Ok(events) => events,
            Err(e) => {
                log::warn!("device {address}: {e}");
                return;
            }
        };
        futures::pin_mut!(events);

        while let Some(DeviceEvent::PropertyChanged(property)) = events.next().await {
            match property {
                DeviceProperty::Rssi(value) => rssi = value,
                DeviceProperty::ManufacturerData(data) => {
                    // Receiver gone means the loop is shutting down.
                    if tx.send(Advertisement::new(mac, data, rssi)).await.is_err() {
                        break;
                    }
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_to_mac_address() {
        let addr = Address([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let mac = MacAddress::from(addr);
        assert_eq!(mac, MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
    }

    #[test]
    fn test_advertisement_from_bluer_map() {
        let mut data = std::collections::HashMap::new();
        data.insert(0x0969u16, vec![0xDE, 0xAD]);
        let adv = Advertisement::new(MacAddress([0; 6]), data, -70);
        assert_eq!(adv.manufacturer_data, vec![(0x0969, vec![0xDE, 0xAD])]);
        assert_eq!(adv.rssi, -70);
    }
}
