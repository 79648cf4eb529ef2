//! Static device metadata loaded from `devices.yaml`.
//!
//! The registry maps MAC addresses to a location, a short display id and the
//! device kind. Only addresses present here are decoded; everything else on
//! the air is ignored.

use crate::mac_address::MacAddress;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// A type alias for the address-to-profile mapping.
pub type DeviceRegistry = HashMap<MacAddress, DeviceProfile>;

/// Payload layout variant. Hubs carry a light-level byte, plain meters don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Hub,
    Sensor,
}

/// Metadata for one known device.
///
/// ```yaml
/// "DE:AD:BE:EF:00:01":
///   type: sensor
///   location: green house
///   id: gh-01
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceProfile {
    /// Payload layout to decode with.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Human-readable placement, e.g. "living room".
    pub location: String,
    /// Short display id, e.g. "hub2".
    pub id: String,
}

/// Errors returned while loading the device registry.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("cannot read device file: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed YAML or an unrecognized profile type. Startup must not
    /// proceed with a registry it only half understands.
    #[error("cannot parse device file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Load the registry from a YAML file, once, at startup.
pub fn load_registry(path: &Path) -> Result<DeviceRegistry, DeviceError> {
    let raw = std::fs::read_to_string(path)?;
    parse_registry(&raw)
}

/// Parse registry YAML. Split from [`load_registry`] so tests skip the
/// filesystem.
pub fn parse_registry(raw: &str) -> Result<DeviceRegistry, DeviceError> {
    Ok(serde_yaml::from_str(raw)?)
}
