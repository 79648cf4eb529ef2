//! `switchbot-listener` library.
//!
//! SwitchBot meters openly broadcast their readings in BLE advertisement
//! manufacturer data. This crate decodes those broadcasts, suppresses
//! unchanged repeats and fans new readings out to pluggable sinks (console
//! formats, MQTT, InfluxDB line protocol).
//!
//! The binaries (`src/main.rs`, `src/bin/relay.rs`) are responsible for CLI
//! parsing and process exit codes. The core logic lives in [`crate::app`]
//! and [`crate::relay`] where it can be tested deterministically with
//! injected sources, sinks and output streams.

pub mod app;
pub mod change;
pub mod device;
pub mod mac_address;
pub mod meter;
pub mod reading;
pub mod relay;
pub mod scanner;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use app::{AdvertisementSource, Options, RealSource, RunError, run_with_io};
pub use change::ChangeDetector;
pub use device::{DeviceKind, DeviceProfile, DeviceRegistry, load_registry};
pub use mac_address::MacAddress;
pub use meter::{DecodeError, MeterValues, decode};
pub use reading::Reading;
pub use scanner::{Advertisement, ScanError};
pub use sink::{OutputFormat, Sink, SinkError};
