//! BLE layer: identifiers, scanning, and the GATT transport.

pub mod scanner;
pub mod transport;
pub mod uuids;

pub use scanner::{AdvertisedDevice, BleScanner, ScannerEvent};
pub use transport::{BleTransport, SensorTransport};
