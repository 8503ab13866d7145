//! GATT transport abstraction.
//!
//! The session state machine talks to the sensor exclusively through
//! the [`SensorTransport`] trait, so it can be driven by a real
//! btleplug peripheral or by a mock in tests.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::ble::uuids::{
    LATEST_DATA_CHARACTERISTIC_UUID, LATEST_PAGE_CHARACTERISTIC_UUID, SENSOR_SERVICE_UUID,
};
use crate::error::{Error, Result};

/// Async operations the session needs from a GATT-like link.
///
/// Every method may fail with [`Error::PermissionDenied`] when the
/// platform refuses the operation; the session maps such failures into
/// its `Error` connection state rather than propagating them.
#[async_trait]
pub trait SensorTransport: Send + Sync {
    /// The stable address of the peer, used for logging and identity.
    fn address(&self) -> &str;

    /// Establish the transport-level link.
    async fn connect(&self) -> Result<()>;

    /// Discover services and locate both telemetry characteristics.
    ///
    /// Must be called after [`connect`](Self::connect) succeeds and
    /// before any read.
    async fn resolve_characteristics(&self) -> Result<()>;

    /// Read the raw "Latest data" payload (characteristic 0x3001).
    async fn read_latest_data(&self) -> Result<Vec<u8>>;

    /// Read the raw "Latest page" payload (characteristic 0x3002).
    async fn read_latest_page(&self) -> Result<Vec<u8>>;

    /// Sample the link quality in dBm.
    async fn read_rssi(&self) -> Result<i16>;

    /// Release the link. Best-effort; never fails.
    async fn disconnect(&self);
}

/// Resolved characteristic handles for the Omron sensor service.
struct ResolvedCharacteristics {
    latest_data: Characteristic,
    latest_page: Characteristic,
}

/// [`SensorTransport`] implementation over a btleplug peripheral.
pub struct BleTransport {
    peripheral: Peripheral,
    address: String,
    resolved: RwLock<Option<ResolvedCharacteristics>>,
}

impl BleTransport {
    /// Wrap a peripheral discovered by the scanner.
    pub fn new(peripheral: Peripheral, address: String) -> Self {
        Self {
            peripheral,
            address,
            resolved: RwLock::new(None),
        }
    }

    fn characteristic(&self, latest_page: bool) -> Result<Characteristic> {
        let resolved = self.resolved.read();
        let resolved = resolved.as_ref().ok_or(Error::NotConnected)?;
        Ok(if latest_page {
            resolved.latest_page.clone()
        } else {
            resolved.latest_data.clone()
        })
    }

    fn map_ble(e: btleplug::Error, operation: &str) -> Error {
        match e {
            btleplug::Error::PermissionDenied => Error::PermissionDenied {
                operation: operation.to_string(),
            },
            other => Error::Bluetooth(other),
        }
    }
}

#[async_trait]
impl SensorTransport for BleTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        self.peripheral
            .connect()
            .await
            .map_err(|e| Self::map_ble(e, "connect"))
    }

    async fn resolve_characteristics(&self) -> Result<()> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| Self::map_ble(e, "discover services"))?;

        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == SENSOR_SERVICE_UUID)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: SENSOR_SERVICE_UUID.to_string(),
            })?;

        let find = |uuid: uuid::Uuid| {
            service
                .characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: uuid.to_string(),
                })
        };

        let latest_data = find(LATEST_DATA_CHARACTERISTIC_UUID)?;
        let latest_page = find(LATEST_PAGE_CHARACTERISTIC_UUID)?;

        debug!("Resolved sensor service characteristics on {}", self.address);

        *self.resolved.write() = Some(ResolvedCharacteristics {
            latest_data,
            latest_page,
        });

        Ok(())
    }

    async fn read_latest_data(&self) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(false)?;
        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(|e| Self::map_ble(e, "read latest data"))?;
        trace!("Read {} bytes of latest data from {}", data.len(), self.address);
        Ok(data)
    }

    async fn read_latest_page(&self) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(true)?;
        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(|e| Self::map_ble(e, "read latest page"))?;
        trace!("Read {} bytes of latest page from {}", data.len(), self.address);
        Ok(data)
    }

    async fn read_rssi(&self) -> Result<i16> {
        // btleplug reports RSSI through peripheral properties rather
        // than a dedicated remote-RSSI read.
        let properties = self
            .peripheral
            .properties()
            .await
            .map_err(|e| Self::map_ble(e, "read rssi"))?;

        properties
            .and_then(|p| p.rssi)
            .ok_or(Error::NotConnected)
    }

    async fn disconnect(&self) {
        *self.resolved.write() = None;

        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Error disconnecting from {}: {}", self.address, e);
        }
    }
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("address", &self.address)
            .field("resolved", &self.resolved.read().is_some())
            .finish()
    }
}
