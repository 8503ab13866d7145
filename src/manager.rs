//! Top-level facade tying scanning and the session together.
//!
//! [`SensorManager`] owns one [`BleScanner`] and one [`Session`]: it
//! discovers compatible sensors, connects the session to a chosen
//! candidate, and forwards adapter link-loss events for the connected
//! peer into the session.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::ble::scanner::{AdvertisedDevice, BleScanner, ScannerEvent};
use crate::ble::transport::BleTransport;
use crate::error::{Error, Result};
use crate::poller::PollingConfig;
use crate::session::{Session, SessionSnapshot};

/// Central manager for discovering and talking to one Omron sensor.
pub struct SensorManager {
    /// BLE scanner.
    scanner: Arc<BleScanner>,
    /// The single sensor session.
    session: Arc<Session>,
    /// Address of the currently targeted sensor, if any.
    connected_address: Arc<RwLock<Option<String>>>,
    /// Background task forwarding link-loss events to the session.
    link_watch: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl SensorManager {
    /// Create a new manager with default polling intervals.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Self::with_config(PollingConfig::default()).await
    }

    /// Create a new manager with specific polling intervals.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn with_config(config: PollingConfig) -> Result<Self> {
        let scanner = Arc::new(BleScanner::new().await?);
        let session = Arc::new(Session::with_config(config));
        let connected_address = Arc::new(RwLock::new(None));

        let manager = Self {
            scanner,
            session,
            connected_address,
            link_watch: RwLock::new(None),
        };
        manager.spawn_link_watch();

        Ok(manager)
    }

    /// Start scanning for sensors. Clears any previous candidates.
    pub async fn start_scan(&self) -> Result<()> {
        self.scanner.start_scan().await
    }

    /// Stop scanning for sensors.
    pub async fn stop_scan(&self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    /// Check if scanning is active.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Discovered candidates, sorted by descending signal strength.
    pub fn candidates(&self) -> Vec<AdvertisedDevice> {
        self.scanner.candidates()
    }

    /// Subscribe to scanner events.
    pub fn subscribe_scanner(&self) -> broadcast::Receiver<ScannerEvent> {
        self.scanner.subscribe()
    }

    /// Connect the session to a discovered candidate.
    ///
    /// Returns immediately; progress is reported through the session
    /// snapshot. Connecting while another device is active tears the
    /// previous link down first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the address is not a known
    /// candidate.
    pub fn connect(&self, address: &str) -> Result<()> {
        let peripheral = self
            .scanner
            .peripheral(address)
            .ok_or_else(|| Error::DeviceNotFound {
                address: address.to_string(),
            })?;

        info!("Connecting to sensor {}", address);

        *self.connected_address.write() = Some(address.to_string());

        let transport = Arc::new(BleTransport::new(peripheral, address.to_string()));
        self.session.connect(transport);

        Ok(())
    }

    /// Disconnect the session. Resolves once teardown has happened.
    pub async fn disconnect(&self) {
        *self.connected_address.write() = None;
        self.session.disconnect().await;
    }

    /// Re-read both telemetry characteristics and the signal strength
    /// now, outside the polling cadence.
    pub fn refresh(&self) {
        self.session.refresh();
    }

    /// The current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Subscribe to session snapshot updates.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.session.subscribe()
    }

    /// Number of malformed telemetry payloads dropped so far.
    pub fn decode_failures(&self) -> u64 {
        self.session.decode_failures()
    }

    /// Forward adapter link-loss events for the connected peer into
    /// the session as a clean link-down.
    fn spawn_link_watch(&self) {
        let mut rx = self.scanner.subscribe();
        let session = self.session.clone();
        let connected_address = self.connected_address.clone();

        let handle = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                Self::handle_scanner_event(event, &connected_address, &session);
            }
        });

        *self.link_watch.write() = Some(handle);
    }

    fn handle_scanner_event(
        event: ScannerEvent,
        connected_address: &RwLock<Option<String>>,
        session: &Session,
    ) {
        if let ScannerEvent::DeviceDisconnected(address) = event {
            let matches = connected_address
                .read()
                .as_deref()
                .is_some_and(|connected| connected == address);

            if matches {
                debug!("Connected sensor {} dropped the link", address);
                connected_address.write().take();
                session.notify_link_down(None);
            }
        }
    }
}

impl Drop for SensorManager {
    fn drop(&mut self) {
        if let Some(handle) = self.link_watch.write().take() {
            handle.abort();
        }
    }
}
