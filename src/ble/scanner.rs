//! BLE scanning and device identity filtering.
//!
//! Watches adapter advertisements, keeps a candidate list of
//! compatible Omron sensors sorted by signal strength, and reports
//! link-loss events for connected peers.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::ble::uuids::{is_sensor_service, name_matches};
use crate::error::{Error, Result};

/// One observed advertisement from a compatible sensor.
///
/// Superseded, not merged, by a later advertisement from the same
/// address; the device handle itself is kept internally by the
/// scanner, keyed by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    /// Resolved display name.
    pub name: String,
    /// Stable address; the unique key of a candidate.
    pub address: String,
    /// Signal strength of the most recent advertisement, in dBm.
    pub rssi: Option<i16>,
}

/// Event emitted by the scanner.
#[derive(Debug, Clone)]
pub enum ScannerEvent {
    /// A candidate was added or its entry replaced.
    CandidateUpdated(AdvertisedDevice),
    /// The adapter reported a peer disconnection.
    DeviceDisconnected(String),
    /// Scanning failed; the candidate list has been cleared.
    ScanFailed(String),
}

/// Decide whether an observed advertisement belongs to a supported
/// sensor: known name prefix, or the Omron sensor service advertised.
pub fn is_supported_advertisement(name: &str, services: &[Uuid]) -> bool {
    name_matches(name) || services.iter().any(is_sensor_service)
}

/// Resolve the display name for an accepted advertisement.
///
/// The "Unknown" fallback is unreachable given the inclusion rule but
/// must not crash.
pub fn display_name(name: &str, service_matched: bool) -> String {
    if !name.is_empty() {
        name.to_string()
    } else if service_matched {
        "Omron Sensor".to_string()
    } else {
        "Unknown".to_string()
    }
}

/// Replace any entry with the same address, then re-sort by descending
/// signal strength. The sort is stable, so equal-strength entries keep
/// their order across repeated identical updates.
fn upsert_candidate(candidates: &mut Vec<AdvertisedDevice>, device: AdvertisedDevice) {
    candidates.retain(|c| c.address != device.address);
    candidates.push(device);
    candidates.sort_by_key(|c| std::cmp::Reverse(c.rssi.unwrap_or(i16::MIN)));
}

/// BLE scanner for discovering Omron environment sensors.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Accepted candidates, sorted by descending signal strength.
    candidates: Arc<RwLock<Vec<AdvertisedDevice>>>,
    /// Device handles for accepted candidates, by address.
    peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
    /// Channel for scanner events.
    event_tx: broadcast::Sender<ScannerEvent>,
    /// Handle to the scanning task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            adapter,
            is_scanning: Arc::new(RwLock::new(false)),
            candidates: Arc::new(RwLock::new(Vec::new())),
            peripherals: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            scan_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start scanning for sensors. Clears any previous candidates.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started; the candidate
    /// list is left empty in that case.
    pub async fn start_scan(&self) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan for Omron sensors");

        self.candidates.write().clear();
        self.peripherals.write().clear();

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let is_scanning = self.is_scanning.clone();
        let candidates = self.candidates.clone();
        let peripherals = self.peripherals.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    // Fail-visible: drop all candidates rather than
                    // keep a silently stale list.
                    candidates.write().clear();
                    peripherals.write().clear();
                    let _ = event_tx.send(ScannerEvent::ScanFailed(e.to_string()));
                    return;
                }
            };

            while *is_scanning.read() {
                tokio::select! {
                    Some(event) = events.next() => {
                        Self::handle_event(
                            event,
                            &adapter,
                            &candidates,
                            &peripherals,
                            &event_tx,
                        ).await;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        if !*is_scanning.read() {
                            break;
                        }
                    }
                }
            }

            debug!("Scan event loop ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop scanning for sensors.
    pub async fn stop_scan(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        if let Some(handle) = self.scan_handle.write().take() {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// The current candidate list, sorted by descending signal
    /// strength.
    pub fn candidates(&self) -> Vec<AdvertisedDevice> {
        self.candidates.read().clone()
    }

    /// Look up the device handle for a candidate address.
    pub fn peripheral(&self, address: &str) -> Option<Peripheral> {
        self.peripherals.read().get(address).cloned()
    }

    /// Subscribe to scanner events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.event_tx.subscribe()
    }

    /// Handle a BLE central event.
    async fn handle_event(
        event: CentralEvent,
        adapter: &Adapter,
        candidates: &Arc<RwLock<Vec<AdvertisedDevice>>>,
        peripherals: &Arc<RwLock<HashMap<String, Peripheral>>>,
        event_tx: &broadcast::Sender<ScannerEvent>,
    ) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                trace!("Device advertisement: {:?}", id);
                Self::process_peripheral(adapter, id, candidates, peripherals, event_tx).await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                debug!("Device disconnected: {:?}", id);
                let _ = event_tx.send(ScannerEvent::DeviceDisconnected(id.to_string()));
            }
            CentralEvent::DeviceConnected(id) => {
                debug!("Device connected: {:?}", id);
            }
            _ => {}
        }
    }

    /// Process a discovered peripheral, applying the identity filter.
    async fn process_peripheral(
        adapter: &Adapter,
        id: btleplug::platform::PeripheralId,
        candidates: &Arc<RwLock<Vec<AdvertisedDevice>>>,
        peripherals: &Arc<RwLock<HashMap<String, Peripheral>>>,
        event_tx: &broadcast::Sender<ScannerEvent>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        let name = properties.local_name.unwrap_or_default();
        let service_matched = properties.services.iter().any(is_sensor_service);

        if !is_supported_advertisement(&name, &properties.services) {
            return;
        }

        let address = id.to_string();
        let device = AdvertisedDevice {
            name: display_name(&name, service_matched),
            address: address.clone(),
            rssi: properties.rssi,
        };

        debug!(
            "Sensor candidate {} ({}) at {:?} dBm",
            device.name, device.address, device.rssi
        );

        peripherals.write().insert(address, peripheral);
        upsert_candidate(&mut candidates.write(), device.clone());

        let _ = event_tx.send(ScannerEvent::CandidateUpdated(device));
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::SENSOR_SERVICE_UUID;
    use pretty_assertions::assert_eq;

    fn device(address: &str, rssi: i16) -> AdvertisedDevice {
        AdvertisedDevice {
            name: format!("Env-{}", address),
            address: address.to_string(),
            rssi: Some(rssi),
        }
    }

    #[test]
    fn test_identity_filter() {
        // Name prefix alone is enough.
        assert!(is_supported_advertisement("IM-BL01", &[]));
        assert!(is_supported_advertisement("EnvSensor-BL01", &[]));
        assert!(is_supported_advertisement("EP-BL01", &[]));

        // Service alone is enough, regardless of name.
        assert!(is_supported_advertisement("Other", &[SENSOR_SERVICE_UUID]));
        assert!(is_supported_advertisement("", &[SENSOR_SERVICE_UUID]));

        // Neither: rejected.
        assert!(!is_supported_advertisement("Other", &[]));
        assert!(!is_supported_advertisement("", &[uuid::Uuid::from_u128(0x1234)]));
    }

    #[test]
    fn test_display_name_resolution() {
        assert_eq!(display_name("IM-BL01", false), "IM-BL01");
        assert_eq!(display_name("IM-BL01", true), "IM-BL01");
        assert_eq!(display_name("", true), "Omron Sensor");
        // Unreachable by the inclusion rule, but must not crash.
        assert_eq!(display_name("", false), "Unknown");
    }

    #[test]
    fn test_candidates_sorted_by_signal_strength() {
        let mut list = Vec::new();
        upsert_candidate(&mut list, device("AA", -80));
        upsert_candidate(&mut list, device("BB", -40));
        upsert_candidate(&mut list, device("CC", -60));

        let addresses: Vec<_> = list.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(addresses, vec!["BB", "CC", "AA"]);
    }

    #[test]
    fn test_readvertisement_replaces_entry() {
        let mut list = Vec::new();
        upsert_candidate(&mut list, device("AA", -80));
        upsert_candidate(&mut list, device("BB", -40));

        // Same address again: replaced, not duplicated, and re-sorted
        // with the most recent rssi.
        upsert_candidate(&mut list, device("AA", -30));

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "AA");
        assert_eq!(list[0].rssi, Some(-30));
    }

    #[test]
    fn test_missing_rssi_sorts_last() {
        let mut list = Vec::new();
        upsert_candidate(
            &mut list,
            AdvertisedDevice {
                name: "Env-X".to_string(),
                address: "XX".to_string(),
                rssi: None,
            },
        );
        upsert_candidate(&mut list, device("AA", -90));

        assert_eq!(list[0].address, "AA");
        assert_eq!(list[1].address, "XX");
    }

    #[test]
    fn test_tie_order_stable_across_repeated_updates() {
        let mut list = Vec::new();
        upsert_candidate(&mut list, device("AA", -50));
        upsert_candidate(&mut list, device("BB", -50));
        let first: Vec<_> = list.iter().map(|c| c.address.clone()).collect();

        // Re-advertising the same entries with unchanged rssi must not
        // reshuffle the tie.
        upsert_candidate(&mut list, device("BB", -50));
        let second: Vec<_> = list.iter().map(|c| c.address.clone()).collect();
        assert_eq!(first, second);
    }
}
