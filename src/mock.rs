//! Mock transport implementation for testing.
//!
//! Provides a scriptable [`SensorTransport`] so the session state
//! machine can be exercised without BLE hardware: per-operation
//! failure injection, adjustable payloads and RSSI, simulated read
//! latency, and counters for every read issued.

use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ble::transport::SensorTransport;
use crate::error::{Error, Result};

/// A scriptable in-memory sensor transport.
pub struct MockTransport {
    address: String,
    connected: AtomicBool,
    resolved: AtomicBool,
    fail_connect: AtomicBool,
    fail_resolve: AtomicBool,
    fail_reads: AtomicBool,
    deny_permission: AtomicBool,
    latest_data: Mutex<Vec<u8>>,
    latest_page: Mutex<Vec<u8>>,
    rssi: AtomicI16,
    /// Simulated latency applied to every read, in milliseconds.
    read_latency_ms: AtomicU64,
    data_reads: AtomicU32,
    page_reads: AtomicU32,
    rssi_reads: AtomicU32,
    disconnects: AtomicU32,
}

impl MockTransport {
    /// Create a mock transport preloaded with valid telemetry payloads.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            connected: AtomicBool::new(false),
            resolved: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            deny_permission: AtomicBool::new(false),
            latest_data: Mutex::new(Self::default_latest_data()),
            latest_page: Mutex::new(Self::default_latest_page()),
            rssi: AtomicI16::new(-55),
            read_latency_ms: AtomicU64::new(0),
            data_reads: AtomicU32::new(0),
            page_reads: AtomicU32::new(0),
            rssi_reads: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        }
    }

    /// A valid 19-byte "Latest data" payload (25.00 °C, 45.00 %, ...).
    pub fn default_latest_data() -> Vec<u8> {
        let mut data = vec![1u8];
        for raw in [2500i16, 4500, 320, 150, 10132, 4800, 6100, 2300] {
            data.extend_from_slice(&raw.to_le_bytes());
        }
        data.extend_from_slice(&2960u16.to_le_bytes());
        data
    }

    /// A valid 9-byte "Latest page" payload with the clock set.
    pub fn default_latest_page() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        data.extend_from_slice(&300u16.to_le_bytes());
        data.extend_from_slice(&12u16.to_le_bytes());
        data.push(3);
        data
    }

    /// Replace the "Latest data" payload returned by reads.
    pub fn set_latest_data(&self, data: Vec<u8>) {
        *self.latest_data.lock() = data;
    }

    /// Replace the "Latest page" payload returned by reads.
    pub fn set_latest_page(&self, data: Vec<u8>) {
        *self.latest_page.lock() = data;
    }

    /// Set the RSSI value returned by link-quality samples.
    pub fn set_rssi(&self, rssi: i16) {
        self.rssi.store(rssi, Ordering::SeqCst);
    }

    /// Make `connect` fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make `resolve_characteristics` fail.
    pub fn set_fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    /// Make every read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `connect` fail with an authorization-denied error.
    pub fn set_deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    /// Apply an artificial delay to every read.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of "Latest data" reads issued.
    pub fn data_reads(&self) -> u32 {
        self.data_reads.load(Ordering::SeqCst)
    }

    /// Number of "Latest page" reads issued.
    pub fn page_reads(&self) -> u32 {
        self.page_reads.load(Ordering::SeqCst)
    }

    /// Number of RSSI samples issued.
    pub fn rssi_reads(&self) -> u32 {
        self.rssi_reads.load(Ordering::SeqCst)
    }

    /// Number of disconnects issued.
    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Whether the transport link is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.read_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }

    fn check_readable(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) || !self.resolved.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Internal("mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SensorTransport for MockTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(Error::PermissionDenied {
                operation: "connect".to_string(),
            });
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed {
                reason: "mock connect failure".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resolve_characteristics(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(Error::ServiceNotFound {
                uuid: crate::ble::uuids::SENSOR_SERVICE_UUID.to_string(),
            });
        }
        self.resolved.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_latest_data(&self) -> Result<Vec<u8>> {
        self.simulate_latency().await;
        self.check_readable()?;
        self.data_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest_data.lock().clone())
    }

    async fn read_latest_page(&self) -> Result<Vec<u8>> {
        self.simulate_latency().await;
        self.check_readable()?;
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest_page.lock().clone())
    }

    async fn read_rssi(&self) -> Result<i16> {
        self.simulate_latency().await;
        self.check_readable()?;
        self.rssi_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rssi.load(Ordering::SeqCst))
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.resolved.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LatestMeasurement, LatestPageInfo};

    #[test]
    fn test_default_payloads_decode() {
        let m = LatestMeasurement::decode(&MockTransport::default_latest_data()).unwrap();
        assert_eq!(m.temperature_c, 25.0);

        let p = LatestPageInfo::decode(&MockTransport::default_latest_page()).unwrap();
        assert!(p.memory_on);
    }

    #[tokio::test]
    async fn test_reads_require_connection() {
        let mock = MockTransport::new("MOCK-1");
        assert!(mock.read_latest_data().await.is_err());

        mock.connect().await.unwrap();
        mock.resolve_characteristics().await.unwrap();
        assert!(mock.read_latest_data().await.is_ok());
        assert_eq!(mock.data_reads(), 1);
    }
}
