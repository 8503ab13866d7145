// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # omron-envsensor-ble
//!
//! A cross-platform Rust library for communicating with Omron
//! 2JCIE-BL01 environment sensors via Bluetooth Low Energy.
//!
//! The sensor exposes its newest measurement through two GATT
//! characteristics; this library discovers compatible devices, keeps
//! one connected session alive, polls both characteristics plus the
//! link quality on a fixed cadence, and publishes everything as one
//! coherent snapshot.
//!
//! ## Features
//!
//! - **Sensor Discovery**: Find nearby 2JCIE-BL01 sensors by name
//!   prefix or advertised service, ranked by signal strength
//! - **Live Telemetry**: Temperature, humidity, light, UV, pressure,
//!   sound level, discomfort index, heatstroke risk, battery voltage
//! - **Derived Categories**: UV, discomfort and heatstroke severity
//!   bands computed from the decoded values
//! - **Recording State**: On-sensor memory clock, page and row
//!   position
//! - **Session Snapshots**: One watchable snapshot combining telemetry,
//!   signal strength and connection state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omron_envsensor_ble::{Result, SensorManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Create the manager and start scanning
//!     let manager = SensorManager::new().await?;
//!     manager.start_scan().await?;
//!
//!     // Wait for sensors to be discovered
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!
//!     // Connect to the strongest candidate
//!     if let Some(device) = manager.candidates().first() {
//!         println!("Connecting to {} ({})", device.name, device.address);
//!         manager.connect(&device.address)?;
//!     }
//!
//!     // Watch snapshots as they arrive
//!     let mut snapshots = manager.subscribe_snapshot();
//!     while snapshots.changed().await.is_ok() {
//!         let snapshot = snapshots.borrow().clone();
//!         if let Some(m) = snapshot.latest {
//!             println!(
//!                 "{:.2} °C, {:.2} %RH, UV {} ({})",
//!                 m.temperature_c,
//!                 m.humidity_percent,
//!                 m.uv_index,
//!                 m.uv_category()
//!             );
//!         }
//!     }
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod data;
pub mod error;
pub mod manager;
pub mod mock;
pub mod poller;
pub mod session;

// Re-exports for convenience
pub use error::{Error, Result};
pub use manager::SensorManager;
pub use poller::PollingConfig;
pub use session::{ConnectionState, Session, SessionSnapshot};

// Re-export commonly used types from submodules
pub use ble::scanner::{AdvertisedDevice, BleScanner, ScannerEvent};
pub use ble::transport::{BleTransport, SensorTransport};
pub use data::{
    DecodeError, DiscomfortCategory, HeatstrokeCategory, LatestMeasurement, LatestPageInfo,
    UvCategory,
};
pub use mock::MockTransport;
