//! Periodic polling of a connected sensor.
//!
//! Once a session reaches `Connected`, two independent timers run: one
//! requesting the telemetry double-read (both characteristics), one
//! requesting an RSSI sample. Timers never touch the transport
//! directly; each tick is enqueued as a session event carrying the
//! generation it was started under, so a tick that races cancellation
//! is discarded by the session's generation guard.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::session::SessionEvent;

/// Polling intervals for an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Interval between telemetry double-reads.
    pub telemetry_interval: Duration,
    /// Interval between RSSI samples.
    pub rssi_interval: Duration,
}

impl PollingConfig {
    /// Default interval for both timers (60 seconds).
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            telemetry_interval: Self::DEFAULT_INTERVAL,
            rssi_interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Owns the two periodic timer tasks for one session.
///
/// `stop` aborts both tasks synchronously; no timer outlives its
/// session.
pub(crate) struct PollingScheduler {
    telemetry_handle: Option<tokio::task::JoinHandle<()>>,
    rssi_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PollingScheduler {
    pub(crate) fn new() -> Self {
        Self {
            telemetry_handle: None,
            rssi_handle: None,
        }
    }

    /// Start both timers, replacing any previous ones.
    ///
    /// The first tick of each timer fires one full interval after
    /// start; the immediate post-connect reads are issued by the
    /// session itself.
    pub(crate) fn start(
        &mut self,
        config: &PollingConfig,
        generation: u64,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        self.stop();

        debug!(
            "Starting polling timers (telemetry {:?}, rssi {:?})",
            config.telemetry_interval, config.rssi_interval
        );

        let tx = event_tx.clone();
        let period = config.telemetry_interval;
        self.telemetry_handle = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                timer.tick().await;
                if tx.send(SessionEvent::TelemetryTick { generation }).is_err() {
                    break;
                }
            }
        }));

        let tx = event_tx;
        let period = config.rssi_interval;
        self.rssi_handle = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                timer.tick().await;
                if tx.send(SessionEvent::RssiTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Cancel both timers. Idempotent.
    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.telemetry_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.rssi_handle.take() {
            handle.abort();
        }
    }

    /// Whether the timers are currently running.
    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.telemetry_handle.is_some() || self.rssi_handle.is_some()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
