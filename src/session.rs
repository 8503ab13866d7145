//! Session state machine for one sensor connection.
//!
//! A session owns at most one transport handle at a time and drives
//! the full lifecycle: connect, characteristic resolution, the
//! immediate post-connect reads, periodic polling, and teardown.
//!
//! All mutation happens on a single actor task. Platform completions,
//! timer ticks and user commands arrive as [`SessionEvent`] variants
//! over one inbox and pass through one transition function, so the
//! published snapshot can never be observed half-updated. Reads are
//! issued under a generation number; completions from a previous
//! generation (a torn-down connection) are discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::ble::transport::SensorTransport;
use crate::data::{LatestMeasurement, LatestPageInfo};
use crate::error::Result;
use crate::poller::{PollingConfig, PollingScheduler};

/// Connection lifecycle state. Exactly one variant is active at a
/// time; it is the authoritative flag for whether polling may run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Not connected. Initial and terminal resting state.
    #[default]
    Disconnected,
    /// Transport connect requested.
    Connecting,
    /// Transport link established, characteristics resolved.
    Connected,
    /// Connect failure, permission denial, or unexpected link loss.
    Error(String),
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in the error state.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// The externally observable state of a session.
///
/// Updated only by wholesale replacement through a watch channel;
/// every published value is self-consistent.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSnapshot {
    /// Most recent decoded measurement, absent until the first
    /// successful read.
    pub latest: Option<LatestMeasurement>,
    /// Most recent decoded page record.
    pub page: Option<LatestPageInfo>,
    /// Most recent RSSI sample in dBm.
    pub rssi: Option<i16>,
    /// Current connection state.
    pub connection: ConnectionState,
}

/// One event on the session's serialized timeline.
pub(crate) enum SessionEvent {
    /// User command: establish a new connection.
    Connect(Arc<dyn SensorTransport>),
    /// User command: tear down, acknowledging when done.
    Disconnect(oneshot::Sender<()>),
    /// User command: one-shot triple read.
    Refresh,
    /// Transport link established.
    LinkUp { generation: u64 },
    /// Transport connect failed before the link came up.
    ConnectFailed { generation: u64, reason: String },
    /// Service and characteristic resolution finished.
    Resolved { generation: u64 },
    /// Service and characteristic resolution failed.
    ResolveFailed { generation: u64, reason: String },
    /// Transport-reported link loss. `None` status means clean.
    LinkDown { status: Option<String> },
    /// Polling timer: telemetry double-read due.
    TelemetryTick { generation: u64 },
    /// Polling timer: RSSI sample due.
    RssiTick { generation: u64 },
    /// Completion of a "Latest data" read.
    LatestData { generation: u64, result: Result<Vec<u8>> },
    /// Completion of a "Latest page" read.
    LatestPage { generation: u64, result: Result<Vec<u8>> },
    /// Completion of an RSSI sample.
    Rssi { generation: u64, result: Result<i16> },
    /// Session handle dropped; stop the actor.
    Shutdown,
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect(_) => "Connect",
            Self::Disconnect(_) => "Disconnect",
            Self::Refresh => "Refresh",
            Self::LinkUp { .. } => "LinkUp",
            Self::ConnectFailed { .. } => "ConnectFailed",
            Self::Resolved { .. } => "Resolved",
            Self::ResolveFailed { .. } => "ResolveFailed",
            Self::LinkDown { .. } => "LinkDown",
            Self::TelemetryTick { .. } => "TelemetryTick",
            Self::RssiTick { .. } => "RssiTick",
            Self::LatestData { .. } => "LatestData",
            Self::LatestPage { .. } => "LatestPage",
            Self::Rssi { .. } => "Rssi",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Handle to one sensor session.
///
/// Cheap to share; all methods are safe to call from any state.
pub struct Session {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    decode_failures: Arc<AtomicU64>,
}

impl Session {
    /// Create a session with default polling intervals.
    pub fn new() -> Self {
        Self::with_config(PollingConfig::default())
    }

    /// Create a session with custom polling intervals.
    pub fn with_config(config: PollingConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let decode_failures = Arc::new(AtomicU64::new(0));

        let actor = SessionActor {
            event_tx: event_tx.clone(),
            snapshot_tx,
            transport: None,
            generation: 0,
            poller: PollingScheduler::new(),
            config,
            decode_failures: decode_failures.clone(),
        };

        tokio::spawn(actor.run(event_rx));

        Self {
            event_tx,
            snapshot_rx,
            decode_failures,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Number of malformed telemetry payloads dropped so far.
    ///
    /// Dropped payloads never affect the connection state; this
    /// counter is the only place they are visible.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::SeqCst)
    }

    /// Connect to a sensor, tearing down any active session first.
    ///
    /// The state machine transitions to `Connecting` and, once the
    /// link is up and characteristics are resolved, to `Connected`.
    /// Failures surface as `ConnectionState::Error` in the snapshot.
    pub fn connect(&self, transport: Arc<dyn SensorTransport>) {
        let _ = self.event_tx.send(SessionEvent::Connect(transport));
    }

    /// Tear down the session unconditionally.
    ///
    /// Cancels polling, releases the transport handle and publishes
    /// `Disconnected`. Never fails; callable from any state. Returns
    /// after the teardown has been applied, so no further reads will
    /// be issued.
    pub async fn disconnect(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.event_tx.send(SessionEvent::Disconnect(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Manually trigger the one-shot triple read (latest data, latest
    /// page, RSSI). A no-op when no transport handle is held.
    pub fn refresh(&self) {
        let _ = self.event_tx.send(SessionEvent::Refresh);
    }

    /// Report a transport-level link loss into the state machine.
    ///
    /// A `None` status is a clean disconnect; `Some` carries the
    /// diagnostic text of a non-success status.
    pub fn notify_link_down(&self, status: Option<String>) {
        let _ = self.event_tx.send(SessionEvent::LinkDown { status });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.event_tx.send(SessionEvent::Shutdown);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("snapshot", &*self.snapshot_rx.borrow())
            .finish()
    }
}

/// The single owner of the transport handle and all session state.
struct SessionActor {
    /// Sender cloned into spawned reads and timers so completions
    /// come back through the inbox.
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    transport: Option<Arc<dyn SensorTransport>>,
    /// Bumped on every teardown; completions carrying an older value
    /// belong to a dead connection and are dropped.
    generation: u64,
    poller: PollingScheduler,
    config: PollingConfig,
    decode_failures: Arc<AtomicU64>,
}

impl SessionActor {
    async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<SessionEvent>) {
        debug!("Session actor started");
        while let Some(event) = event_rx.recv().await {
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.handle_event(event);
        }
        self.teardown();
        debug!("Session actor stopped");
    }

    /// The single transition function. Synchronous on purpose: every
    /// await happens in a spawned task whose completion re-enters here.
    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connect(transport) => self.on_connect(transport),
            SessionEvent::Disconnect(ack) => {
                self.teardown();
                self.publish_reset(ConnectionState::Disconnected);
                let _ = ack.send(());
            }
            SessionEvent::Refresh => {
                if self.transport.is_some() {
                    self.spawn_telemetry_read();
                    self.spawn_rssi_read();
                }
            }
            SessionEvent::LinkUp { generation } => self.on_link_up(generation),
            SessionEvent::ConnectFailed { generation, reason } => {
                if generation == self.generation {
                    self.fail(reason);
                }
            }
            SessionEvent::Resolved { generation } => self.on_resolved(generation),
            SessionEvent::ResolveFailed { generation, reason } => {
                if generation == self.generation {
                    self.fail(reason);
                }
            }
            SessionEvent::LinkDown { status } => self.on_link_down(status),
            SessionEvent::TelemetryTick { generation } => {
                if generation == self.generation && self.transport.is_some() {
                    self.spawn_telemetry_read();
                }
            }
            SessionEvent::RssiTick { generation } => {
                if generation == self.generation && self.transport.is_some() {
                    self.spawn_rssi_read();
                }
            }
            SessionEvent::LatestData { generation, result } => {
                if generation != self.generation || self.transport.is_none() {
                    return;
                }
                match result.and_then(|bytes| Ok(LatestMeasurement::decode(&bytes)?)) {
                    Ok(measurement) => {
                        self.publish(|s| s.latest = Some(measurement));
                    }
                    Err(e) => {
                        self.decode_failures.fetch_add(1, Ordering::SeqCst);
                        warn!("Dropping latest-data payload: {}", e);
                    }
                }
            }
            SessionEvent::LatestPage { generation, result } => {
                if generation != self.generation || self.transport.is_none() {
                    return;
                }
                match result.and_then(|bytes| Ok(LatestPageInfo::decode(&bytes)?)) {
                    Ok(page) => {
                        self.publish(|s| s.page = Some(page));
                    }
                    Err(e) => {
                        self.decode_failures.fetch_add(1, Ordering::SeqCst);
                        warn!("Dropping latest-page payload: {}", e);
                    }
                }
            }
            SessionEvent::Rssi { generation, result } => {
                if generation != self.generation || self.transport.is_none() {
                    return;
                }
                match result {
                    Ok(rssi) => self.publish(|s| s.rssi = Some(rssi)),
                    Err(e) => debug!("Dropping failed RSSI sample: {}", e),
                }
            }
            SessionEvent::Shutdown => unreachable!("handled in run"),
        }
    }

    fn on_connect(&mut self, transport: Arc<dyn SensorTransport>) {
        // Idempotent re-entry: an active session is torn down first.
        self.teardown();
        self.publish_reset(ConnectionState::Connecting);

        info!("Connecting to sensor {}", transport.address());

        let generation = self.generation;
        self.transport = Some(transport.clone());

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match transport.connect().await {
                Ok(()) => SessionEvent::LinkUp { generation },
                Err(e) => SessionEvent::ConnectFailed {
                    generation,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    fn on_link_up(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        let transport = match &self.transport {
            Some(t) => t.clone(),
            None => return,
        };

        debug!("Link up, resolving characteristics on {}", transport.address());

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match transport.resolve_characteristics().await {
                Ok(()) => SessionEvent::Resolved { generation },
                Err(e) => SessionEvent::ResolveFailed {
                    generation,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    fn on_resolved(&mut self, generation: u64) {
        if generation != self.generation || self.transport.is_none() {
            return;
        }

        info!("Sensor session ready");
        self.publish(|s| s.connection = ConnectionState::Connected);

        // One immediate triple read, then periodic polling.
        self.spawn_telemetry_read();
        self.spawn_rssi_read();
        self.poller
            .start(&self.config, self.generation, self.event_tx.clone());
    }

    fn on_link_down(&mut self, status: Option<String>) {
        if self.transport.is_none() {
            // Stale report after teardown.
            return;
        }

        self.teardown();

        match status {
            None => {
                info!("Sensor link closed");
                self.publish(|s| s.connection = ConnectionState::Disconnected);
            }
            Some(status) => {
                warn!("Sensor link lost: {}", status);
                self.publish(|s| {
                    s.connection = ConnectionState::Error(format!("Disconnected: {}", status));
                });
            }
        }
    }

    /// Enter the error state, releasing the transport handle.
    fn fail(&mut self, reason: String) {
        warn!("Session error: {}", reason);
        self.teardown();
        self.publish(|s| s.connection = ConnectionState::Error(reason));
    }

    /// Cancel polling, release the transport handle and invalidate all
    /// in-flight completions. Does not publish.
    fn teardown(&mut self) {
        self.poller.stop();
        self.generation += 1;
        if let Some(transport) = self.transport.take() {
            tokio::spawn(async move {
                transport.disconnect().await;
            });
        }
    }

    fn spawn_telemetry_read(&self) {
        let transport = match &self.transport {
            Some(t) => t.clone(),
            None => return,
        };
        let generation = self.generation;
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = transport.read_latest_data().await;
            let _ = tx.send(SessionEvent::LatestData { generation, result });
            let result = transport.read_latest_page().await;
            let _ = tx.send(SessionEvent::LatestPage { generation, result });
        });
    }

    fn spawn_rssi_read(&self) {
        let transport = match &self.transport {
            Some(t) => t.clone(),
            None => return,
        };
        let generation = self.generation;
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = transport.read_rssi().await;
            let _ = tx.send(SessionEvent::Rssi { generation, result });
        });
    }

    /// Replace one field on a copy of the current snapshot and publish
    /// the copy wholesale.
    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        let mut next = self.snapshot_tx.borrow().clone();
        update(&mut next);
        self.snapshot_tx.send_replace(next);
    }

    /// Publish a fresh snapshot with all telemetry fields cleared.
    fn publish_reset(&self, connection: ConnectionState) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            connection,
            ..SessionSnapshot::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    fn fast_config() -> PollingConfig {
        PollingConfig {
            telemetry_interval: Duration::from_secs(3600),
            rssi_interval: Duration::from_secs(3600),
        }
    }

    /// Wait until the snapshot satisfies a predicate, or panic.
    async fn wait_for(
        session: &Session,
        what: &str,
        pred: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = session.subscribe();
        let deadline = Duration::from_secs(2);
        timeout(deadline, async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if pred(&snapshot) {
                        return snapshot.clone();
                    }
                }
                rx.changed().await.expect("session actor gone");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
    }

    #[tokio::test]
    async fn test_connect_reaches_ready_with_one_triple_read() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-A"));

        session.connect(mock.clone());

        let snapshot = wait_for(&session, "first measurement", |s| {
            s.connection.is_connected() && s.latest.is_some() && s.page.is_some() && s.rssi.is_some()
        })
        .await;

        assert_eq!(snapshot.latest.unwrap().temperature_c, 25.0);
        assert!(snapshot.page.unwrap().memory_on);
        assert_eq!(snapshot.rssi, Some(-55));

        // Exactly one read of each before any polling tick.
        assert_eq!(mock.data_reads(), 1);
        assert_eq!(mock.page_reads(), 1);
        assert_eq!(mock.rssi_reads(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_enters_error_state() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-B"));
        mock.set_fail_connect(true);

        session.connect(mock.clone());

        let snapshot = wait_for(&session, "error state", |s| s.connection.is_error()).await;
        match snapshot.connection {
            ConnectionState::Error(reason) => assert!(reason.contains("mock connect failure")),
            other => panic!("unexpected state: {}", other),
        }
        assert_eq!(mock.data_reads(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_enters_error_state() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-C"));
        mock.set_deny_permission(true);

        session.connect(mock);

        let snapshot = wait_for(&session, "error state", |s| s.connection.is_error()).await;
        match snapshot.connection {
            ConnectionState::Error(reason) => assert!(reason.contains("Permission denied")),
            other => panic!("unexpected state: {}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_failure_enters_error_state() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-D"));
        mock.set_fail_resolve(true);

        session.connect(mock);

        let snapshot = wait_for(&session, "error state", |s| s.connection.is_error()).await;
        assert!(snapshot.connection.is_error());
    }

    #[tokio::test]
    async fn test_disconnect_from_every_state() {
        // Disconnected: a no-op that stays Disconnected.
        let session = Session::with_config(fast_config());
        session.disconnect().await;
        assert_eq!(session.snapshot().connection, ConnectionState::Disconnected);

        // Connected.
        let mock = Arc::new(MockTransport::new("MOCK-E"));
        session.connect(mock.clone());
        wait_for(&session, "connected", |s| s.connection.is_connected()).await;
        session.disconnect().await;
        assert_eq!(session.snapshot().connection, ConnectionState::Disconnected);
        assert!(session.snapshot().latest.is_none());

        // Error.
        let failing = Arc::new(MockTransport::new("MOCK-F"));
        failing.set_fail_connect(true);
        session.connect(failing);
        wait_for(&session, "error state", |s| s.connection.is_error()).await;
        session.disconnect().await;
        assert_eq!(session.snapshot().connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_no_reads_after_disconnect() {
        let config = PollingConfig {
            telemetry_interval: Duration::from_millis(20),
            rssi_interval: Duration::from_millis(20),
        };
        let session = Session::with_config(config);
        let mock = Arc::new(MockTransport::new("MOCK-G"));

        session.connect(mock.clone());
        wait_for(&session, "first measurement", |s| s.latest.is_some()).await;

        session.disconnect().await;

        // Let any read spawned just before teardown drain, then
        // confirm that ticks past several would-be intervals issue
        // nothing further.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let data_reads = mock.data_reads();
        let rssi_reads = mock.rssi_reads();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(mock.data_reads(), data_reads);
        assert_eq!(mock.rssi_reads(), rssi_reads);
    }

    #[tokio::test]
    async fn test_late_completion_does_not_mutate_snapshot() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-H"));
        mock.set_read_latency(Duration::from_millis(100));

        session.connect(mock.clone());
        wait_for(&session, "connected", |s| s.connection.is_connected()).await;

        // Disconnect while the post-connect reads are still in flight.
        session.disconnect().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.connection, ConnectionState::Disconnected);
        assert!(snapshot.latest.is_none());
        assert!(snapshot.rssi.is_none());
    }

    #[tokio::test]
    async fn test_polling_issues_periodic_reads() {
        let config = PollingConfig {
            telemetry_interval: Duration::from_millis(25),
            rssi_interval: Duration::from_millis(25),
        };
        let session = Session::with_config(config);
        let mock = Arc::new(MockTransport::new("MOCK-I"));

        session.connect(mock.clone());
        wait_for(&session, "connected", |s| s.connection.is_connected()).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(mock.data_reads() >= 3, "expected polling double-reads");
        assert!(mock.page_reads() >= 3);
        assert!(mock.rssi_reads() >= 3);

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped_silently() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-J"));
        mock.set_latest_data(vec![0u8; 5]);

        session.connect(mock.clone());
        // The page read still succeeds, so wait on that.
        let snapshot = wait_for(&session, "page record", |s| s.page.is_some()).await;

        assert!(snapshot.connection.is_connected());
        assert!(snapshot.latest.is_none());
        assert!(session.decode_failures() >= 1);
    }

    #[tokio::test]
    async fn test_refresh_is_noop_when_disconnected() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-K"));

        session.refresh();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.data_reads(), 0);
    }

    #[tokio::test]
    async fn test_refresh_triggers_triple_read() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-L"));

        session.connect(mock.clone());
        wait_for(&session, "first measurement", |s| s.latest.is_some()).await;

        mock.set_rssi(-70);
        session.refresh();

        let snapshot = wait_for(&session, "refreshed rssi", |s| s.rssi == Some(-70)).await;
        assert!(snapshot.connection.is_connected());
        assert_eq!(mock.data_reads(), 2);
        assert_eq!(mock.page_reads(), 2);
        assert_eq!(mock.rssi_reads(), 2);
    }

    #[tokio::test]
    async fn test_clean_link_down_keeps_telemetry() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-M"));

        session.connect(mock.clone());
        wait_for(&session, "first measurement", |s| s.latest.is_some()).await;

        session.notify_link_down(None);
        let snapshot = wait_for(&session, "disconnected", |s| {
            s.connection == ConnectionState::Disconnected
        })
        .await;

        // Unlike an explicit disconnect, a link drop keeps the last
        // readings around for inspection.
        assert!(snapshot.latest.is_some());
    }

    #[tokio::test]
    async fn test_unclean_link_down_carries_status() {
        let session = Session::with_config(fast_config());
        let mock = Arc::new(MockTransport::new("MOCK-N"));

        session.connect(mock.clone());
        wait_for(&session, "connected", |s| s.connection.is_connected()).await;

        session.notify_link_down(Some("status 8".to_string()));
        let snapshot = wait_for(&session, "error state", |s| s.connection.is_error()).await;
        match snapshot.connection {
            ConnectionState::Error(reason) => assert!(reason.contains("status 8")),
            other => panic!("unexpected state: {}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_tears_down_previous_session() {
        let session = Session::with_config(fast_config());
        let first = Arc::new(MockTransport::new("MOCK-O1"));
        let second = Arc::new(MockTransport::new("MOCK-O2"));

        session.connect(first.clone());
        wait_for(&session, "connected", |s| s.connection.is_connected()).await;

        session.connect(second.clone());
        wait_for(&session, "reconnected", |s| {
            s.connection.is_connected() && s.latest.is_some()
        })
        .await;

        timeout(Duration::from_secs(2), async {
            while first.disconnects() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first transport was never released");
    }
}
