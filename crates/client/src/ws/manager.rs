//! Connection lifecycle management with state tracking and auto-reconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_channel::mpsc::UnboundedSender;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vicino_shared::{ClientCommand, ConnectionError, EventKind, PingPayload, ServerEvent};

use crate::config::ClientConfig;
use crate::session::CredentialStore;
use crate::ws::events::EventBus;
use crate::ws::transport::{SessionEvent, SessionHandle, SocketTransport, WsTransport};

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Observable connection state. Mutated only by the manager; read by
/// everyone else, either by snapshot or through [`ConnectionManager::subscribe_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            last_error: None,
            last_connected_at: None,
            reconnect_attempts: 0,
        }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }
}

struct ManagerInner {
    config: ClientConfig,
    transport: Arc<dyn SocketTransport>,
    credentials: CredentialStore,
    bus: Arc<EventBus>,
    state_tx: watch::Sender<ConnectionState>,
    outgoing: Mutex<Option<UnboundedSender<ClientCommand>>>,
    // Bumped on every connect()/disconnect(); session tasks from an earlier
    // generation must not touch shared state.
    generation: AtomicU64,
}

/// Owner of the single transport session.
///
/// Constructed once at the application root and handed to consumers by
/// reference; views and the notification feed observe events through the
/// [`EventBus`] and never touch the transport directly.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn SocketTransport>,
        credentials: CredentialStore,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        Self {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                credentials,
                bus: EventBus::new(),
                state_tx,
                outgoing: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Manager backed by the WebSocket transport from the configured URL.
    pub fn with_websocket(config: ClientConfig, credentials: CredentialStore) -> Self {
        let transport = Arc::new(WsTransport::new(config.socket_url.clone()));
        Self::new(config, transport, credentials)
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.inner.bus.clone()
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Stream of state changes, for consumers that prefer not to poll.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Establish the transport session.
    ///
    /// No-op while Connecting or Connected. Fails only when no credential
    /// token is stored; transport failures are recorded into the observable
    /// state while remaining attempts continue in the background.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let state = self.inner.state_tx.borrow();
            if state.status != ConnectionStatus::Disconnected {
                debug!(status = ?state.status, "connect ignored, session already underway");
                return Ok(());
            }
        }

        let token = self
            .inner
            .credentials
            .token()
            .ok_or(ConnectionError::AuthenticationMissing)?;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .state_tx
            .send_modify(|s| s.status = ConnectionStatus::Connecting);

        match try_connect(&self.inner, &token, generation).await {
            ConnectAttempt::Connected(incoming) => {
                tokio::spawn(run_session(self.inner.clone(), incoming, generation));
            }
            ConnectAttempt::Superseded => {}
            ConnectAttempt::Failed(message) => {
                record_failure(&self.inner, message, 1);
                if self.inner.config.reconnect.max_attempts <= 1 {
                    give_up(&self.inner);
                } else {
                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        if let Some(incoming) = retry_loop(&inner, &token, generation, 1).await {
                            run_session(inner.clone(), incoming, generation).await;
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Tear down the session and clear state synchronously. Listener
    /// registrations queued before a session existed are discarded.
    pub fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.outgoing.lock() = None;
        self.inner.bus.session_closed();
        self.inner.bus.discard_pending();
        self.inner.state_tx.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.last_error = None;
            s.reconnect_attempts = 0;
        });
        info!("realtime connection closed");
    }

    /// Manual recovery: disconnect, wait out a quiescence interval, connect.
    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        self.disconnect();
        tokio::time::sleep(self.inner.config.reconnect_quiescence).await;
        self.connect().await
    }

    /// Send a command over the live session. Fails fast when disconnected;
    /// there is no offline write queue.
    pub fn emit(&self, command: ClientCommand) -> Result<(), ConnectionError> {
        let outgoing = self.inner.outgoing.lock();
        match outgoing.as_ref() {
            Some(sender) => sender
                .unbounded_send(command)
                .map_err(|_| ConnectionError::NotConnected),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Liveness probe: send a uniquely tagged ping and wait for the matching
    /// pong. A pong carrying a different tag (stale or crossed) does not
    /// resolve the probe.
    pub async fn test_connection(&self) -> bool {
        let tag = Uuid::new_v4().to_string();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done_tx = Mutex::new(Some(done_tx));
        let expected = tag.clone();

        let subscription = self.inner.bus.on(EventKind::Pong, move |event| {
            if let ServerEvent::Pong(payload) = event {
                if payload.message == expected {
                    if let Some(tx) = done_tx.lock().take() {
                        let _ = tx.send(());
                    }
                }
            }
        });

        let outcome = match self.emit(ClientCommand::Ping(PingPayload { message: tag })) {
            Ok(()) => tokio::time::timeout(self.inner.config.ping_timeout, done_rx)
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false),
            Err(_) => false,
        };

        self.inner.bus.off(EventKind::Pong, Some(subscription));
        outcome
    }
}

enum ConnectAttempt {
    Connected(mpsc::UnboundedReceiver<SessionEvent>),
    Superseded,
    Failed(String),
}

fn stale(inner: &ManagerInner, generation: u64) -> bool {
    inner.generation.load(Ordering::SeqCst) != generation
}

fn record_failure(inner: &ManagerInner, message: String, attempts: u32) {
    warn!(error = %message, attempts, "connection attempt failed");
    inner.state_tx.send_modify(|s| {
        s.last_error = Some(message);
        s.reconnect_attempts = attempts;
    });
}

fn give_up(inner: &ManagerInner) {
    warn!("connection attempt budget exhausted; manual reconnect required");
    inner
        .state_tx
        .send_modify(|s| s.status = ConnectionStatus::Disconnected);
}

/// One connection attempt, bounded by the configured timeout. On success the
/// session is installed and pending listeners are flushed.
async fn try_connect(inner: &Arc<ManagerInner>, token: &str, generation: u64) -> ConnectAttempt {
    let attempt =
        tokio::time::timeout(inner.config.connect_timeout, inner.transport.connect(token)).await;

    match attempt {
        Ok(Ok(SessionHandle { outgoing, incoming })) => {
            if stale(inner, generation) {
                // a manual disconnect raced this attempt; drop the session
                return ConnectAttempt::Superseded;
            }
            *inner.outgoing.lock() = Some(outgoing);
            inner.state_tx.send_modify(|s| {
                s.status = ConnectionStatus::Connected;
                s.last_connected_at = Some(Utc::now());
                s.reconnect_attempts = 0;
                s.last_error = None;
            });
            inner.bus.session_opened();
            info!("realtime connection established");
            ConnectAttempt::Connected(incoming)
        }
        Ok(Err(e)) => ConnectAttempt::Failed(e.to_string()),
        Err(_) => ConnectAttempt::Failed("connection attempt timed out".to_string()),
    }
}

/// Back off and retry until connected, superseded, or out of budget.
/// `attempts` counts failures already recorded.
async fn retry_loop(
    inner: &Arc<ManagerInner>,
    token: &str,
    generation: u64,
    mut attempts: u32,
) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
    loop {
        let delay = inner
            .config
            .reconnect
            .delay_for_attempt(attempts.saturating_sub(1));
        tokio::time::sleep(delay).await;
        if stale(inner, generation) {
            return None;
        }

        match try_connect(inner, token, generation).await {
            ConnectAttempt::Connected(incoming) => return Some(incoming),
            ConnectAttempt::Superseded => return None,
            ConnectAttempt::Failed(message) => {
                attempts += 1;
                record_failure(inner, message, attempts);
                if attempts >= inner.config.reconnect.max_attempts {
                    give_up(inner);
                    return None;
                }
            }
        }
    }
}

/// Drive a live session: forward push events to the bus, and when the
/// session drops unexpectedly, reconnect under the same attempt budget.
async fn run_session(
    inner: Arc<ManagerInner>,
    mut incoming: mpsc::UnboundedReceiver<SessionEvent>,
    generation: u64,
) {
    loop {
        let mut close_reason = None;
        loop {
            match incoming.recv().await {
                Some(SessionEvent::Event(event)) => {
                    if stale(&inner, generation) {
                        return;
                    }
                    debug!(kind = ?event.kind(), "push event");
                    inner.bus.dispatch(&event);
                }
                Some(SessionEvent::Closed { reason }) => {
                    close_reason = reason;
                    break;
                }
                None => break,
            }
        }
        if stale(&inner, generation) {
            return;
        }

        *inner.outgoing.lock() = None;
        inner.bus.session_closed();
        inner.state_tx.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.last_error = Some(close_reason.unwrap_or_else(|| "connection closed".to_string()));
        });
        warn!("realtime connection lost");

        let Some(token) = inner.credentials.token() else {
            return;
        };
        inner
            .state_tx
            .send_modify(|s| s.status = ConnectionStatus::Connecting);

        match try_connect(&inner, &token, generation).await {
            ConnectAttempt::Connected(next) => {
                incoming = next;
            }
            ConnectAttempt::Superseded => return,
            ConnectAttempt::Failed(message) => {
                record_failure(&inner, message, 1);
                if inner.config.reconnect.max_attempts <= 1 {
                    give_up(&inner);
                    return;
                }
                match retry_loop(&inner, &token, generation, 1).await {
                    Some(next) => incoming = next,
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use crate::session::AuthSession;
    use crate::storage::Storage;
    use crate::ws::transport::MockTransport;
    use std::time::Duration;
    use vicino_shared::{Role, User};

    fn fast_config() -> ClientConfig {
        ClientConfig::new("https://api.test/api", "wss://api.test/ws")
            .with_connect_timeout(Duration::from_millis(500))
            .with_ping_timeout(Duration::from_millis(200))
            .with_reconnect_quiescence(Duration::from_millis(1))
            .with_reconnect(ReconnectConfig {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 10,
                backoff_multiplier: 1.5,
            })
    }

    fn credentials_with_token(dir: &tempfile::TempDir, token: &str) -> CredentialStore {
        let store = CredentialStore::new(Storage::with_root(dir.path()));
        store.save_session(&AuthSession {
            token: token.into(),
            user: User {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: Role::User,
                phone: None,
            },
        });
        store
    }

    fn setup(dir: &tempfile::TempDir) -> (ConnectionManager, Arc<MockTransport>) {
        let transport = MockTransport::new();
        let credentials = credentials_with_token(dir, "abc");
        let manager = ConnectionManager::new(fast_config(), transport.clone(), credentials);
        (manager, transport)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within 1s");
    }

    #[tokio::test]
    async fn connect_with_stored_token_reaches_connected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);

        manager.connect().await.unwrap();

        let state = manager.state();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.reconnect_attempts, 0);
        assert!(state.last_connected_at.is_some());
        assert_eq!(state.last_error, None);
        assert_eq!(transport.tokens(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn connect_without_token_fails_and_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        let credentials = CredentialStore::new(Storage::with_root(dir.path()));
        let manager = ConnectionManager::new(fast_config(), transport.clone(), credentials);

        let result = manager.connect().await;
        assert_eq!(result, Err(ConnectionError::AuthenticationMissing));
        assert_eq!(manager.state().status, ConnectionStatus::Disconnected);
        assert_eq!(transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_connect_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn connect_failures_are_recorded_not_thrown() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);
        transport.fail_next(2, "refused");

        manager.connect().await.unwrap();

        let state = manager.state();
        assert!(state.reconnect_attempts >= 1);
        assert_eq!(state.last_error.as_deref(), Some("refused"));

        // budget of 2 attempts drains in the background
        wait_for(|| {
            let s = manager.state();
            s.status == ConnectionStatus::Disconnected && s.reconnect_attempts == 2
        })
        .await;
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn dropped_session_reconnects_with_newer_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);

        manager.connect().await.unwrap();
        let first_connected_at = manager.state().last_connected_at.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.last_session().unwrap().close(Some("server going away"));

        wait_for(|| {
            let s = manager.state();
            s.status == ConnectionStatus::Connected
                && s.last_connected_at.is_some_and(|t| t > first_connected_at)
        })
        .await;
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn manual_reconnect_establishes_a_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);

        manager.connect().await.unwrap();
        let first_connected_at = manager.state().last_connected_at.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.reconnect().await.unwrap();

        let state = manager.state();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert!(state.last_connected_at.unwrap() > first_connected_at);
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn emit_fails_fast_when_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _transport) = setup(&dir);

        let result = manager.emit(ClientCommand::Ping(PingPayload {
            message: "x".into(),
        }));
        assert_eq!(result, Err(ConnectionError::NotConnected));
    }

    #[tokio::test]
    async fn test_connection_matches_tagged_pong() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);
        manager.connect().await.unwrap();

        let session = transport.last_session().unwrap();
        tokio::spawn(async move {
            if let Some(ClientCommand::Ping(payload)) = session.next_command().await {
                session.push_event(ServerEvent::Pong(payload));
            }
        });

        assert!(manager.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_ignores_mismatched_pong() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);
        manager.connect().await.unwrap();

        let session = transport.last_session().unwrap();
        tokio::spawn(async move {
            if session.next_command().await.is_some() {
                session.push_event(ServerEvent::Pong(PingPayload {
                    message: "someone else's pong".into(),
                }));
            }
        });

        assert!(!manager.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_is_false_when_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _transport) = setup(&dir);
        assert!(!manager.test_connection().await);
    }

    #[tokio::test]
    async fn disconnect_discards_pending_registrations() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, transport) = setup(&dir);

        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_clone = fired.clone();
        manager.bus().on(EventKind::Pong, move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.disconnect();
        manager.connect().await.unwrap();

        let session = transport.last_session().unwrap();
        session.push_event(ServerEvent::Pong(PingPayload {
            message: "x".into(),
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn state_changes_are_observable_without_polling() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _transport) = setup(&dir);
        let mut rx = manager.subscribe_state();

        manager.connect().await.unwrap();
        rx.wait_for(|s| s.status == ConnectionStatus::Connected)
            .await
            .unwrap();
    }
}
