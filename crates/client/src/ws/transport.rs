//! Transport seam between the connection manager and the physical socket.
//!
//! The production implementation ([`WsTransport`]) speaks JSON text frames
//! over a WebSocket. [`MockTransport`] provides a channel-backed stand-in
//! for tests.

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;
use vicino_shared::{ClientCommand, ServerEvent};

/// Errors from establishing a transport session.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("failed to establish connection: {0}")]
    Connect(String),
    /// The server refused the session, e.g. a rejected token.
    #[error("connection rejected: {0}")]
    Rejected(String),
}

/// Something that happened on a live session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A push event arrived.
    Event(ServerEvent),
    /// The session ended, voluntarily or not.
    Closed { reason: Option<String> },
}

/// A live transport session.
///
/// Dropping `outgoing` closes the write side and ends the session; incoming
/// push events and the final close notification arrive on `incoming`.
pub struct SessionHandle {
    pub outgoing: UnboundedSender<ClientCommand>,
    pub incoming: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Factory for transport sessions. The connection manager owns exactly one
/// session at a time and calls this once per (re)connect attempt.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self, token: &str) -> Result<SessionHandle, TransportError>;
}

// --- WebSocket implementation ---

/// WebSocket transport speaking the push-event protocol.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// `url` is the realtime endpoint, e.g. `wss://api.example.com/ws`.
    /// The bearer token is appended as a query parameter at connect time.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn connect(&self, token: &str) -> Result<SessionHandle, TransportError> {
        let url = format!("{}?token={}", self.url, urlencoding::encode(token));
        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| match e {
            // a non-101 HTTP answer, e.g. a rejected token
            tokio_tungstenite::tungstenite::Error::Http(response) => {
                TransportError::Rejected(format!("HTTP {}", response.status()))
            }
            other => TransportError::Connect(other.to_string()),
        })?;

        let (mut write, mut read) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = unbounded::<ClientCommand>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<SessionEvent>();

        // Read task: parse text frames into events until the socket closes.
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = incoming_tx.send(SessionEvent::Event(event));
                        }
                        Err(e) => warn!(error = %e, "skipping unparseable push frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        break;
                    }
                    // Pings are answered by tungstenite itself.
                    Ok(_) => {}
                    Err(e) => {
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }
            let _ = incoming_tx.send(SessionEvent::Closed { reason });
        });

        // Write task: serialize commands until the handle is dropped.
        tokio::spawn(async move {
            while let Some(command) = outgoing_rx.next().await {
                match serde_json::to_string(&command) {
                    Ok(json) => {
                        if write.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize command"),
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        Ok(SessionHandle {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }
}

// --- Mock implementation for tests ---

/// A scripted transport for tests: connection attempts succeed unless a
/// failure was queued, and each successful attempt yields a [`MockSession`]
/// the test can drive.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    outcomes: VecDeque<TransportError>,
    connect_count: u32,
    tokens: Vec<String>,
    sessions: Vec<MockSession>,
}

/// Test-side handle to a session created by [`MockTransport`].
#[derive(Clone)]
pub struct MockSession {
    events: mpsc::UnboundedSender<SessionEvent>,
    sent: Arc<Mutex<UnboundedReceiver<ClientCommand>>>,
}

impl MockSession {
    /// Deliver a push event to the client.
    pub fn push_event(&self, event: ServerEvent) {
        let _ = self.events.send(SessionEvent::Event(event));
    }

    /// Close the session from the server side.
    pub fn close(&self, reason: Option<&str>) {
        let _ = self.events.send(SessionEvent::Closed {
            reason: reason.map(String::from),
        });
    }

    /// Pop the next command the client sent, if any.
    pub fn try_recv_command(&self) -> Option<ClientCommand> {
        self.sent.lock().try_next().ok().flatten()
    }

    /// Wait (bounded) for the next command the client sends.
    pub async fn next_command(&self) -> Option<ClientCommand> {
        for _ in 0..200 {
            if let Some(command) = self.try_recv_command() {
                return Some(command);
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        None
    }
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `count` failing connection attempts ahead of any success.
    pub fn fail_next(&self, count: usize, message: &str) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state
                .outcomes
                .push_back(TransportError::Connect(message.to_string()));
        }
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().connect_count
    }

    /// Tokens presented across all connection attempts, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().tokens.clone()
    }

    /// The most recently established session.
    pub fn last_session(&self) -> Option<MockSession> {
        self.state.lock().sessions.last().cloned()
    }
}

#[async_trait]
impl SocketTransport for MockTransport {
    async fn connect(&self, token: &str) -> Result<SessionHandle, TransportError> {
        let mut state = self.state.lock();
        state.connect_count += 1;
        state.tokens.push(token.to_string());
        if let Some(error) = state.outcomes.pop_front() {
            return Err(error);
        }

        let (outgoing_tx, outgoing_rx) = unbounded();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        state.sessions.push(MockSession {
            events: incoming_tx,
            sent: Arc::new(Mutex::new(outgoing_rx)),
        });

        Ok(SessionHandle {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }
}
