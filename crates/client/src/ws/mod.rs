//! Realtime connection layer.
//!
//! This module provides:
//! - Connection management with auto-reconnect and observable state
//! - A typed event bus with pending-listener buffering
//! - The transport seam (WebSocket in production, mock in tests)
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐     ┌──────────────────┐
//! │  ConnectionManager│────▶│  SocketTransport │  (one session at a time)
//! └───────────────────┘     └──────────────────┘
//!           │ dispatch
//!           ▼
//!    ┌────────────┐
//!    │  EventBus  │  (typed subscriptions, pending queue)
//!    └────────────┘
//!           │
//!    ┌──────┴────────────┬──────────────────────┐
//!    ▼                   ▼                      ▼
//! CustomerSearchView  ShopSearchQueue  NotificationAggregator
//! ```
//!
//! Consumers read from the stores; the manager writes incoming push events
//! into the bus, which fans them out to the store reducers.

pub mod events;
pub mod manager;
pub mod transport;

pub use events::{EventBus, SubscriptionId};
pub use manager::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use transport::{
    MockTransport, MockSession, SessionEvent, SessionHandle, SocketTransport, TransportError,
    WsTransport,
};
