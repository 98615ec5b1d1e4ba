//! vicino client: the realtime synchronization layer of the vicino
//! local-marketplace app.
//!
//! Customers broadcast product searches, nearby shops answer with offers,
//! and both sides keep consistent state over an unreliable, reconnecting
//! transport. The pieces:
//!
//! - [`ws::ConnectionManager`] owns the single transport session
//! - [`ws::EventBus`] fans push events out to typed subscriptions
//! - [`stores`] hold the per-role materialized views
//! - [`ApiClient`] is the REST boundary used for writes and backfill
//! - [`Storage`] / [`session`] persist credentials and the active search

pub mod api_client;
pub mod config;
pub mod session;
pub mod storage;
pub mod stores;
pub mod ws;

pub use api_client::{ApiClient, SearchApi};
pub use config::{ClientConfig, ReconnectConfig};
pub use session::{ActiveSearchStore, AuthSession, CredentialStore};
pub use storage::Storage;
pub use stores::{
    CustomerSearchView, NotificationAggregator, NotificationItem, NotificationKind,
    NotificationPayload, ShopSearchQueue,
};
pub use ws::{
    ConnectionManager, ConnectionState, ConnectionStatus, EventBus, SocketTransport,
    SubscriptionId, WsTransport,
};
