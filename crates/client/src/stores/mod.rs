//! Materialized views over the push-event stream.
//!
//! Each store owns its state, subscribes its reducers to the [`EventBus`],
//! and is read by UI consumers. Stores never touch the transport directly.
//!
//! [`EventBus`]: crate::ws::EventBus

pub mod customer;
pub mod notifications;
pub mod shop;

pub use customer::CustomerSearchView;
pub use notifications::{
    NotificationAggregator, NotificationItem, NotificationKind, NotificationPayload,
};
pub use shop::ShopSearchQueue;
