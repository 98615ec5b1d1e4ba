//! Bounded, role-aware notification feed built from push events.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use vicino_shared::{
    EventKind, IncomingSearchEvent, NewOfferEvent, OfferStatusEvent, Role, ServerEvent,
};

use crate::ws::events::{EventBus, SubscriptionId};

const CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewOffer,
    IncomingSearch,
    OfferAccepted,
    OfferRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    Offer(NewOfferEvent),
    Search(IncomingSearchEvent),
    OfferStatus(OfferStatusEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub id: String,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Newest-first notification feed, capped at the 50 most recent entries.
///
/// New-offer events are surfaced only to customer sessions and incoming
/// searches only to shop sessions; accepted/rejected outcomes reach both
/// sides.
pub struct NotificationAggregator {
    role: Role,
    feed: RwLock<VecDeque<NotificationItem>>,
}

impl NotificationAggregator {
    pub fn new(role: Role) -> Arc<Self> {
        Arc::new(Self {
            role,
            feed: RwLock::new(VecDeque::new()),
        })
    }

    pub fn handle_event(&self, event: &ServerEvent) {
        let (kind, payload) = match event {
            ServerEvent::NewOffer(data) if self.role == Role::User => {
                (NotificationKind::NewOffer, NotificationPayload::Offer(data.clone()))
            }
            ServerEvent::IncomingSearch(data) if self.role == Role::ShopOwner => (
                NotificationKind::IncomingSearch,
                NotificationPayload::Search(data.clone()),
            ),
            ServerEvent::OfferAccepted(data) => (
                NotificationKind::OfferAccepted,
                NotificationPayload::OfferStatus(data.clone()),
            ),
            ServerEvent::OfferRejected(data) => (
                NotificationKind::OfferRejected,
                NotificationPayload::OfferStatus(data.clone()),
            ),
            _ => return,
        };

        let item = NotificationItem {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            timestamp: Utc::now(),
            read: false,
        };
        let mut feed = self.feed.write();
        feed.push_front(item);
        feed.truncate(CAPACITY);
    }

    /// The feed, newest first.
    pub fn notifications(&self) -> Vec<NotificationItem> {
        self.feed.read().iter().cloned().collect()
    }

    pub fn notifications_of_kind(&self, kind: NotificationKind) -> Vec<NotificationItem> {
        self.feed
            .read()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.feed.read().iter().filter(|n| !n.read).count()
    }

    /// Flip the read flag; the entry stays in the feed.
    pub fn mark_as_read(&self, id: &str) {
        let mut feed = self.feed.write();
        if let Some(item) = feed.iter_mut().find(|n| n.id == id) {
            item.read = true;
        }
    }

    pub fn mark_all_read(&self) {
        for item in self.feed.write().iter_mut() {
            item.read = true;
        }
    }

    pub fn clear(&self) {
        self.feed.write().clear();
    }

    /// Bind the aggregator to the four notifying event kinds.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        [
            EventKind::NewOffer,
            EventKind::IncomingSearch,
            EventKind::OfferAccepted,
            EventKind::OfferRejected,
        ]
        .into_iter()
        .map(|kind| {
            let aggregator = self.clone();
            bus.on(kind, move |event| aggregator.handle_event(event))
        })
        .collect()
    }
}
