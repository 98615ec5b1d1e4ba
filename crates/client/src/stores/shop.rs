//! Shop-side inbox of open customer search requests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use vicino_shared::{
    EventKind, IncomingSearchEvent, OfferStatus, OfferStatusEvent, ServerEvent,
};

use crate::ws::events::{EventBus, SubscriptionId};

#[derive(Default)]
struct QueueState {
    incoming: Vec<IncomingSearchEvent>,
    offer_statuses: HashMap<i64, OfferStatus>,
}

/// Queue of incoming search requests plus the status of the shop's own
/// submitted offers. Entries leave the queue on manual dismissal or after a
/// successful offer submission; expiry is driven by the server.
#[derive(Default)]
pub struct ShopSearchQueue {
    state: RwLock<QueueState>,
}

impl ShopSearchQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append an incoming search. The transport is at-least-once, so a
    /// repeated delivery of the same search id is ignored.
    pub fn on_incoming_search(&self, event: IncomingSearchEvent) {
        let mut state = self.state.write();
        if state
            .incoming
            .iter()
            .any(|e| e.search_id == event.search_id)
        {
            return;
        }
        state.incoming.push(event);
    }

    /// Drop one entry, after a dismissal or a submitted offer.
    pub fn remove_incoming_search(&self, search_id: &str) {
        self.state
            .write()
            .incoming
            .retain(|e| e.search_id != search_id);
    }

    /// Empty the queue. Irreversible.
    pub fn clear_incoming(&self) {
        self.state.write().incoming.clear();
    }

    /// Track the outcome of an offer this shop submitted.
    pub fn on_offer_status(&self, event: &OfferStatusEvent) {
        self.state
            .write()
            .offer_statuses
            .insert(event.offer_id, event.status);
    }

    /// Status of a submitted offer; unseen offers are still pending.
    pub fn offer_status(&self, offer_id: i64) -> OfferStatus {
        self.state
            .read()
            .offer_statuses
            .get(&offer_id)
            .copied()
            .unwrap_or(OfferStatus::Pending)
    }

    /// Current queue contents, in arrival order.
    pub fn incoming(&self) -> Vec<IncomingSearchEvent> {
        self.state.read().incoming.clone()
    }

    pub fn clear_all(&self) {
        let mut state = self.state.write();
        state.incoming.clear();
        state.offer_statuses.clear();
    }

    /// Bind the queue's reducers to the bus.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        let mut subscriptions = Vec::new();

        let queue = self.clone();
        subscriptions.push(bus.on(EventKind::IncomingSearch, move |event| {
            if let ServerEvent::IncomingSearch(data) = event {
                queue.on_incoming_search(data.clone());
            }
        }));

        for kind in [
            EventKind::OfferAccepted,
            EventKind::OfferRejected,
            EventKind::OfferStatusChanged,
        ] {
            let queue = self.clone();
            subscriptions.push(bus.on(kind, move |event| {
                if let ServerEvent::OfferAccepted(data)
                | ServerEvent::OfferRejected(data)
                | ServerEvent::OfferStatusChanged(data) = event
                {
                    queue.on_offer_status(data);
                }
            }));
        }

        subscriptions
    }
}
