//! Customer-side view of active searches and their offers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use vicino_shared::{
    EventKind, NewOfferEvent, Offer, OfferStatus, OfferStatusEvent, Search, SearchStatusEvent,
    ServerEvent,
};

use crate::api_client::SearchApi;
use crate::ws::events::{EventBus, SubscriptionId};

#[derive(Default)]
struct ViewState {
    searches: HashMap<String, Search>,
    offers: HashMap<String, Vec<Offer>>,
}

/// Per-search materialized view: search metadata plus the ordered offer
/// list, reconciling push deliveries with REST backfill.
///
/// Offers are kept in arrival order; the pending/accepted/rejected grouping
/// is the UI's primary sort key, not offer order.
pub struct CustomerSearchView {
    api: Arc<dyn SearchApi>,
    state: RwLock<ViewState>,
}

impl CustomerSearchView {
    pub fn new(api: Arc<dyn SearchApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            state: RwLock::new(ViewState::default()),
        })
    }

    /// Insert or overwrite a search record. Idempotent: a repeated add
    /// refreshes the metadata and leaves the offer list untouched.
    pub fn add_search(&self, search: Search) {
        let mut state = self.state.write();
        state.offers.entry(search.id.clone()).or_default();
        state.searches.insert(search.id.clone(), search);
    }

    /// Drop a search and its offers.
    pub fn remove_search(&self, search_id: &str) {
        let mut state = self.state.write();
        state.searches.remove(search_id);
        state.offers.remove(search_id);
    }

    /// Handle an `offers:new` push.
    ///
    /// Partial payloads (no embedded store) are withheld while the full
    /// offer set is fetched; if the fetch fails or the id is missing from
    /// the response, the partial record is inserted anyway so nothing is
    /// silently dropped.
    pub async fn on_new_offer(&self, event: NewOfferEvent) {
        let NewOfferEvent { search_id, offer } = event;
        if !self.state.read().searches.contains_key(&search_id) {
            debug!(search_id = %search_id, "offer for unknown search dropped");
            return;
        }

        if offer.is_partial() {
            match self.api.offers_for_search(&search_id).await {
                Ok(offers) => {
                    if let Some(full) = offers.into_iter().find(|o| o.id == offer.id) {
                        self.apply_offer(&search_id, full);
                        return;
                    }
                    warn!(offer_id = offer.id, "offer missing from backfill response");
                }
                Err(error) => {
                    warn!(error = %error, offer_id = offer.id, "offer backfill failed");
                }
            }
        }

        self.apply_offer(&search_id, offer);
    }

    /// Insert deduplicated by offer id; a replacement keeps its slot so
    /// arrival order is stable.
    fn apply_offer(&self, search_id: &str, offer: Offer) {
        let mut state = self.state.write();
        if !state.searches.contains_key(search_id) {
            // the search was removed while a backfill was in flight
            return;
        }
        let offers = state.offers.entry(search_id.to_string()).or_default();
        match offers.iter_mut().find(|o| o.id == offer.id) {
            Some(existing) => *existing = offer,
            None => offers.push(offer),
        }
    }

    /// Handle `offer:accepted` / `offer:rejected`.
    ///
    /// An acceptance also rejects every co-pending sibling locally, mirroring
    /// the server's single-winner rule without waiting for per-sibling
    /// events.
    pub fn on_offer_status(&self, event: &OfferStatusEvent) {
        let mut state = self.state.write();
        let Some(offers) = state.offers.get_mut(&event.search_id) else {
            return;
        };
        for offer in offers.iter_mut() {
            if offer.id == event.offer_id {
                offer.status = event.status;
            } else if event.status == OfferStatus::Accepted && offer.status == OfferStatus::Pending
            {
                offer.status = OfferStatus::Rejected;
            }
        }
    }

    /// Handle `search:status_update`. Touches the search only, never its
    /// offers.
    pub fn on_search_status(&self, event: &SearchStatusEvent) {
        let mut state = self.state.write();
        if let Some(search) = state.searches.get_mut(&event.search_id) {
            search.status = event.status;
            if event.selected_offer_id.is_some() {
                search.selected_offer_id = event.selected_offer_id.clone();
            }
        }
    }

    /// Offers for a search, in arrival order. Empty for unknown ids.
    pub fn offers_for_search(&self, search_id: &str) -> Vec<Offer> {
        self.state
            .read()
            .offers
            .get(search_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The search record, or `None` for unknown ids.
    pub fn active_search(&self, search_id: &str) -> Option<Search> {
        self.state.read().searches.get(search_id).cloned()
    }

    pub fn active_searches(&self) -> Vec<Search> {
        self.state.read().searches.values().cloned().collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.searches.clear();
        state.offers.clear();
    }

    /// Bind this view's reducers to the bus. Complete offer payloads apply
    /// synchronously; partial ones spawn the backfill task.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        let mut subscriptions = Vec::new();

        let view = self.clone();
        subscriptions.push(bus.on(EventKind::NewOffer, move |event| {
            if let ServerEvent::NewOffer(data) = event {
                let data = data.clone();
                if data.offer.is_partial() {
                    let view = view.clone();
                    tokio::spawn(async move {
                        view.on_new_offer(data).await;
                    });
                } else {
                    let NewOfferEvent { search_id, offer } = data;
                    view.apply_offer(&search_id, offer);
                }
            }
        }));

        for kind in [EventKind::OfferAccepted, EventKind::OfferRejected] {
            let view = self.clone();
            subscriptions.push(bus.on(kind, move |event| {
                if let ServerEvent::OfferAccepted(data) | ServerEvent::OfferRejected(data) = event
                {
                    view.on_offer_status(data);
                }
            }));
        }

        let view = self.clone();
        subscriptions.push(bus.on(EventKind::SearchStatusChanged, move |event| {
            if let ServerEvent::SearchStatusChanged(data) = event {
                view.on_search_status(data);
            }
        }));

        subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;
    use vicino_shared::{ApiError, SearchStatus, Store};

    /// Scripted backfill source; can optionally block until released.
    #[derive(Default)]
    struct StubApi {
        responses: Mutex<VecDeque<Result<Vec<Offer>, ApiError>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        calls: Mutex<u32>,
    }

    impl StubApi {
        fn returning(response: Result<Vec<Offer>, ApiError>) -> Arc<Self> {
            let stub = Arc::new(Self::default());
            stub.responses.lock().push_back(response);
            stub
        }

        fn gated(response: Result<Vec<Offer>, ApiError>) -> (Arc<Self>, oneshot::Sender<()>) {
            let stub = Self::returning(response);
            let (tx, rx) = oneshot::channel();
            *stub.gate.lock() = Some(rx);
            (stub, tx)
        }
    }

    #[async_trait]
    impl SearchApi for StubApi {
        async fn offers_for_search(&self, _search_id: &str) -> Result<Vec<Offer>, ApiError> {
            *self.calls.lock() += 1;
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn search(id: &str) -> Search {
        Search {
            id: id.into(),
            user_id: 1,
            product_name: "espresso beans".into(),
            latitude: 45.46,
            longitude: 9.19,
            status: SearchStatus::Pending,
            selected_offer_id: None,
            created_at: Utc::now(),
            category: None,
            max_price: None,
            offers: None,
        }
    }

    fn offer(id: i64, search_id: &str, store: Option<Store>) -> Offer {
        Offer {
            id,
            search_id: search_id.into(),
            store_id: 3,
            price: 12.5,
            eta: "20min".into(),
            stock: 4,
            status: OfferStatus::Pending,
            created_at: Utc::now(),
            store,
        }
    }

    fn store(name: &str) -> Store {
        Store {
            id: 3,
            owner_id: 9,
            name: name.into(),
            description: None,
            latitude: 45.47,
            longitude: 9.18,
            rating: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn add_search_is_idempotent_and_keeps_offers() {
        let view = CustomerSearchView::new(Arc::new(StubApi::default()));
        view.add_search(search("s1"));
        view.on_new_offer(NewOfferEvent {
            search_id: "s1".into(),
            offer: offer(1, "s1", Some(store("Acme"))),
        })
        .await;

        let mut updated = search("s1");
        updated.product_name = "decaf beans".into();
        view.add_search(updated);

        assert_eq!(view.active_searches().len(), 1);
        assert_eq!(
            view.active_search("s1").unwrap().product_name,
            "decaf beans"
        );
        assert_eq!(view.offers_for_search("s1").len(), 1);
    }

    #[tokio::test]
    async fn repeated_offer_delivery_does_not_duplicate() {
        let view = CustomerSearchView::new(Arc::new(StubApi::default()));
        view.add_search(search("s1"));

        for _ in 0..2 {
            view.on_new_offer(NewOfferEvent {
                search_id: "s1".into(),
                offer: offer(7, "s1", Some(store("Acme"))),
            })
            .await;
        }

        assert_eq!(view.offers_for_search("s1").len(), 1);
    }

    #[tokio::test]
    async fn acceptance_rejects_all_pending_siblings() {
        let view = CustomerSearchView::new(Arc::new(StubApi::default()));
        view.add_search(search("s1"));
        for id in 1..=3 {
            view.on_new_offer(NewOfferEvent {
                search_id: "s1".into(),
                offer: offer(id, "s1", Some(store("Acme"))),
            })
            .await;
        }

        view.on_offer_status(&OfferStatusEvent {
            offer_id: 2,
            search_id: "s1".into(),
            status: OfferStatus::Accepted,
            store_id: None,
        });

        let offers = view.offers_for_search("s1");
        let status_of = |id: i64| offers.iter().find(|o| o.id == id).unwrap().status;
        assert_eq!(status_of(1), OfferStatus::Rejected);
        assert_eq!(status_of(2), OfferStatus::Accepted);
        assert_eq!(status_of(3), OfferStatus::Rejected);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_errors() {
        let view = CustomerSearchView::new(Arc::new(StubApi::default()));
        assert!(view.offers_for_search("nonexistent").is_empty());
        assert!(view.active_search("nonexistent").is_none());
    }

    #[tokio::test]
    async fn partial_offer_is_backfilled_with_store_detail() {
        let api = StubApi::returning(Ok(vec![offer(7, "s1", Some(store("Acme")))]));
        let view = CustomerSearchView::new(api);
        view.add_search(search("s1"));

        view.on_new_offer(NewOfferEvent {
            search_id: "s1".into(),
            offer: offer(7, "s1", None),
        })
        .await;

        let offers = view.offers_for_search("s1");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].store.as_ref().unwrap().name, "Acme");
    }

    #[tokio::test]
    async fn failed_backfill_falls_back_to_partial_record() {
        let api = StubApi::returning(Err(ApiError::Network("down".into())));
        let view = CustomerSearchView::new(api);
        view.add_search(search("s1"));

        view.on_new_offer(NewOfferEvent {
            search_id: "s1".into(),
            offer: offer(7, "s1", None),
        })
        .await;

        let offers = view.offers_for_search("s1");
        assert_eq!(offers.len(), 1);
        assert!(offers[0].is_partial());
    }

    #[tokio::test]
    async fn backfill_miss_falls_back_to_partial_record() {
        let api = StubApi::returning(Ok(vec![offer(99, "s1", Some(store("Acme")))]));
        let view = CustomerSearchView::new(api);
        view.add_search(search("s1"));

        view.on_new_offer(NewOfferEvent {
            search_id: "s1".into(),
            offer: offer(7, "s1", None),
        })
        .await;

        let offers = view.offers_for_search("s1");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, 7);
        assert!(offers[0].is_partial());
    }

    #[tokio::test]
    async fn partial_offer_is_withheld_while_backfill_is_in_flight() {
        let (api, release) = StubApi::gated(Ok(vec![offer(7, "s1", Some(store("Acme")))]));
        let view = CustomerSearchView::new(api);
        view.add_search(search("s1"));

        let task = {
            let view = view.clone();
            tokio::spawn(async move {
                view.on_new_offer(NewOfferEvent {
                    search_id: "s1".into(),
                    offer: offer(7, "s1", None),
                })
                .await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(view.offers_for_search("s1").is_empty());

        release.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(view.offers_for_search("s1").len(), 1);
        assert!(!view.offers_for_search("s1")[0].is_partial());
    }

    #[tokio::test]
    async fn backfill_result_is_discarded_when_search_was_removed() {
        let (api, release) = StubApi::gated(Ok(vec![offer(7, "s1", Some(store("Acme")))]));
        let view = CustomerSearchView::new(api);
        view.add_search(search("s1"));

        let task = {
            let view = view.clone();
            tokio::spawn(async move {
                view.on_new_offer(NewOfferEvent {
                    search_id: "s1".into(),
                    offer: offer(7, "s1", None),
                })
                .await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        view.remove_search("s1");
        release.send(()).unwrap();
        task.await.unwrap();

        assert!(view.active_search("s1").is_none());
        assert!(view.offers_for_search("s1").is_empty());
    }

    #[tokio::test]
    async fn offer_for_unknown_search_is_dropped() {
        let api = Arc::new(StubApi::default());
        let view = CustomerSearchView::new(api.clone());

        view.on_new_offer(NewOfferEvent {
            search_id: "ghost".into(),
            offer: offer(7, "ghost", None),
        })
        .await;

        assert!(view.offers_for_search("ghost").is_empty());
        // no backfill was attempted either
        assert_eq!(*api.calls.lock(), 0);
    }

    #[tokio::test]
    async fn search_status_update_leaves_offers_alone() {
        let view = CustomerSearchView::new(Arc::new(StubApi::default()));
        view.add_search(search("s1"));
        view.on_new_offer(NewOfferEvent {
            search_id: "s1".into(),
            offer: offer(1, "s1", Some(store("Acme"))),
        })
        .await;

        view.on_search_status(&SearchStatusEvent {
            search_id: "s1".into(),
            status: SearchStatus::Completed,
            selected_offer_id: Some("1".into()),
        });

        let search = view.active_search("s1").unwrap();
        assert_eq!(search.status, SearchStatus::Completed);
        assert_eq!(search.selected_offer_id.as_deref(), Some("1"));
        assert_eq!(view.offers_for_search("s1").len(), 1);
        assert_eq!(view.offers_for_search("s1")[0].status, OfferStatus::Pending);
    }
}
