//! Push-event protocol spoken over the realtime transport.
//!
//! Frames are JSON objects of the form `{"event": "...", "data": {...}}`.
//! The event names match the server's wire vocabulary; the enums below give
//! the client exhaustive matching instead of string-keyed dispatch.

use serde::{Deserialize, Serialize};

use crate::models::{Offer, OfferStatus, SearchStatus};

// --- Payloads ---

/// A new offer pushed to the customer that owns the search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewOfferEvent {
    pub search_id: String,
    pub offer: Offer,
}

/// An offer reached a terminal (or updated) status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferStatusEvent {
    pub offer_id: i64,
    pub search_id: String,
    pub status: OfferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<i64>,
}

/// A search moved to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatusEvent {
    pub search_id: String,
    pub status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_offer_id: Option<String>,
}

/// A customer search broadcast to nearby shops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingSearchEvent {
    pub search_id: String,
    pub product_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingPayload {
    pub message: String,
}

// --- Frames ---

/// Server-to-client push events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "offers:new")]
    NewOffer(NewOfferEvent),
    #[serde(rename = "offer:accepted")]
    OfferAccepted(OfferStatusEvent),
    #[serde(rename = "offer:rejected")]
    OfferRejected(OfferStatusEvent),
    #[serde(rename = "search:status_update")]
    SearchStatusChanged(SearchStatusEvent),
    #[serde(rename = "search:incoming")]
    IncomingSearch(IncomingSearchEvent),
    #[serde(rename = "offer:status_update")]
    OfferStatusChanged(OfferStatusEvent),
    #[serde(rename = "pong")]
    Pong(PingPayload),
}

/// Client-to-server commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    #[serde(rename = "ping")]
    Ping(PingPayload),
}

/// Discriminant tags for [`ServerEvent`], used to key event subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewOffer,
    OfferAccepted,
    OfferRejected,
    SearchStatusChanged,
    IncomingSearch,
    OfferStatusChanged,
    Pong,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::NewOffer(_) => EventKind::NewOffer,
            ServerEvent::OfferAccepted(_) => EventKind::OfferAccepted,
            ServerEvent::OfferRejected(_) => EventKind::OfferRejected,
            ServerEvent::SearchStatusChanged(_) => EventKind::SearchStatusChanged,
            ServerEvent::IncomingSearch(_) => EventKind::IncomingSearch,
            ServerEvent::OfferStatusChanged(_) => EventKind::OfferStatusChanged,
            ServerEvent::Pong(_) => EventKind::Pong,
        }
    }
}
