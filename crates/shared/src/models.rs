//! Shared data models for the vicino marketplace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    ShopOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// --- Stores & products ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub store_id: i64,
    pub in_stock: bool,
}

// --- Searches ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Completed,
    Cancelled,
}

impl SearchStatus {
    /// Completed and cancelled searches accept no further offers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchStatus::Completed | SearchStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Search {
    pub id: String,
    pub user_id: i64,
    pub product_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SearchStatus,
    #[serde(default)]
    pub selected_offer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offers: Option<Vec<Offer>>,
}

/// Request body for creating a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub product_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub message: String,
    pub search: Search,
}

/// A nearby open search as returned by the discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbySearch {
    pub id: String,
    pub user_id: i64,
    pub product_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SearchStatus,
    #[serde(default)]
    pub selected_offer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbySearchesResponse {
    pub searches: Vec<NearbySearch>,
}

// --- Offers ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    /// Accepted and rejected are terminal; there is no reverse transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Accepted | OfferStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: i64,
    pub search_id: String,
    pub store_id: i64,
    pub price: f64,
    pub eta: String,
    pub stock: u32,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    /// Store summary embedded by the server; push payloads may omit it.
    #[serde(default)]
    pub store: Option<Store>,
}

impl Offer {
    /// True when the embedded store detail is missing and the full record
    /// has to be backfilled over REST.
    pub fn is_partial(&self) -> bool {
        self.store.is_none()
    }
}

/// Request body for a shop responding to a search with an offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferSubmission {
    pub search_id: String,
    pub price: f64,
    pub eta: String,
    pub stock: u32,
}

// --- Aggregated REST responses ---

/// Generic acknowledgement for write endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchesResponse {
    pub message: String,
    pub searches: Vec<Search>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub total_products: u32,
    pub active_products: u32,
    pub total_offers: u32,
    pub accepted_offers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreDetails {
    #[serde(flatten)]
    pub store: Store,
    pub statistics: StoreStatistics,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreDetailsResponse {
    pub message: String,
    pub store: StoreDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::ShopOwner).unwrap(),
            "\"shop_owner\""
        );
    }

    #[test]
    fn offer_without_store_is_partial() {
        let json = r#"{
            "id": 7,
            "searchId": "s1",
            "storeId": 3,
            "price": 12.5,
            "eta": "20min",
            "stock": 4,
            "status": "pending",
            "createdAt": "2025-03-01T10:00:00Z"
        }"#;
        let offer: Offer = serde_json::from_str(json).unwrap();
        assert!(offer.is_partial());
        assert_eq!(offer.status, OfferStatus::Pending);
        assert!(!offer.status.is_terminal());
    }

    #[test]
    fn search_status_terminality() {
        assert!(!SearchStatus::Pending.is_terminal());
        assert!(SearchStatus::Completed.is_terminal());
        assert!(SearchStatus::Cancelled.is_terminal());
    }
}
