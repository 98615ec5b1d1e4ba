//! HTTP API client for the marketplace REST endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vicino_shared::{
    AckResponse, ApiError, AuthResponse, NearbySearchesResponse, Offer, OfferSubmission, Product,
    Search, SearchRequest, SearchResponse, Store, StoreDetailsResponse, UserSearchesResponse,
};

use crate::session::CredentialStore;

/// Source of full offer records, used by the customer view to backfill
/// partial push payloads.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn offers_for_search(&self, search_id: &str) -> Result<Vec<Offer>, ApiError>;
}

/// The offers endpoint has returned both a bare array and a wrapped object
/// over its lifetime; accept either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OffersPayload {
    List(Vec<Offer>),
    Wrapped { offers: Vec<Offer> },
}

impl From<OffersPayload> for Vec<Offer> {
    fn from(payload: OffersPayload) -> Self {
        match payload {
            OffersPayload::List(offers) => offers,
            OffersPayload::Wrapped { offers } => offers,
        }
    }
}

/// HTTP client for making authenticated API requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: CredentialStore,
}

impl ApiClient {
    /// Create a new API client. The bearer token is read from the
    /// credential store on every request, so a login that happens after
    /// construction is picked up automatically.
    pub fn new(base_url: impl Into<String>, credentials: CredentialStore) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        if self.base_url.is_empty() {
            return Err(ApiError::MissingBaseUrl);
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}"))
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn execute<TRes: DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
    ) -> Result<TRes, ApiError> {
        let resp = self
            .authorize(rb)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| ApiError::InvalidResponseFormat)?;

        if !is_success {
            let message = json
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Request failed")
                .to_string();
            return Err(ApiError::Api { status, message });
        }

        serde_json::from_value(json).map_err(|_| ApiError::InvalidResponseFormat)
    }

    /// Make an authenticated GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path)?;
        self.execute(self.client.get(&url)).await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path)?;
        self.execute(self.client.post(&url).json(body)).await
    }

    /// Make an authenticated PUT request with JSON body
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path)?;
        self.execute(self.client.put(&url).json(body)).await
    }

    // --- Authentication ---

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post_json(
            "/auth/login",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn register_customer(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<AuthResponse, ApiError> {
        self.post_json(
            "/auth/register/user",
            &serde_json::json!({
                "name": name, "email": email, "password": password, "phone": phone,
            }),
        )
        .await
    }

    pub async fn register_shop_owner(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<AuthResponse, ApiError> {
        self.post_json(
            "/auth/register/shop-owner",
            &serde_json::json!({
                "name": name, "email": email, "password": password, "phone": phone,
            }),
        )
        .await
    }

    // --- Search system ---

    pub async fn create_search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        self.post_json("/search", request).await
    }

    pub async fn get_offers(&self, search_id: &str) -> Result<Vec<Offer>, ApiError> {
        let payload: OffersPayload = self.get_json(&format!("/search/{search_id}/offers")).await?;
        Ok(payload.into())
    }

    pub async fn select_offer(
        &self,
        search_id: &str,
        offer_id: i64,
    ) -> Result<AckResponse, ApiError> {
        self.post_json(
            &format!("/search/{search_id}/select"),
            &serde_json::json!({ "offerId": offer_id }),
        )
        .await
    }

    pub async fn accept_offer(
        &self,
        search_id: &str,
        offer_id: i64,
    ) -> Result<AckResponse, ApiError> {
        self.put_json(
            &format!("/search/{search_id}/offers/{offer_id}/accept"),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn reject_offer(
        &self,
        search_id: &str,
        offer_id: i64,
    ) -> Result<AckResponse, ApiError> {
        self.put_json(
            &format!("/search/{search_id}/offers/{offer_id}/reject"),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn nearby_searches(
        &self,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<NearbySearchesResponse, ApiError> {
        self.get_json(&format!(
            "/search/nearby?latitude={latitude}&longitude={longitude}&radius={radius}"
        ))
        .await
    }

    pub async fn respond_to_search(
        &self,
        submission: &OfferSubmission,
    ) -> Result<AckResponse, ApiError> {
        self.post_json("/search/respond", submission).await
    }

    pub async fn user_searches(&self) -> Result<Vec<Search>, ApiError> {
        let resp: UserSearchesResponse = self.get_json("/search/user/searches").await?;
        Ok(resp.searches)
    }

    pub async fn user_offers(&self) -> Result<Vec<Offer>, ApiError> {
        let payload: OffersPayload = self.get_json("/search/user/offers").await?;
        Ok(payload.into())
    }

    // --- Store management ---

    pub async fn create_store(
        &self,
        name: &str,
        description: &str,
        address: &str,
        latitude: f64,
        longitude: f64,
        phone: &str,
    ) -> Result<Store, ApiError> {
        self.post_json(
            "/store",
            &serde_json::json!({
                "name": name,
                "description": description,
                "address": address,
                "latitude": latitude,
                "longitude": longitude,
                "phone": phone,
            }),
        )
        .await
    }

    pub async fn add_product(&self, product: &Product) -> Result<Product, ApiError> {
        self.post_json("/store/products", product).await
    }

    pub async fn store_offers(&self) -> Result<Vec<Offer>, ApiError> {
        let payload: OffersPayload = self.get_json("/store/offers").await?;
        Ok(payload.into())
    }

    pub async fn store_details(&self) -> Result<StoreDetailsResponse, ApiError> {
        self.get_json("/store/details").await
    }
}

#[async_trait]
impl SearchApi for ApiClient {
    async fn offers_for_search(&self, search_id: &str) -> Result<Vec<Offer>, ApiError> {
        self.get_offers(search_id).await
    }
}
