// Account store: session gate plus the user's saved listings
//
// The account API is authoritative. Every save/unsave replaces the local collection
// with whatever the API returns.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AccountConfig;
use crate::error::{AccountError, ProviderError};
use crate::http_path::{HttpPathClient, RequestSpec};
use crate::listing::{Listing, SavedListing};
use crate::provider::expect_success;

pub const SAVED_ROUTE: &str = "saved_listings";
pub const SAVED_ITEM_ROUTE: &str = "saved_listing";

/// Opaque session from the auth provider; presence means authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait AccountApi: Send + Sync + 'static {
    async fn save_listing(
        &self,
        user_id: &str,
        saved: &SavedListing,
    ) -> Result<Vec<SavedListing>, ProviderError>;

    async fn unsave_listing(
        &self,
        user_id: &str,
        listing_id: &str,
    ) -> Result<Vec<SavedListing>, ProviderError>;

    async fn saved_listings(&self, user_id: &str) -> Result<Vec<SavedListing>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct SavedListingsBody {
    saved_listings: Vec<SavedListing>,
}

pub struct HttpAccountApi {
    http: HttpPathClient,
}

impl HttpAccountApi {
    pub fn new(config: &AccountConfig) -> Self {
        let http = HttpPathClient::new(config.base_url.clone())
            .with_route(SAVED_ROUTE, "/users/:user_id/saved")
            .with_route(SAVED_ITEM_ROUTE, "/users/:user_id/saved/:listing_id");
        Self { http }
    }

    fn decode(body: &str) -> Result<Vec<SavedListing>, ProviderError> {
        serde_json::from_str::<SavedListingsBody>(body)
            .map(|parsed| parsed.saved_listings)
            .map_err(|e| ProviderError::Schema(format!("saved listings: {}", e)))
    }
}

#[async_trait]
impl AccountApi for HttpAccountApi {
    async fn save_listing(
        &self,
        user_id: &str,
        saved: &SavedListing,
    ) -> Result<Vec<SavedListing>, ProviderError> {
        let url = self.http.path(SAVED_ROUTE, &[("user_id", user_id)], &[])?;
        let spec = RequestSpec::new(url)
            .with_data(saved)
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let body = expect_success(self.http.post(spec).await?).await?;
        Self::decode(&body)
    }

    async fn unsave_listing(
        &self,
        user_id: &str,
        listing_id: &str,
    ) -> Result<Vec<SavedListing>, ProviderError> {
        let url = self.http.path(
            SAVED_ITEM_ROUTE,
            &[("user_id", user_id), ("listing_id", listing_id)],
            &[],
        )?;
        let body = expect_success(self.http.del(RequestSpec::new(url)).await?).await?;
        Self::decode(&body)
    }

    async fn saved_listings(&self, user_id: &str) -> Result<Vec<SavedListing>, ProviderError> {
        let url = self.http.path(SAVED_ROUTE, &[("user_id", user_id)], &[])?;
        let body = expect_success(self.http.get(RequestSpec::new(url)).await?).await?;
        Self::decode(&body)
    }
}

pub struct AccountStore {
    api: Arc<dyn AccountApi>,
    session: RwLock<Option<Session>>,
    saved: RwLock<Vec<SavedListing>>,
}

impl AccountStore {
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self {
            api,
            session: RwLock::new(None),
            saved: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the session. Signing out (or switching user) drops the saved collection.
    pub fn set_session(&self, session: Option<Session>) {
        let mut current = self.session.write();
        let same_user = match (current.as_ref(), session.as_ref()) {
            (Some(a), Some(b)) => a.user_id == b.user_id,
            _ => false,
        };
        if !same_user {
            self.saved.write().clear();
        }
        *current = session;
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn saved(&self) -> Vec<SavedListing> {
        self.saved.read().clone()
    }

    pub fn is_saved(&self, listing_id: &str) -> bool {
        self.saved
            .read()
            .iter()
            .any(|saved| saved.listing_id == listing_id)
    }

    pub async fn save(&self, listing: &Listing) -> Result<Vec<SavedListing>, AccountError> {
        let user_id = self.user_id()?;
        let saved = SavedListing::from_listing(&user_id, listing)?;
        let collection = self.api.save_listing(&user_id, &saved).await?;
        info!(user_id = %user_id, listing_id = %listing.id, "Saved listing");
        Ok(self.adopt(&user_id, collection))
    }

    pub async fn unsave(&self, listing_id: &str) -> Result<Vec<SavedListing>, AccountError> {
        let user_id = self.user_id()?;
        let collection = self.api.unsave_listing(&user_id, listing_id).await?;
        info!(user_id = %user_id, listing_id, "Removed saved listing");
        Ok(self.adopt(&user_id, collection))
    }

    pub async fn refresh(&self) -> Result<Vec<SavedListing>, AccountError> {
        let user_id = self.user_id()?;
        let collection = self.api.saved_listings(&user_id).await?;
        Ok(self.adopt(&user_id, collection))
    }

    fn user_id(&self) -> Result<String, AccountError> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.user_id.clone())
            .ok_or(AccountError::NotAuthenticated)
    }

    /// Adopts the API's collection, unless the session changed while the call was
    /// in flight. The session read lock is held across the write so that a
    /// concurrent `set_session` cannot clear in between.
    fn adopt(&self, user_id: &str, collection: Vec<SavedListing>) -> Vec<SavedListing> {
        let session = self.session.read();
        let still_current = session
            .as_ref()
            .map_or(false, |session| session.user_id == user_id);
        if !still_current {
            debug!(user_id, "Session changed during account call, discarding saved listings");
            return collection;
        }
        debug!(count = collection.len(), "Adopting saved listings from account API");
        *self.saved.write() = collection.clone();
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::fixtures::listing;
    use crate::listing::ListingType;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Keeps its own collection, like the real account service
    struct InMemoryAccountApi {
        saved: Mutex<Vec<SavedListing>>,
        calls: AtomicUsize,
        delay_ms: u64,
    }

    impl InMemoryAccountApi {
        fn new() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                delay_ms: 0,
            }
        }

        fn with_delay(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::new()
            }
        }

        async fn simulate_latency(&self) {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
        }
    }

    #[async_trait]
    impl AccountApi for InMemoryAccountApi {
        async fn save_listing(
            &self,
            _user_id: &str,
            saved: &SavedListing,
        ) -> Result<Vec<SavedListing>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            let mut all = self.saved.lock();
            all.retain(|s| s.listing_id != saved.listing_id);
            all.push(saved.clone());
            Ok(all.clone())
        }

        async fn unsave_listing(
            &self,
            _user_id: &str,
            listing_id: &str,
        ) -> Result<Vec<SavedListing>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            let mut all = self.saved.lock();
            all.retain(|s| s.listing_id != listing_id);
            Ok(all.clone())
        }

        async fn saved_listings(&self, _user_id: &str) -> Result<Vec<SavedListing>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            Ok(self.saved.lock().clone())
        }
    }

    fn session(user_id: &str) -> Option<Session> {
        Some(Session {
            user_id: user_id.to_string(),
            email: None,
        })
    }

    #[tokio::test]
    async fn test_save_requires_session() {
        let api = Arc::new(InMemoryAccountApi::new());
        let store = AccountStore::new(api.clone());

        let err = store
            .save(&listing("A", ListingType::Rent, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotAuthenticated));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_save_and_unsave_adopt_api_collection() {
        let api = Arc::new(InMemoryAccountApi::new());
        let store = AccountStore::new(api.clone());
        store.set_session(session("u1"));

        store.save(&listing("A", ListingType::Rent, 1.0)).await.unwrap();
        store.save(&listing("B", ListingType::Sale, 2.0)).await.unwrap();
        assert!(store.is_saved("A"));
        assert!(store.is_saved("B"));

        let remaining = store.unsave("A").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(!store.is_saved("A"));
        assert_eq!(
            store.saved()[0].listing().unwrap(),
            listing("B", ListingType::Sale, 2.0)
        );
    }

    #[tokio::test]
    async fn test_collection_is_replaced_not_merged() {
        let api = Arc::new(InMemoryAccountApi::new());
        let store = AccountStore::new(api.clone());
        store.set_session(session("u1"));
        store.save(&listing("A", ListingType::Rent, 1.0)).await.unwrap();

        // Removed elsewhere (another device)
        api.saved.lock().clear();

        store.refresh().await.unwrap();
        assert!(store.saved().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_clears_saved() {
        let api = Arc::new(InMemoryAccountApi::new());
        let store = AccountStore::new(api);
        store.set_session(session("u1"));
        store.save(&listing("A", ListingType::Rent, 1.0)).await.unwrap();

        store.set_session(session("u1"));
        assert!(store.is_saved("A"));

        store.set_session(None);
        assert!(store.saved().is_empty());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_user_switch_during_save_discards_response() {
        let api = Arc::new(InMemoryAccountApi::with_delay(50));
        let store = AccountStore::new(api.clone());
        store.set_session(session("u1"));

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.set_session(session("u2"));
        };
        let a = listing("A", ListingType::Rent, 1.0);
        let (saved, _) = tokio::join!(store.save(&a), switch);

        // The call itself succeeded for u1
        assert_eq!(saved.unwrap().len(), 1);
        assert_eq!(store.session().unwrap().user_id, "u2");
        assert!(store.saved().is_empty());
        assert!(!store.is_saved("A"));
    }

    #[tokio::test]
    async fn test_sign_out_during_refresh_discards_response() {
        let api = Arc::new(InMemoryAccountApi::with_delay(50));
        let store = AccountStore::new(api.clone());
        store.set_session(session("u1"));
        api.saved
            .lock()
            .push(SavedListing::from_listing("u1", &listing("A", ListingType::Rent, 1.0)).unwrap());

        let sign_out = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.set_session(None);
        };
        let (refreshed, _) = tokio::join!(store.refresh(), sign_out);

        assert!(refreshed.is_ok());
        assert!(store.saved().is_empty());
    }

    #[tokio::test]
    async fn test_http_account_api_unsave_route() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/u7/saved/L3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "saved_listings": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let api = HttpAccountApi::new(&AccountConfig {
            base_url: server.uri(),
        });

        let remaining = api.unsave_listing("u7", "L3").await.unwrap();
        assert!(remaining.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method.as_str(), "DELETE");
    }

    #[tokio::test]
    async fn test_http_account_api_save_posts_snapshot() {
        let server = MockServer::start().await;
        let saved = SavedListing::from_listing("u7", &listing("L3", ListingType::Sale, 5.0)).unwrap();
        Mock::given(method("POST"))
            .and(path("/users/u7/saved"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "saved_listings": [saved] })),
            )
            .mount(&server)
            .await;
        let api = HttpAccountApi::new(&AccountConfig {
            base_url: server.uri(),
        });

        let collection = api.save_listing("u7", &saved).await.unwrap();
        assert_eq!(collection, vec![saved.clone()]);

        let requests = server.received_requests().await.unwrap();
        let sent: SavedListing = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent, saved);
    }

    #[tokio::test]
    async fn test_http_account_api_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u7/saved"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\":true}"))
            .mount(&server)
            .await;
        let api = HttpAccountApi::new(&AccountConfig {
            base_url: server.uri(),
        });

        let err = api.saved_listings("u7").await.unwrap_err();
        assert!(matches!(err, ProviderError::Schema(_)));
    }
}
