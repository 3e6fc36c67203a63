// Listing cache store
//
// Holds, per listing type, a deduplicated insertion-ordered sequence of listings and a
// pagination cursor, plus the last individually resolved listing. All mutation goes
// through `merge_listings` and the fetch paths built on it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::dedup::dedup_by_key;
use crate::error::FetchError;
use crate::listing::{Listing, ListingType, PaginationCursor};
use crate::provider::{ListingsProvider, PageQuery};
use crate::storage::{KeyValueStorage, StoreSnapshot};

/// Result of folding one page into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub total: usize,
    pub page_num: u32,
}

type PageFetch = Shared<BoxFuture<'static, Result<MergeOutcome, FetchError>>>;

struct StoreState {
    listings: HashMap<ListingType, Vec<Listing>>,
    pagination: HashMap<ListingType, PaginationCursor>,
    current_listing: Option<Listing>,
}

impl StoreState {
    fn new(page_size: u32) -> Self {
        let mut listings = HashMap::new();
        let mut pagination = HashMap::new();
        for listing_type in ListingType::ALL {
            listings.insert(listing_type, Vec::new());
            pagination.insert(listing_type, PaginationCursor::new(page_size));
        }
        Self {
            listings,
            pagination,
            current_listing: None,
        }
    }

    fn cursor(&self, listing_type: ListingType) -> PaginationCursor {
        self.pagination
            .get(&listing_type)
            .copied()
            .unwrap_or_else(|| PaginationCursor::new(0))
    }

    // Returns the outcome and whether the current listing was refreshed
    fn merge(&mut self, listing_type: ListingType, new: Vec<Listing>) -> (MergeOutcome, bool) {
        let existing = self.listings.remove(&listing_type).unwrap_or_default();
        let before = existing.len();

        let refreshed = match &self.current_listing {
            Some(current) if current.listing_type == listing_type => new
                .iter()
                .rev()
                .find(|listing| listing.id == current.id)
                .cloned(),
            _ => None,
        };
        let refreshed = match refreshed {
            Some(listing) if self.current_listing.as_ref() != Some(&listing) => {
                self.current_listing = Some(listing);
                true
            }
            _ => false,
        };

        let merged = dedup_by_key(existing.into_iter().chain(new), |listing| listing.id.clone());
        let added = merged.len().saturating_sub(before);
        let total = merged.len();
        self.listings.insert(listing_type, merged);

        let cursor = self
            .pagination
            .entry(listing_type)
            .or_insert_with(|| PaginationCursor::new(0));
        cursor.current_count += added;
        cursor.page_num += 1;

        (
            MergeOutcome {
                added,
                total,
                page_num: cursor.page_num,
            },
            refreshed,
        )
    }
}

pub struct ListingStore {
    state: Arc<Mutex<StoreState>>,
    in_flight: Arc<Mutex<HashMap<ListingType, PageFetch>>>,
    provider: Arc<dyn ListingsProvider>,
    storage: Option<Arc<dyn KeyValueStorage>>,
    config: StoreConfig,
}

impl ListingStore {
    pub fn new(provider: Arc<dyn ListingsProvider>, config: StoreConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::new(config.page_size))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            provider,
            storage: None,
            config,
        }
    }

    /// Builds a store whose current listing is restored from, and written back to, `storage`.
    pub fn with_storage(
        provider: Arc<dyn ListingsProvider>,
        config: StoreConfig,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let mut store = Self::new(provider, config);

        match StoreSnapshot::load(storage.as_ref(), &store.config.storage_bucket) {
            Ok(Some(snapshot)) => {
                debug!(
                    restored = snapshot.current_listing.is_some(),
                    "Restored listing store snapshot"
                );
                store.state.lock().current_listing = snapshot.current_listing;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable listing store snapshot"),
        }

        store.storage = Some(storage);
        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn listings(&self, listing_type: ListingType) -> Vec<Listing> {
        self.state
            .lock()
            .listings
            .get(&listing_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pagination(&self, listing_type: ListingType) -> PaginationCursor {
        self.state.lock().cursor(listing_type)
    }

    pub fn current_listing(&self) -> Option<Listing> {
        self.state.lock().current_listing.clone()
    }

    /// Appends a page to the cache for `listing_type`, deduplicating by id.
    ///
    /// The page number advances by one on every call, including empty pages.
    pub fn merge_listings(&self, listing_type: ListingType, new: Vec<Listing>) -> MergeOutcome {
        let outcome = {
            let mut state = self.state.lock();
            let (outcome, refreshed) = state.merge(listing_type, new);
            if refreshed {
                self.persist_current(&state);
            }
            outcome
        };

        debug!(
            %listing_type,
            added = outcome.added,
            total = outcome.total,
            page_num = outcome.page_num,
            "Merged listings page"
        );
        outcome
    }

    /// Requests the next page for `listing_type` and merges it.
    ///
    /// Calls for a type that already has a request in flight wait on that request
    /// instead of issuing a second one, so both observe the same outcome. A failed
    /// request leaves the cache and cursor untouched.
    pub async fn fetch_next_page(&self, listing_type: ListingType) -> Result<MergeOutcome, FetchError> {
        let fetch = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&listing_type) {
                Some(pending) => {
                    debug!(%listing_type, "Joining in-flight page request");
                    pending.clone()
                }
                None => {
                    let fetch = self.page_request(listing_type);
                    in_flight.insert(listing_type, fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn page_request(&self, listing_type: ListingType) -> PageFetch {
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        let provider = Arc::clone(&self.provider);
        let storage = self.storage.clone();
        let bucket = self.config.storage_bucket.clone();
        let category = self.config.category;

        async move {
            let query = {
                let cursor = state.lock().cursor(listing_type);
                PageQuery {
                    listing_type,
                    category,
                    page_size: cursor.page_size,
                    page_num: cursor.page_num,
                }
            };

            let result = match provider.fetch_page(&query).await {
                Ok(listings) => {
                    let outcome = {
                        let mut state = state.lock();
                        let (outcome, refreshed) = state.merge(listing_type, listings);
                        match &storage {
                            Some(storage) if refreshed => {
                                write_snapshot(storage.as_ref(), &bucket, &state)
                            }
                            _ => {}
                        }
                        outcome
                    };
                    info!(
                        %listing_type,
                        page_num = query.page_num,
                        added = outcome.added,
                        total = outcome.total,
                        "Listings page merged"
                    );
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(
                        %listing_type,
                        page_num = query.page_num,
                        error = %err,
                        "Listings page request failed"
                    );
                    Err(FetchError::from_provider(
                        &err,
                        listing_type,
                        format!("page {}", query.page_num),
                    ))
                }
            };

            in_flight.lock().remove(&listing_type);
            result
        }
        .boxed()
        .shared()
    }

    /// Looks a listing up in the cache.
    ///
    /// The current listing answers directly; otherwise the type's sequence is scanned
    /// and a hit becomes the new current listing.
    pub fn listing(&self, listing_type: ListingType, listing_id: &str) -> Option<Listing> {
        let mut state = self.state.lock();
        if let Some(current) = &state.current_listing {
            if current.id == listing_id && current.listing_type == listing_type {
                return Some(current.clone());
            }
        }

        let hit = state
            .listings
            .get(&listing_type)?
            .iter()
            .find(|listing| listing.id == listing_id)
            .cloned()?;
        state.current_listing = Some(hit.clone());
        self.persist_current(&state);
        Some(hit)
    }

    /// Like `listing`, but falls back to the provider's detail endpoint on a cache miss.
    ///
    /// A listing found this way becomes the current listing without joining the
    /// paginated sequence.
    pub async fn resolve_listing(
        &self,
        listing_type: ListingType,
        listing_id: &str,
    ) -> Result<Option<Listing>, FetchError> {
        if let Some(listing) = self.listing(listing_type, listing_id) {
            return Ok(Some(listing));
        }

        let fetched = self
            .provider
            .fetch_listing(listing_type, listing_id)
            .await
            .map_err(|err| {
                warn!(%listing_type, listing_id, error = %err, "Listing detail request failed");
                FetchError::from_provider(&err, listing_type, format!("listing {}", listing_id))
            })?;

        if let Some(listing) = &fetched {
            let mut state = self.state.lock();
            state.current_listing = Some(listing.clone());
            self.persist_current(&state);
        }
        Ok(fetched)
    }

    // Callers hold the state lock so snapshot writes land in the same order as the
    // in-memory updates
    fn persist_current(&self, state: &StoreState) {
        if let Some(storage) = &self.storage {
            write_snapshot(storage.as_ref(), &self.config.storage_bucket, state);
        }
    }
}

fn write_snapshot(storage: &dyn KeyValueStorage, bucket: &str, state: &StoreState) {
    let snapshot = StoreSnapshot {
        current_listing: state.current_listing.clone(),
    };
    if let Err(e) = snapshot.save(storage, bucket) {
        warn!(error = %e, bucket, "Failed to persist listing store snapshot");
    }
}
