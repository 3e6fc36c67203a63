// Listings provider client
// Builds search requests through the path client and validates the provider payload
// at the boundary, so malformed data is reported instead of silently defaulted.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::http_path::{HttpPathClient, RequestSpec};
use crate::listing::{Listing, ListingCategory, ListingType};

pub const SEARCH_ROUTE: &str = "search_listings";
pub const DETAIL_ROUTE: &str = "listing_detail";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub listing_type: ListingType,
    pub category: Option<ListingCategory>,
    pub page_size: u32,
    pub page_num: u32,
}

#[async_trait]
pub trait ListingsProvider: Send + Sync + 'static {
    // One page of listings for the given type
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Listing>, ProviderError>;

    // A single listing by id; Ok(None) when the provider does not know it
    async fn fetch_listing(
        &self,
        listing_type: ListingType,
        listing_id: &str,
    ) -> Result<Option<Listing>, ProviderError>;
}

pub struct HttpListingsProvider {
    http: HttpPathClient,
    config: ProviderConfig,
}

impl HttpListingsProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let http = HttpPathClient::new(config.base_url.clone())
            .with_route(SEARCH_ROUTE, config.search_path.clone())
            .with_route(DETAIL_ROUTE, config.detail_path.clone());
        Self { http, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl ListingsProvider for HttpListingsProvider {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Listing>, ProviderError> {
        let page_size = query.page_size.to_string();
        let page_num = query.page_num.to_string();
        let mut params = vec![
            ("listing_type", query.listing_type.as_str()),
            ("page_size", page_size.as_str()),
            ("page_num", page_num.as_str()),
        ];
        if let Some(category) = query.category {
            params.push(("category", category.as_str()));
        }

        let url = self.http.path(SEARCH_ROUTE, &[], &params)?;
        let response = self.http.get(RequestSpec::new(url)).await?;
        let body = expect_success(response).await?;
        let listings = parse_listings(&body, &self.config.listings_pointer, query.listing_type)?;

        info!(
            listing_type = %query.listing_type,
            page_num = query.page_num,
            count = listings.len(),
            "Fetched listings page"
        );
        Ok(listings)
    }

    async fn fetch_listing(
        &self,
        listing_type: ListingType,
        listing_id: &str,
    ) -> Result<Option<Listing>, ProviderError> {
        let url = self
            .http
            .path(DETAIL_ROUTE, &[("listing_id", listing_id)], &[])?;
        let response = self.http.get(RequestSpec::new(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%listing_type, listing_id, "Listing not found at provider");
            return Ok(None);
        }

        let body = expect_success(response).await?;
        let listing = parse_listing(&body, &self.config.detail_pointer)?;
        if listing.id != listing_id {
            return Err(ProviderError::Schema(format!(
                "requested listing {}, provider returned {}",
                listing_id, listing.id
            )));
        }
        if listing.listing_type != listing_type {
            return Err(ProviderError::Schema(format!(
                "listing {} is {}, expected {}",
                listing.id, listing.listing_type, listing_type
            )));
        }
        Ok(Some(listing))
    }
}

/// Reads the body of a 2xx response; anything else becomes `ProviderError::Status`.
pub(crate) async fn expect_success(response: Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "Provider returned non-success status");
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Extracts and validates the listing array at `pointer` (a JSON pointer such as `/data/listings`).
pub fn parse_listings(
    body: &str,
    pointer: &str,
    expected_type: ListingType,
) -> Result<Vec<Listing>, ProviderError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Schema(format!("body is not JSON: {}", e)))?;
    let entries = root
        .pointer(pointer)
        .ok_or_else(|| ProviderError::Schema(format!("missing {}", pointer)))?
        .as_array()
        .ok_or_else(|| ProviderError::Schema(format!("{} is not an array", pointer)))?;

    let mut listings = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let listing = decode_listing(entry)
            .map_err(|reason| ProviderError::Schema(format!("entry {}: {}", idx, reason)))?;
        if listing.listing_type != expected_type {
            return Err(ProviderError::Schema(format!(
                "entry {}: listing {} is {}, expected {}",
                idx, listing.id, listing.listing_type, expected_type
            )));
        }
        listings.push(listing);
    }

    Ok(listings)
}

pub fn parse_listing(body: &str, pointer: &str) -> Result<Listing, ProviderError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Schema(format!("body is not JSON: {}", e)))?;
    let entry = root
        .pointer(pointer)
        .ok_or_else(|| ProviderError::Schema(format!("missing {}", pointer)))?;
    decode_listing(entry).map_err(ProviderError::Schema)
}

fn decode_listing(entry: &Value) -> Result<Listing, String> {
    let listing = Listing::deserialize(entry).map_err(|e| e.to_string())?;
    if listing.id.trim().is_empty() {
        return Err("listing id is empty".to_string());
    }
    Ok(listing)
}
