// Configuration for the provider client, the cache store and the account API

use std::env;

use reqwest::Url;

use crate::error::ConfigError;
use crate::listing::ListingCategory;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub search_path: String,
    pub detail_path: String,
    // JSON pointer to the listing array inside a search response
    pub listings_pointer: String,
    // JSON pointer to the listing object inside a detail response
    pub detail_pointer: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            search_path: "/listings/search".to_string(),
            detail_path: "/listings/:listing_id".to_string(),
            listings_pointer: "/data/listings".to_string(),
            detail_pointer: "/data".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub page_size: u32,
    pub category: Option<ListingCategory>,
    // Storage bucket holding the persisted current-listing snapshot
    pub storage_bucket: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            category: None,
            storage_bucket: "listings-store".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub base_url: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    pub account: AccountConfig,
}

impl AppConfig {
    /// Defaults overridden by `LISTINGS_API_BASE_URL`, `LISTINGS_PAGE_SIZE`,
    /// `LISTINGS_POINTER` and `ACCOUNT_API_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(base_url) = lookup("LISTINGS_API_BASE_URL") {
            config.provider.base_url = absolute_url("LISTINGS_API_BASE_URL", base_url)?;
        }
        if let Some(pointer) = lookup("LISTINGS_POINTER") {
            config.provider.listings_pointer = pointer;
        }
        if let Some(page_size) = lookup("LISTINGS_PAGE_SIZE") {
            config.store.page_size = match page_size.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "LISTINGS_PAGE_SIZE",
                        value: page_size,
                    })
                }
            };
        }
        if let Some(base_url) = lookup("ACCOUNT_API_BASE_URL") {
            config.account.base_url = absolute_url("ACCOUNT_API_BASE_URL", base_url)?;
        }

        Ok(config)
    }
}

fn absolute_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if !url.cannot_be_a_base() => Ok(value),
        _ => Err(ConfigError::InvalidUrl { name, value }),
    }
}
