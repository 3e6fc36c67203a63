// Data core for a property listing client: route templating, the listings provider
// client, the paginated listing cache and the saved-listings account store

pub mod account;
pub mod config;
pub mod dedup;
pub mod error;
pub mod http_path;
pub mod listing;
pub mod provider;
pub mod storage;
pub mod store;

// Re-export key types for convenience
pub use account::{AccountApi, AccountStore, HttpAccountApi, Session};
pub use config::{AccountConfig, AppConfig, ProviderConfig, StoreConfig};
pub use dedup::dedup_by_key;
pub use error::{
    AccountError, ConfigError, FetchError, FetchErrorKind, HttpError, ProviderError, StorageError,
};
pub use http_path::{HttpPathClient, RequestSpec};
pub use listing::{
    AttributeValue, Listing, ListingCategory, ListingType, PaginationCursor, Photo, SavedListing,
};
pub use provider::{HttpListingsProvider, ListingsProvider, PageQuery};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StoreSnapshot};
pub use store::{ListingStore, MergeOutcome};
