use thiserror::Error;

use crate::listing::ListingType;

// Errors raised by the path templating / dispatch layer
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request body encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

// Broad classification the UI layer uses to choose between "empty" and "failed" states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    // The request could not be built (bad route or base URL); a configuration problem
    Request,
    Transport,
    Status,
    Schema,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request could not be built: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Schema(String),
}

impl ProviderError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            ProviderError::Request(_) => FetchErrorKind::Request,
            ProviderError::Transport(_) => FetchErrorKind::Transport,
            ProviderError::Status { .. } => FetchErrorKind::Status,
            ProviderError::Schema(_) => FetchErrorKind::Schema,
        }
    }
}

impl From<HttpError> for ProviderError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Transport(e) => ProviderError::Transport(e.to_string()),
            other @ (HttpError::UnknownRoute(_)
            | HttpError::InvalidUrl { .. }
            | HttpError::Encode(_)) => ProviderError::Request(other.to_string()),
        }
    }
}

// Cloneable so a single in-flight page request can report to every waiter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Fetching {listing_type} {target} failed: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub listing_type: ListingType,
    // What was being fetched, e.g. "page 3" or "listing L1"
    pub target: String,
    pub message: String,
}

impl FetchError {
    pub fn from_provider(
        err: &ProviderError,
        listing_type: ListingType,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind: err.kind(),
            listing_type,
            target: target.into(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid bucket name: {0}")]
    InvalidName(String),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("No active session")]
    NotAuthenticated,

    #[error("Account API error: {0}")]
    Api(#[from] ProviderError),

    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be an absolute URL, got {value:?}")]
    InvalidUrl { name: &'static str, value: String },
}
