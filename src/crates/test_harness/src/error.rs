use std::io;

use thiserror::Error;

/// Result alias for harness setup operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised while setting up resolvers, before any producer runs.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failures surfaced by fixture producers.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture {name}.json not found")]
    NotFound { name: String },
    #[error("failed to read fixture {name}.json: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode fixture {name}.json: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FixtureError {
    /// Name of the fixture that failed.
    pub fn name(&self) -> &str {
        match self {
            FixtureError::NotFound { name }
            | FixtureError::Read { name, .. }
            | FixtureError::Decode { name, .. } => name,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FixtureError::NotFound { .. })
    }
}

/// Failures surfaced by HTTP producers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("cannot find host for {url}")]
    HostNotFound { url: String },
    #[error("{url} unreachable: {message}")]
    Unreachable { url: String, message: String },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// True for transport failures (the request never got a response).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ApiError::HostNotFound { .. } | ApiError::Unreachable { .. }
        )
    }

    /// URL of the request that failed.
    pub fn url(&self) -> &str {
        match self {
            ApiError::InvalidUrl { url, .. }
            | ApiError::HostNotFound { url }
            | ApiError::Unreachable { url, .. }
            | ApiError::Status { url, .. }
            | ApiError::Decode { url, .. } => url,
        }
    }
}
