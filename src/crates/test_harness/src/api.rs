use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::HarnessConfig;
use crate::error::{ApiError, HarnessError, HarnessResult};
use crate::models::Post;
use crate::sources::Promise;

/// JSON-over-HTTP resolver rooted at a base URL.
///
/// Every subscription to a producer returned from here performs one blocking
/// GET on its own worker thread.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

impl ApiClient {
    /// Client for `base_url` with the default request timeout.
    pub fn new(base_url: &str) -> HarnessResult<Self> {
        Self::with_request_timeout(base_url, HarnessConfig::default().request_timeout)
    }

    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Self::with_request_timeout(&config.api_base_url, config.request_timeout)
    }

    pub fn with_request_timeout(base_url: &str, timeout: Duration) -> HarnessResult<Self> {
        let mut parsed = Url::parse(base_url).map_err(|source| HarnessError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        // A trailing slash makes `join` append to the base path instead of replacing it.
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        let mut builder = Client::builder().timeout(timeout);
        if is_loopback(&parsed) {
            // Local fake servers are never reachable through a proxy.
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs are used as is.
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidUrl {
                url: path.to_string(),
                message: err.to_string(),
            })
    }

    /// Producer that GETs `path` and decodes the body as `T`.
    pub fn get_json<T>(&self, path: &str) -> Promise<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let target = self.url_for(path);
        let http = self.http.clone();
        Promise::named(format!("http:{path}"), move |resolver| {
            resolver.resolve(target.and_then(|url| fetch(&http, url)))
        })
    }

    /// Producer for a list of posts, e.g. `client.posts("posts")`.
    pub fn posts(&self, path: &str) -> Promise<Vec<Post>, ApiError> {
        self.get_json(path)
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

fn fetch<T: DeserializeOwned>(http: &Client, url: Url) -> Result<T, ApiError> {
    let shown = url.to_string();
    if url.host().is_none() || url.port_or_known_default().is_none() {
        return Err(ApiError::InvalidUrl {
            url: shown,
            message: "no host or port to connect to".to_string(),
        });
    }
    match url.socket_addrs(|| None) {
        Ok(addrs) if !addrs.is_empty() => {}
        _ => return Err(ApiError::HostNotFound { url: shown }),
    }

    tracing::debug!(url = %shown, "GET");
    let response = http.get(url).send().map_err(|err| {
        if err.is_builder() {
            ApiError::InvalidUrl {
                url: shown.clone(),
                message: err.to_string(),
            }
        } else {
            ApiError::Unreachable {
                url: shown.clone(),
                message: err.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(url = %shown, %status, "request rejected");
        return Err(ApiError::Status {
            url: shown,
            status: status.as_u16(),
        });
    }

    let body = response.bytes().map_err(|err| ApiError::Unreachable {
        url: shown.clone(),
        message: err.to_string(),
    })?;
    serde_json::from_slice(&body).map_err(|err| ApiError::Decode {
        url: shown,
        message: err.to_string(),
    })
}
