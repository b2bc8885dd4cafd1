use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding [`HarnessConfig::api_base_url`].
pub const API_BASE_URL_ENV: &str = "REACTIVE_HARNESS_API_BASE_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Settings shared by a [`TestScope`](crate::TestScope) and the resolvers it drives.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// How long `capture` waits for a terminal notification.
    pub default_timeout: Duration,
    /// Directory holding `<name>.json` fixtures.
    pub fixture_dir: PathBuf,
    /// Base URL that relative API paths are joined onto.
    pub api_base_url: String,
    /// Upper bound for a single HTTP request, connection included.
    pub request_timeout: Duration,
}

impl HarnessConfig {
    /// Defaults: one second captures, the bundled fixtures, the public placeholder API.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(1),
            fixture_dir: bundled_fixture_dir(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Defaults, with the API base URL taken from the environment when set.
    pub fn from_env() -> Self {
        let config = Self::new();
        match std::env::var(API_BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => config.with_api_base_url(url.trim()),
            _ => config,
        }
    }

    /// Override the capture timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Read fixtures from another directory.
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = dir.into();
        self
    }

    /// Point API requests at another host.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Override the per-request HTTP timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The `fixtures/` directory shipped with this crate.
pub fn bundled_fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}
