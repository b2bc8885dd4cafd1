use std::time::Duration;

use reactive_harness::{bundled_fixture_dir, HarnessConfig, TestScope, DEFAULT_API_BASE_URL};

#[test]
fn defaults_match_the_bundled_setup() {
    let config = HarnessConfig::default();

    assert_eq!(config.default_timeout, Duration::from_secs(1));
    assert_eq!(config.fixture_dir, bundled_fixture_dir());
    assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    assert!(config.fixture_dir.join("bands.json").exists());
}

#[test]
fn builders_override_each_setting() {
    let config = HarnessConfig::new()
        .with_default_timeout(Duration::from_millis(250))
        .with_fixture_dir("/tmp/fixtures")
        .with_api_base_url("http://localhost:8080")
        .with_request_timeout(Duration::from_secs(3));

    assert_eq!(config.default_timeout, Duration::from_millis(250));
    assert_eq!(config.fixture_dir, std::path::PathBuf::from("/tmp/fixtures"));
    assert_eq!(config.api_base_url, "http://localhost:8080");
    assert_eq!(config.request_timeout, Duration::from_secs(3));

    let scope = TestScope::with_config(config);
    assert_eq!(scope.config().default_timeout, Duration::from_millis(250));
}
