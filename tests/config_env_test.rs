//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so each test sets every variable it asserts on.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use galaxy_agent::config::{Config, LogFormat, DEFAULT_IWC_MANIFEST_URL};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_galaxy_credentials() {
    env::set_var("GALAXY_URL", "https://usegalaxy.eu");
    env::set_var("GALAXY_API_KEY", "abc123");

    let config = Config::from_env().unwrap();
    assert_eq!(config.galaxy.url.as_deref(), Some("https://usegalaxy.eu"));
    assert_eq!(config.galaxy.api_key.as_deref(), Some("abc123"));

    env::remove_var("GALAXY_URL");
    env::remove_var("GALAXY_API_KEY");
}

#[test]
#[serial]
fn test_config_from_env_blank_credentials_are_unset() {
    env::set_var("GALAXY_URL", "   ");
    env::set_var("GALAXY_API_KEY", "");

    let config = Config::from_env().unwrap();
    assert!(config.galaxy.url.is_none());
    assert!(config.galaxy.api_key.is_none());

    env::remove_var("GALAXY_URL");
    env::remove_var("GALAXY_API_KEY");
}

#[test]
#[serial]
fn test_config_from_env_rejects_non_http_url() {
    env::set_var("GALAXY_URL", "ftp://usegalaxy.org");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("GALAXY_URL"));

    env::remove_var("GALAXY_URL");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    // Restore default
    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_unknown_log_format_is_pretty() {
    env::set_var("LOG_FORMAT", "xml");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    // Restore defaults
    env::set_var("REQUEST_TIMEOUT_MS", "30000");
    env::set_var("MAX_RETRIES", "2");
    env::set_var("RETRY_DELAY_MS", "500");
}

#[test]
#[serial]
fn test_config_from_env_invalid_numbers_fall_back() {
    env::set_var("REQUEST_TIMEOUT_MS", "soon");
    env::set_var("MAX_RETRIES", "-1");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.request.max_retries, 2);

    env::set_var("REQUEST_TIMEOUT_MS", "30000");
    env::set_var("MAX_RETRIES", "2");
}

#[test]
#[serial]
fn test_config_from_env_methods_timeout() {
    env::set_var("METHODS_TIMEOUT_MS", "120000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.methods.timeout_ms, Some(120000));

    env::remove_var("METHODS_TIMEOUT_MS");

    let config = Config::from_env().unwrap();
    assert_eq!(config.methods.timeout_ms, None);
}

#[test]
#[serial]
fn test_config_from_env_iwc_manifest() {
    env::set_var("IWC_MANIFEST_URL", "http://localhost:9000/manifest.json");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.iwc.manifest_url,
        "http://localhost:9000/manifest.json"
    );

    env::remove_var("IWC_MANIFEST_URL");

    let config = Config::from_env().unwrap();
    assert_eq!(config.iwc.manifest_url, DEFAULT_IWC_MANIFEST_URL);
}
