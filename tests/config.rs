use std::time::Duration;

use assert_matches::assert_matches;

use seqremote::config::{Config, ConfigLoader, ConfigOverrides, DEFAULT_BASE_URL};
use seqremote::error::SeqRemoteError;

#[test]
fn missing_key_everywhere_is_a_configuration_error() {
    let err = ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default())
        .unwrap_err();
    assert_matches!(err, SeqRemoteError::MissingApiKey);
}

#[test]
fn env_key_beats_file_key() {
    let config = Config {
        api_key: Some("file-key".to_string()),
        ..Config::default()
    };
    let overrides = ConfigOverrides {
        api_key: None,
        env_api_key: Some("env-key".to_string()),
    };
    let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
    assert_eq!(resolved.client.api_key, "env-key");
}

#[test]
fn blank_env_key_falls_through_to_file() {
    let config = Config {
        api_key: Some("file-key".to_string()),
        ..Config::default()
    };
    let overrides = ConfigOverrides {
        api_key: None,
        env_api_key: Some("  ".to_string()),
    };
    let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
    assert_eq!(resolved.client.api_key, "file-key");
}

#[test]
fn read_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "api_key": "abc123",
            "base_url": "http://localhost:9000/api/v0/",
            "request_timeout_secs": 5,
            "registration_wait_secs": 0
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.client.api_key, "abc123");
    assert_eq!(resolved.client.base_url, "http://localhost:9000/api/v0");
    assert_eq!(resolved.client.request_timeout, Duration::from_secs(5));
    assert_eq!(resolved.registration_wait, Duration::ZERO);
    assert_ne!(resolved.client.base_url, DEFAULT_BASE_URL);
}

#[test]
fn explicit_missing_file_fails() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SeqRemoteError::ConfigRead(_));
}

#[test]
fn malformed_file_fails() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, SeqRemoteError::ConfigParse(_));
}
