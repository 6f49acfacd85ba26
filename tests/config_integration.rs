//! Configuration integration tests for Aurora.
//!
//! Exercises load, save, migration and validation against temporary files so
//! the real config is never touched.

use aurora_lib::config::{load_from_path, save_to_path, Config, ConfigError, FixedLocation};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Load / Save
// =============================================================================

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_from_path(&temp_dir.path().join("config.json")).unwrap();

    assert_eq!(config.keywords.keywords, vec!["aurora", "help", "emergency"]);
    assert_eq!(config.alert.cool_down_secs, 10);
    assert_eq!(config.recognition.restart_delay_ms, 100);
    assert!(config.recognition.continuous);
}

#[test]
fn test_save_and_reload_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.keywords.keywords = vec!["mayday".to_string()];
    config.alert.cool_down_secs = 30;
    config.notification.api_key = Some("secret".to_string());
    config.location.fixed = Some(FixedLocation {
        lat: -33.8688,
        lng: 151.2093,
    });
    save_to_path(&path, &config).unwrap();

    let loaded = load_from_path(&path).unwrap();
    assert_eq!(loaded.keywords.keywords, vec!["mayday"]);
    assert_eq!(loaded.alert.cool_down_secs, 30);
    assert_eq!(loaded.notification.api_key.as_deref(), Some("secret"));
    assert_eq!(loaded.location.fixed, config.location.fixed);
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"version": 1, "alert": {"cool_down_secs": 20}}"#).unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.alert.cool_down_secs, 20);
    assert!(config.alert.share_location);
    assert_eq!(config.recognition.language, "en-US");
    assert_eq!(config.notification.timeout_secs, 30);
}

#[test]
fn test_invalid_json_is_a_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(load_from_path(&path), Err(ConfigError::Parse(_))));
}

// =============================================================================
// Migrations
// =============================================================================

#[test]
fn test_v0_keywords_are_normalised_and_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"version": 0, "keywords": {"keywords": ["  HELP ", "Aurora", ""]}}"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.version, 1);
    assert_eq!(config.keywords.keywords, vec!["help", "aurora"]);

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], 1);
}

#[test]
fn test_future_version_is_left_alone() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"version": 7}"#).unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.version, 7);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_bounds() {
    assert!(Config::default().validate().is_ok());

    let mut config = Config::default();
    config.alert.cool_down_secs = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::default();
    config.alert.cool_down_secs = 301;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.recognition.restart_delay_ms = 5001;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.notification.endpoint = "ftp://example.com/alert".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.notification.endpoint =
        "https://example.supabase.co/functions/v1/send-emergency-alert".to_string();
    assert!(config.validate().is_ok());
}
