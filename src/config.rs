//! Configuration management for Aurora
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.aurora/config.json` and cached in memory
//! after the first load.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Longest cool-down accepted on save (seconds)
const MAX_COOL_DOWN_SECS: u64 = 300;

/// Longest restart delay accepted on save (milliseconds)
const MAX_RESTART_DELAY_MS: u64 = 5000;

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Speech recognition session settings
    pub recognition: RecognitionConfig,
    /// Emergency keyword settings
    pub keywords: KeywordConfig,
    /// Alert cycle settings
    pub alert: AlertConfig,
    /// Notification provider settings
    pub notification: NotificationConfig,
    /// Location settings
    pub location: LocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            recognition: RecognitionConfig::default(),
            keywords: KeywordConfig::default(),
            alert: AlertConfig::default(),
            notification: NotificationConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP 47 language tag passed to the speech engine
    pub language: String,
    /// Keep the session running (and restart it) instead of one-shot capture
    pub continuous: bool,
    /// Deliver interim results so keywords match before the utterance ends
    pub interim_results: bool,
    /// Delay before restarting an ended session, in milliseconds
    pub restart_delay_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
            restart_delay_ms: 100,
        }
    }
}

impl RecognitionConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Emergency keyword configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Trigger phrases, matched in this order
    pub keywords: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                "aurora".to_string(),
                "help".to_string(),
                "emergency".to_string(),
            ],
        }
    }
}

/// Alert cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Seconds from keyword match until the machine returns to listening
    pub cool_down_secs: u64,
    /// Include the last known GPS fix in alerts
    pub share_location: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cool_down_secs: 10,
            share_location: true,
        }
    }
}

impl AlertConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down_secs)
    }
}

/// Notification provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// URL of the send-emergency-alert endpoint
    pub endpoint: String,
    /// Optional bearer token sent with each dispatch
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321/functions/v1/send-emergency-alert".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// A static coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Location configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Ask the source for its most accurate fix
    pub high_accuracy: bool,
    /// One-shot request timeout in milliseconds
    pub timeout_ms: u64,
    /// Oldest cached fix accepted for a one-shot request, in milliseconds
    pub maximum_age_ms: u64,
    /// Watch timeout in milliseconds
    pub watch_timeout_ms: u64,
    /// Oldest cached fix accepted while watching, in milliseconds
    pub watch_maximum_age_ms: u64,
    /// Static position used when no positioning hardware is available
    pub fixed: Option<FixedLocation>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 60_000,
            watch_timeout_ms: 30_000,
            watch_maximum_age_ms: 10_000,
            fixed: None,
        }
    }
}

impl Config {
    /// Check values that would break the pipeline at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alert.cool_down_secs == 0 {
            return Err(ConfigError::Invalid(
                "Cool-down must be greater than 0".to_string(),
            ));
        }
        if self.alert.cool_down_secs > MAX_COOL_DOWN_SECS {
            return Err(ConfigError::Invalid(format!(
                "Cool-down cannot exceed {} seconds",
                MAX_COOL_DOWN_SECS
            )));
        }
        if self.recognition.restart_delay_ms > MAX_RESTART_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "Restart delay cannot exceed {} milliseconds",
                MAX_RESTART_DELAY_MS
            )));
        }

        let endpoint = url::Url::parse(&self.notification.endpoint).map_err(|e| {
            ConfigError::Invalid(format!(
                "Invalid notification endpoint '{}': {}",
                self.notification.endpoint, e
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "Notification endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        Ok(())
    }
}

/// Get the path to the config file (~/.aurora/config.json)
pub fn get_config_path() -> PathBuf {
    home_dir_or_fallback().join(".aurora").join("config.json")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from a file, running migrations if needed.
///
/// A missing file yields the defaults.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("Config file not found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        save_to_path(path, &migrated)?;
    }

    Ok(migrated)
}

/// Save configuration to a file, creating the parent directory
pub fn save_to_path(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;

    tracing::info!("Config saved to {:?}", path);
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: keywords were stored with their original casing
        0 => {
            let mut migrated = config;
            migrated.keywords.keywords = migrated
                .keywords
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = load_from_path(&get_config_path()).unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        RwLock::new(config)
    })
}

/// Get the current configuration
pub fn get_config() -> Config {
    get_config_instance().read().clone()
}

/// Replace the configuration and persist it to disk
pub fn set_config(mut config: Config) -> Result<(), ConfigError> {
    config.version = CURRENT_VERSION;
    config.validate()?;

    save_to_path(&get_config_path(), &config)?;

    let mut cached = get_config_instance().write();
    *cached = config;

    tracing::info!(
        "Configuration updated ({} keywords, cool-down {}s)",
        cached.keywords.keywords.len(),
        cached.alert.cool_down_secs
    );
    Ok(())
}

/// Replace only the keyword list, bypassing the rest of the config
pub fn set_keywords_config(keywords: Vec<String>) -> Result<(), ConfigError> {
    let mut cached = get_config_instance().write();
    cached.keywords.keywords = keywords;
    save_to_path(&get_config_path(), &cached)?;
    tracing::info!(
        "Keyword config updated ({} keywords)",
        cached.keywords.keywords.len()
    );
    Ok(())
}

/// Reset configuration to defaults and persist to disk
pub fn reset_config() -> Result<Config, ConfigError> {
    let default_config = Config::default();

    save_to_path(&get_config_path(), &default_config)?;

    let mut cached = get_config_instance().write();
    *cached = default_config.clone();

    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}
