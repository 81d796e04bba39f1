//! Configuration for the presence agent.

use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use presence_common::Coordinate;
use serde::Deserialize;

/// Main configuration structure for the presence agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of the local user this agent acts for.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Id of the local user in the store (as assigned by the auth provider).
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store, optionally seeded from a JSON file.
    #[default]
    Memory,
    /// Realtime database REST endpoint.
    Rest,
}

/// Presence store connection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Realtime database root URL (rest backend).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Database auth token, sent as the `auth` query parameter (rest backend).
    #[serde(default)]
    pub auth_token: Option<String>,
    /// JSON file with a `users` collection to preload (memory backend).
    #[serde(default)]
    pub seed_file: Option<String>,
    /// Delay before background listeners re-attach after a failure.
    #[serde(default = "default_resubscribe_delay")]
    pub resubscribe_delay_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_url: None,
            auth_token: None,
            seed_file: None,
            resubscribe_delay_secs: default_resubscribe_delay(),
        }
    }
}

/// Local device location.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    /// Fix to start from until the device pushes one.
    #[serde(default)]
    pub initial_latitude: Option<f64>,
    #[serde(default)]
    pub initial_longitude: Option<f64>,
    /// How often the location source is polled.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Write own fixes into the user record.
    #[serde(default = "default_true")]
    pub publish: bool,
}

impl LocationConfig {
    pub fn initial_fix(&self) -> Option<Coordinate> {
        match (self.initial_latitude, self.initial_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            initial_latitude: None,
            initial_longitude: None,
            poll_interval_ms: default_poll_interval(),
            publish: default_true(),
        }
    }
}

/// Tracking session defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Center shown while the target has no position.
    #[serde(default = "default_fallback_latitude")]
    pub fallback_latitude: f64,
    #[serde(default = "default_fallback_longitude")]
    pub fallback_longitude: f64,
}

impl TrackingConfig {
    pub fn fallback_center(&self) -> Coordinate {
        Coordinate::new(self.fallback_latitude, self.fallback_longitude)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fallback_latitude: default_fallback_latitude(),
            fallback_longitude: default_fallback_longitude(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8090
}
fn default_resubscribe_delay() -> u64 {
    5
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_fallback_latitude() -> f64 {
    presence_tracker::viewport::DEFAULT_FALLBACK_CENTER.latitude
}
fn default_fallback_longitude() -> f64 {
    presence_tracker::viewport::DEFAULT_FALLBACK_CENTER.longitude
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (AGENT__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location.poll_interval_ms)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_secs(self.store.resubscribe_delay_secs)
    }

    /// Same as [`Config::load`] with an explicit config file name (extension optional).
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("AGENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
