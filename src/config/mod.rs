//! Configuration for the sensor platforms
//!
//! Loaded with the `config` crate from an optional file plus `POLLSENSE_*`
//! environment overrides (`POLLSENSE_HTTP__TIMEOUT=30s`). Sensors are listed
//! as a `[[sensors]]` array tagged by `platform`.

use crate::client::meteo_france::DEFAULT_BASE_URL as METEO_FRANCE_URL;
use crate::client::waze::WAZE_URL;
use crate::client::Region;
use crate::error::{Result, SensorError};
use crate::logging::LogConfig;
use crate::utils::parse_url_safe;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "POLLSENSE";

/// Default name of the rain forecast sensor prefix
pub const DEFAULT_METEO_FRANCE_NAME: &str = "Meteo France";

/// Default name of the travel time sensor
pub const DEFAULT_WAZE_NAME: &str = "Waze Travel Time";

/// Browser-like agent; the routing service rejects unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:60.0) Gecko/20100101 Firefox/60.0";

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_meteo_france_url() -> Url {
    METEO_FRANCE_URL.parse().unwrap()
}

fn default_waze_url() -> Url {
    WAZE_URL.parse().unwrap()
}

fn default_waze_name() -> String {
    DEFAULT_WAZE_NAME.to_string()
}

/// Outbound HTTP settings shared by all sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Upper bound for a single request
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Météo-France rain forecast platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteoFranceConfig {
    /// Météo-France location identifier
    pub location_id: String,

    /// Prefix of the sensor name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_meteo_france_url")]
    pub base_url: Url,

    /// Minimum time between two requests
    #[serde(with = "humantime_serde", default = "default_scan_interval")]
    pub scan_interval: Duration,
}

impl MeteoFranceConfig {
    pub fn new<S: Into<String>>(location_id: S) -> Self {
        Self {
            location_id: location_id.into(),
            name: None,
            base_url: default_meteo_france_url(),
            scan_interval: default_scan_interval(),
        }
    }
}

/// Waze travel time platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WazeTravelTimeConfig {
    /// Coordinates, entity id or zone name / address
    pub origin: String,

    pub destination: String,

    pub region: Region,

    #[serde(default = "default_waze_name")]
    pub name: String,

    #[serde(default = "default_waze_url")]
    pub base_url: Url,

    #[serde(with = "humantime_serde", default = "default_scan_interval")]
    pub scan_interval: Duration,
}

impl WazeTravelTimeConfig {
    pub fn new<O: Into<String>, D: Into<String>>(origin: O, destination: D, region: Region) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            region,
            name: default_waze_name(),
            base_url: default_waze_url(),
            scan_interval: default_scan_interval(),
        }
    }
}

/// One configured sensor platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum SensorConfig {
    MeteoFrance(MeteoFranceConfig),
    WazeTravelTime(WazeTravelTimeConfig),
}

impl SensorConfig {
    pub fn platform(&self) -> &'static str {
        match self {
            Self::MeteoFrance(_) => "meteo_france",
            Self::WazeTravelTime(_) => "waze_travel_time",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LogConfig,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl AppConfig {
    /// Load from an optional file plus environment overrides, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Loading configuration from {path:?}");
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::finish(builder)
    }

    /// Load from TOML text plus environment overrides, then validate
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::finish(Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout.is_zero() {
            return Err(SensorError::config("HTTP timeout must be greater than zero"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(SensorError::config("User agent cannot be empty"));
        }
        self.logging.level()?;

        for (index, sensor) in self.sensors.iter().enumerate() {
            let context = format!("sensors[{index}] ({})", sensor.platform());
            match sensor {
                SensorConfig::MeteoFrance(cfg) => {
                    if cfg.location_id.trim().is_empty() {
                        return Err(SensorError::config(format!(
                            "{context}: location_id cannot be empty"
                        )));
                    }
                    parse_url_safe(cfg.base_url.as_str(), &context)?;
                }
                SensorConfig::WazeTravelTime(cfg) => {
                    if cfg.origin.trim().is_empty() || cfg.destination.trim().is_empty() {
                        return Err(SensorError::config(format!(
                            "{context}: origin and destination cannot be empty"
                        )));
                    }
                    if cfg.name.trim().is_empty() {
                        return Err(SensorError::config(format!("{context}: name cannot be empty")));
                    }
                    parse_url_safe(cfg.base_url.as_str(), &context)?;
                }
            }
        }

        Ok(())
    }
}
