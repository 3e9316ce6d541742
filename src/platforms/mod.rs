//! Sensor platforms
//!
//! Each platform turns its configuration block into sensors and hands them
//! to a [`SensorRegistrar`].

pub mod meteo_france;
pub mod waze_travel_time;

use crate::client::build_http_client;
use crate::config::{AppConfig, HttpConfig, SensorConfig};
use crate::error::{ErrorContext, ErrorReporter, Result};
use crate::host::{EntityLookup, SensorRegistrar};
use crate::services::{Clock, SystemClock};
use std::sync::Arc;
use tracing::info;

/// Attribute naming the data provider
pub const ATTR_ATTRIBUTION: &str = "attribution";

/// Everything a platform needs from its surroundings
#[derive(Clone)]
pub struct PlatformContext {
    pub lookup: Arc<dyn EntityLookup>,
    pub http: reqwest::Client,
    pub http_config: HttpConfig,
    pub clock: Arc<dyn Clock>,
}

impl PlatformContext {
    pub fn new(lookup: Arc<dyn EntityLookup>, http_config: HttpConfig) -> Result<Self> {
        Ok(Self {
            lookup,
            http: build_http_client(&http_config)?,
            http_config,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Display name of the sensor a configuration block produces
pub fn sensor_name(config: &SensorConfig) -> String {
    match config {
        SensorConfig::MeteoFrance(cfg) => meteo_france::sensor_name(cfg.name.as_deref()),
        SensorConfig::WazeTravelTime(cfg) => cfg.name.clone(),
    }
}

/// Set up every configured platform. A platform that fails is logged and
/// skipped; the number of platforms set up is returned.
pub async fn setup_all(
    config: &AppConfig,
    ctx: &PlatformContext,
    registrar: &dyn SensorRegistrar,
) -> usize {
    let mut ready = 0;
    for sensor in &config.sensors {
        let outcome = match sensor {
            SensorConfig::MeteoFrance(cfg) => meteo_france::setup_platform(cfg, ctx, registrar).await,
            SensorConfig::WazeTravelTime(cfg) => {
                waze_travel_time::setup_platform(cfg, ctx, registrar).await
            }
        };

        match outcome {
            Ok(()) => ready += 1,
            Err(e) => {
                let context = ErrorContext::new(e.to_error_code(), sensor.platform(), "setup_platform")
                    .with_metadata("sensor", sensor_name(sensor));
                ErrorReporter::log_error(&e, Some(context));
            }
        }
    }
    info!("Set up {ready} of {} platforms", config.sensors.len());
    ready
}
