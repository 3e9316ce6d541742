//! Météo-France rain forecast platform

use super::{PlatformContext, ATTR_ATTRIBUTION};
use crate::client::MeteoFranceClient;
use crate::config::{MeteoFranceConfig, DEFAULT_METEO_FRANCE_NAME};
use crate::error::{FetchError, Result, SensorError};
use crate::host::{EntityLookup, SensorRegistrar};
use crate::sensor::{DataSource, PolledSensor, Reading, Sensor};
use crate::services::{resolve, Attempt, Attributes, FetchResult, LocationReference};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

pub const ATTRIBUTION: &str = "Data provided by the Meteo France";
pub const ATTR_LOCATION_ID: &str = "location_id";
pub const ICON: &str = "mdi:weather-rainy";

/// Sensor type label appended to the configured name
const SENSOR_LABEL: &str = "Rain forecast";

/// Rain forecast for one Météo-France location
pub struct RainForecastSource {
    client: MeteoFranceClient,
    location: LocationReference,
}

impl RainForecastSource {
    pub fn new<S: Into<String>>(client: MeteoFranceClient, location_id: S) -> Self {
        Self {
            client,
            location: LocationReference::FreeformAddress(location_id.into()),
        }
    }
}

#[async_trait]
impl DataSource for RainForecastSource {
    type Params = String;

    fn platform(&self) -> &'static str {
        "meteo_france"
    }

    fn unit(&self) -> Option<&'static str> {
        None
    }

    fn icon(&self) -> Option<&'static str> {
        Some(ICON)
    }

    fn resolve(&self, lookup: &dyn EntityLookup) -> std::result::Result<String, FetchError> {
        Ok(resolve(&self.location, lookup)?.as_query())
    }

    async fn fetch(&self, location_id: String) -> std::result::Result<Reading, FetchError> {
        let payload = self.client.fetch_forecast(&location_id).await?.into_payload();

        let mut attributes: Attributes = payload
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        attributes.insert(ATTR_ATTRIBUTION.to_string(), Value::from(ATTRIBUTION));
        attributes.insert(ATTR_LOCATION_ID.to_string(), Value::from(location_id));

        Ok(Reading {
            value: Value::Object(payload),
            attributes,
        })
    }
}

/// `"{prefix} Rain forecast"`
pub fn sensor_name(prefix: Option<&str>) -> String {
    format!(
        "{} {SENSOR_LABEL}",
        prefix.unwrap_or(DEFAULT_METEO_FRANCE_NAME)
    )
}

/// Build the rain forecast sensor without touching the network
pub fn build_sensor(
    config: &MeteoFranceConfig,
    ctx: &PlatformContext,
) -> PolledSensor<RainForecastSource> {
    let client = MeteoFranceClient::new(ctx.http.clone(), config.base_url.clone());
    PolledSensor::new(
        sensor_name(config.name.as_deref()),
        RainForecastSource::new(client, config.location_id.clone()),
        ctx.lookup.clone(),
        ctx.clock.clone(),
        config.scan_interval,
        ctx.http_config.timeout,
    )
}

/// Set up the rain forecast sensor.
///
/// The first fetch happens here. An unparseable payload aborts setup and
/// nothing is registered; any other failure registers the sensor in the
/// unknown state.
pub async fn setup_platform(
    config: &MeteoFranceConfig,
    ctx: &PlatformContext,
    registrar: &dyn SensorRegistrar,
) -> Result<()> {
    let sensor = build_sensor(config, ctx);

    if let Attempt::Completed(FetchResult::Failure { reason, .. }) = sensor.refresh().await {
        if reason.is_parse_error() {
            error!(
                location_id = config.location_id.as_str(),
                "Received error from Meteo France: {reason}"
            );
            return Err(SensorError::setup(format!(
                "Meteo France location {}: {reason}",
                config.location_id
            )));
        }
    }

    info!(
        location_id = config.location_id.as_str(),
        "Meteo France rain forecast ready"
    );
    let sensor: Arc<dyn Sensor> = Arc::new(sensor);
    registrar.add_sensors(vec![sensor], false).await;
    Ok(())
}
