//! Waze travel time platform
//!
//! Travel time in minutes between two locations, either of which may be a
//! moving entity. Both ends are re-resolved on every cycle.

use super::{PlatformContext, ATTR_ATTRIBUTION};
use crate::client::{Region, RouteCalculator, WazeRouteCalculator};
use crate::config::WazeTravelTimeConfig;
use crate::error::{FetchError, Result};
use crate::host::{EntityLookup, SensorRegistrar};
use crate::sensor::{DataSource, PolledSensor, Reading, Sensor};
use crate::services::{resolve, Attributes, LocationReference, ResolvedLocation};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ATTRIBUTION: &str = "Data provided by the Waze.com";
pub const ATTR_DISTANCE: &str = "distance";
pub const ATTR_ROUTE: &str = "route";
pub const ATTR_DURATION: &str = "duration";
pub const ATTR_ORIGIN: &str = "origin";
pub const ATTR_DESTINATION: &str = "destination";
pub const ICON: &str = "mdi:car";
pub const UNIT: &str = "min";

/// Repair a route label that was decoded as Latin-1 although it is UTF-8.
///
/// Returns `None` when the label holds a code point above U+00FF or the
/// re-encoded bytes are not valid UTF-8.
pub fn repair_route_label(label: &str) -> Option<String> {
    let bytes = label
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// Route label as shown to the user; kept as received when it cannot be
/// repaired
pub fn transcode_route_label(label: &str) -> String {
    match repair_route_label(label) {
        Some(repaired) => repaired,
        None => {
            warn!(route = label, "Route label is not Latin-1 encoded UTF-8, keeping it as is");
            label.to_string()
        }
    }
}

/// Resolved ends of a route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub origin: ResolvedLocation,
    pub destination: ResolvedLocation,
}

/// Travel time between two locations
pub struct TravelTimeSource {
    calculator: Arc<dyn RouteCalculator>,
    origin: LocationReference,
    destination: LocationReference,
    region: Region,
}

impl TravelTimeSource {
    pub fn new(
        calculator: Arc<dyn RouteCalculator>,
        origin: LocationReference,
        destination: LocationReference,
        region: Region,
    ) -> Self {
        Self {
            calculator,
            origin,
            destination,
            region,
        }
    }
}

#[async_trait]
impl DataSource for TravelTimeSource {
    type Params = RouteQuery;

    fn platform(&self) -> &'static str {
        "waze_travel_time"
    }

    fn unit(&self) -> Option<&'static str> {
        Some(UNIT)
    }

    fn icon(&self) -> Option<&'static str> {
        Some(ICON)
    }

    fn resolve(&self, lookup: &dyn EntityLookup) -> std::result::Result<RouteQuery, FetchError> {
        Ok(RouteQuery {
            origin: resolve(&self.origin, lookup)?,
            destination: resolve(&self.destination, lookup)?,
        })
    }

    async fn fetch(&self, query: RouteQuery) -> std::result::Result<Reading, FetchError> {
        debug!(
            origin = %query.origin,
            destination = %query.destination,
            region = %self.region,
            "Update in progress"
        );
        let routes = self
            .calculator
            .calculate_routes(&query.origin, &query.destination, self.region)
            .await?;
        let best = routes.into_iter().next().ok_or_else(|| {
            FetchError::no_route(format!("{} -> {}", query.origin, query.destination))
        })?;

        let attributes = Attributes::from([
            (ATTR_ATTRIBUTION.to_string(), Value::from(ATTRIBUTION)),
            (
                ATTR_DISTANCE.to_string(),
                Value::from(best.distance_km.round_ties_even() as i64),
            ),
            (
                ATTR_ROUTE.to_string(),
                Value::from(transcode_route_label(&best.name)),
            ),
            (ATTR_DURATION.to_string(), Value::from(best.duration_minutes)),
            (ATTR_ORIGIN.to_string(), Value::from(query.origin.as_query())),
            (
                ATTR_DESTINATION.to_string(),
                Value::from(query.destination.as_query()),
            ),
        ]);

        Ok(Reading {
            value: Value::from(best.duration_minutes.round_ties_even() as i64),
            attributes,
        })
    }
}

/// Build the travel time sensor around any route calculator
pub fn build_sensor(
    config: &WazeTravelTimeConfig,
    ctx: &PlatformContext,
    calculator: Arc<dyn RouteCalculator>,
) -> PolledSensor<TravelTimeSource> {
    let source = TravelTimeSource::new(
        calculator,
        LocationReference::parse(&config.origin),
        LocationReference::parse(&config.destination),
        config.region,
    );
    PolledSensor::new(
        config.name.clone(),
        source,
        ctx.lookup.clone(),
        ctx.clock.clone(),
        config.scan_interval,
        ctx.http_config.timeout,
    )
}

/// Set up the travel time sensor backed by the Waze live map
pub async fn setup_platform(
    config: &WazeTravelTimeConfig,
    ctx: &PlatformContext,
    registrar: &dyn SensorRegistrar,
) -> Result<()> {
    let calculator = Arc::new(WazeRouteCalculator::new(
        ctx.http.clone(),
        config.base_url.clone(),
    ));
    setup_with_calculator(config, ctx, calculator, registrar).await
}

/// Set up the travel time sensor with a given route calculator. The sensor
/// is refreshed once as it is registered.
pub async fn setup_with_calculator(
    config: &WazeTravelTimeConfig,
    ctx: &PlatformContext,
    calculator: Arc<dyn RouteCalculator>,
    registrar: &dyn SensorRegistrar,
) -> Result<()> {
    let sensor: Arc<dyn Sensor> = Arc::new(build_sensor(config, ctx, calculator));
    registrar.add_sensors(vec![sensor], true).await;
    Ok(())
}
