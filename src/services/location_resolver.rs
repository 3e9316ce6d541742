//! Entity location resolution
//!
//! Turns a configured [`LocationReference`] into a [`ResolvedLocation`] that a
//! remote API can consume. Tracked entities move, zones get renamed and
//! entities disappear, so resolution runs on every fetch cycle against the
//! current host state and never caches its output.

use crate::error::ResolutionError;
use crate::host::{EntityLookup, EntityState};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Entity domains whose ids are treated as tracked entities
pub const TRACKABLE_DOMAINS: [&str; 3] = ["device_tracker", "sensor", "zone"];

/// Domain of zone entities
pub const ZONE_DOMAIN: &str = "zone";

/// Domain whose raw state may itself be a location
pub const SENSOR_DOMAIN: &str = "sensor";

/// Attribute keys carrying a location
pub const ATTR_LATITUDE: &str = "latitude";
pub const ATTR_LONGITUDE: &str = "longitude";

fn coordinate_pattern() -> &'static Regex {
    static COORDINATE_REGEX: OnceLock<Regex> = OnceLock::new();
    COORDINATE_REGEX.get_or_init(|| {
        Regex::new(r"^([-+]?\d{1,2}[.]\d+),\s*([-+]?\d{1,3}[.]\d+)$")
            .expect("coordinate pattern is valid")
    })
}

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parse a `"lat,lon"` string. Only the strict decimal form is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let captures = coordinate_pattern().captures(value.trim())?;
        let lat = captures.get(1)?.as_str().parse().ok()?;
        let lon = captures.get(2)?.as_str().parse().ok()?;
        Some(Self { lat, lon })
    }
}

/// Decimal degrees, always with a fractional part so the text form matches
/// the coordinate pattern (`48.0`, never `48`)
pub struct Degrees(pub f64);

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", Degrees(self.lat), Degrees(self.lon))
    }
}

/// Symbolic location as configured by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LocationReference {
    /// Fixed coordinates
    RawCoordinate(Coordinates),
    /// Friendly name of a zone; passed through literally when no zone matches
    NamedZone(String),
    /// Host entity id (`device_tracker.phone`, `sensor.location`, `zone.work`)
    TrackedEntityId(String),
    /// Opaque string handed to the remote API as is
    FreeformAddress(String),
}

impl LocationReference {
    /// Classify a configuration string.
    ///
    /// Coordinates win over everything else, then entity ids of a trackable
    /// domain. Any other string is treated as a zone name, which degrades to a
    /// free-form address when no zone of that name exists.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let Some(coordinates) = Coordinates::parse(value) {
            return Self::RawCoordinate(coordinates);
        }

        let (domain, object_id) = crate::host::split_entity_id(value);
        if !object_id.is_empty() && TRACKABLE_DOMAINS.contains(&domain) {
            return Self::TrackedEntityId(value.to_string());
        }

        Self::NamedZone(value.to_string())
    }
}

impl fmt::Display for LocationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawCoordinate(coordinates) => write!(f, "{coordinates}"),
            Self::NamedZone(name) => write!(f, "zone name '{name}'"),
            Self::TrackedEntityId(id) => write!(f, "entity {id}"),
            Self::FreeformAddress(address) => write!(f, "{address}"),
        }
    }
}

/// Query token for a remote API, recomputed every cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedLocation {
    Coordinates(Coordinates),
    Text(String),
}

impl ResolvedLocation {
    /// Token as sent to the remote service
    pub fn as_query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates(coordinates) => write!(f, "{coordinates}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Resolve a location reference against the current host state
pub fn resolve(
    reference: &LocationReference,
    lookup: &dyn EntityLookup,
) -> Result<ResolvedLocation, ResolutionError> {
    match reference {
        LocationReference::RawCoordinate(coordinates) => {
            Ok(ResolvedLocation::Coordinates(*coordinates))
        }
        LocationReference::FreeformAddress(address) => Ok(ResolvedLocation::Text(address.clone())),
        LocationReference::NamedZone(name) => Ok(resolve_zone_name(name, lookup)),
        LocationReference::TrackedEntityId(entity_id) => resolve_entity(entity_id, lookup),
    }
}

fn resolve_entity(
    entity_id: &str,
    lookup: &dyn EntityLookup,
) -> Result<ResolvedLocation, ResolutionError> {
    let entity = lookup
        .get(entity_id)
        .ok_or_else(|| ResolutionError::EntityNotFound(entity_id.to_string()))?;

    if let Some(coordinates) = entity.coordinates() {
        return Ok(ResolvedLocation::Coordinates(coordinates));
    }

    // Entity has no position of its own; its state may name the zone it is in
    if let Some(zone) = lookup.get(&format!("{ZONE_DOMAIN}.{}", entity.state)) {
        if let Some(coordinates) = zone.coordinates() {
            debug!(
                entity_id = entity_id,
                zone = zone.entity_id.as_str(),
                "Entity is in zone, using zone location"
            );
            return Ok(ResolvedLocation::Coordinates(coordinates));
        }
    }

    if entity.domain() == SENSOR_DOMAIN {
        return Ok(resolve_zone_name(&entity.state, lookup));
    }

    Err(ResolutionError::NoLocationData(entity_id.to_string()))
}

/// Find a zone by display name, falling back to the literal name
fn resolve_zone_name(name: &str, lookup: &dyn EntityLookup) -> ResolvedLocation {
    lookup
        .all()
        .iter()
        .filter(|entity| entity.domain() == ZONE_DOMAIN && entity.name() == name)
        .find_map(EntityState::coordinates)
        .map(ResolvedLocation::Coordinates)
        .unwrap_or_else(|| ResolvedLocation::Text(name.to_string()))
}
