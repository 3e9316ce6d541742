//! Narrow interfaces to the host automation framework
//!
//! The core never reaches into global host state. Everything it needs from
//! the host comes through [`EntityLookup`] (reading entity states) and
//! [`SensorRegistrar`] (handing finished sensors back). In-memory
//! implementations of both are provided for embedding and testing.

pub mod sensor_registry;
pub mod state_registry;

pub use sensor_registry::{SensorRegistrar, SensorRegistry};
pub use state_registry::StateRegistry;

use crate::services::location_resolver::{Coordinates, ATTR_LATITUDE, ATTR_LONGITUDE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding an entity's display name
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";

/// Split `domain.object_id`; ids without a dot have an empty object id
pub fn split_entity_id(entity_id: &str) -> (&str, &str) {
    entity_id.split_once('.').unwrap_or((entity_id, ""))
}

/// Snapshot of one host entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn new<I: Into<String>, S: Into<String>>(entity_id: I, state: S) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_location(self, lat: f64, lon: f64) -> Self {
        self.with_attribute(ATTR_LATITUDE, Value::from(lat))
            .with_attribute(ATTR_LONGITUDE, Value::from(lon))
    }

    pub fn domain(&self) -> &str {
        split_entity_id(&self.entity_id).0
    }

    pub fn object_id(&self) -> &str {
        split_entity_id(&self.entity_id).1
    }

    /// Display name: the friendly name attribute, else the object id with
    /// underscores as spaces
    pub fn name(&self) -> String {
        self.attributes
            .get(ATTR_FRIENDLY_NAME)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.object_id().replace('_', " "))
    }

    /// Position of the entity, if both coordinates are numeric
    pub fn coordinates(&self) -> Option<Coordinates> {
        let lat = self.attributes.get(ATTR_LATITUDE)?.as_f64()?;
        let lon = self.attributes.get(ATTR_LONGITUDE)?.as_f64()?;
        Some(Coordinates::new(lat, lon))
    }
}

/// Read access to the host's entity states
pub trait EntityLookup: Send + Sync {
    /// Current state of one entity
    fn get(&self, entity_id: &str) -> Option<EntityState>;

    /// Current state of every entity
    fn all(&self) -> Vec<EntityState>;
}
