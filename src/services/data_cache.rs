//! Last-known-good cache for polled sensor data
//!
//! Holds the most recent successful reading and the outcome of the most
//! recent attempt. A failure flags the sensor but never replaces a value that
//! was fetched successfully before.

use crate::error::FetchError;
use crate::utils::{safe_read, safe_write};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, trace};

/// Display-ready attributes keyed by name
pub type Attributes = BTreeMap<String, Value>;

/// Outcome of one fetch cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResult {
    Success {
        value: Value,
        unit: Option<String>,
        attributes: Attributes,
        timestamp: DateTime<Utc>,
    },
    Failure {
        reason: FetchError,
        timestamp: DateTime<Utc>,
    },
}

impl FetchResult {
    pub fn success(value: Value, unit: Option<String>, attributes: Attributes) -> Self {
        Self::Success {
            value,
            unit,
            attributes,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(reason: FetchError) -> Self {
        Self::Failure {
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Success { timestamp, .. } | Self::Failure { timestamp, .. } => *timestamp,
        }
    }
}

/// Primary sensor value; `Unknown` until the first success
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SensorState {
    #[default]
    Unknown,
    Value(Value),
}

impl SensorState {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Unknown => None,
            Self::Value(value) => Some(value),
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Value(Value::String(text)) => write!(f, "{text}"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for SensorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_str("unknown"),
            Self::Value(value) => value.serialize(serializer),
        }
    }
}

/// Externally visible state of a sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub name: String,
    pub state: SensorState,
    pub unit: Option<String>,
    pub attributes: Attributes,
    /// Reason the most recent attempt failed, cleared by the next success
    pub last_error: Option<FetchError>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Cache behind one sensor
#[derive(Debug)]
pub struct DataCache {
    snapshot: RwLock<SensorSnapshot>,
}

impl DataCache {
    /// Empty cache; `unit` is reported until a success brings its own
    pub fn new<S: Into<String>>(name: S, unit: Option<String>) -> Self {
        Self {
            snapshot: RwLock::new(SensorSnapshot {
                name: name.into(),
                state: SensorState::Unknown,
                unit,
                attributes: Attributes::new(),
                last_error: None,
                last_success: None,
                last_attempt: None,
            }),
        }
    }

    /// Record the outcome of a fetch cycle
    pub fn store(&self, result: FetchResult) {
        let mut snapshot = safe_write(&self.snapshot, "data cache");
        match result {
            FetchResult::Success {
                value,
                unit,
                attributes,
                timestamp,
            } => {
                trace!(sensor = snapshot.name.as_str(), "Caching successful reading");
                snapshot.state = SensorState::Value(value);
                if unit.is_some() {
                    snapshot.unit = unit;
                }
                snapshot.attributes = attributes;
                snapshot.last_error = None;
                snapshot.last_success = Some(timestamp);
                snapshot.last_attempt = Some(timestamp);
            }
            FetchResult::Failure { reason, timestamp } => {
                debug!(
                    sensor = snapshot.name.as_str(),
                    stale = !snapshot.state.is_unknown(),
                    "Keeping previous reading after failure"
                );
                snapshot.last_error = Some(reason);
                snapshot.last_attempt = Some(timestamp);
            }
        }
    }

    pub fn current(&self) -> SensorSnapshot {
        safe_read(&self.snapshot, "data cache").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(value: Value) -> FetchResult {
        let mut attributes = Attributes::new();
        attributes.insert("route".to_string(), json!("I-95"));
        FetchResult::success(value, Some("min".to_string()), attributes)
    }

    #[test]
    fn test_unknown_before_first_success() {
        let cache = DataCache::new("Commute", Some("min".to_string()));
        let snapshot = cache.current();

        assert!(snapshot.state.is_unknown());
        assert_eq!(snapshot.state.to_string(), "unknown");
        assert_eq!(snapshot.unit.as_deref(), Some("min"));
        assert!(snapshot.attributes.is_empty());
        assert!(snapshot.last_attempt.is_none());
    }

    #[test]
    fn test_failure_keeps_previous_success() {
        let cache = DataCache::new("Commute", None);
        cache.store(reading(json!(42)));
        let good = cache.current();

        cache.store(FetchResult::failure(FetchError::no_route("empty route set")));
        let after = cache.current();

        assert_eq!(after.state, SensorState::Value(json!(42)));
        assert_eq!(after.attributes, good.attributes);
        assert_eq!(after.last_success, good.last_success);
        assert!(after.has_error());
        assert!(after.last_attempt >= good.last_attempt);
    }

    #[test]
    fn test_success_clears_error() {
        let cache = DataCache::new("Rain", None);
        cache.store(FetchResult::failure(FetchError::timeout("10s elapsed")));
        assert!(cache.current().has_error());
        assert!(cache.current().state.is_unknown());

        cache.store(reading(json!(7)));
        let snapshot = cache.current();
        assert!(!snapshot.has_error());
        assert_eq!(snapshot.state.to_string(), "7");
        assert!(snapshot.last_success.is_some());
    }

    #[test]
    fn test_snapshot_serialization() {
        let cache = DataCache::new("Rain", None);
        let json = serde_json::to_value(cache.current()).unwrap();
        assert_eq!(json["state"], json!("unknown"));
        assert_eq!(json["last_error"], Value::Null);
    }
}
