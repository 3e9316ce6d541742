//! Core polling services
//!
//! Location resolution, the throttle gate and the last-known-good cache that
//! every sensor is assembled from.

pub mod data_cache;
pub mod location_resolver;
pub mod throttle;

pub use data_cache::{Attributes, DataCache, FetchResult, SensorSnapshot, SensorState};
pub use location_resolver::{resolve, Coordinates, Degrees, LocationReference, ResolvedLocation};
pub use throttle::{
    should_attempt, Attempt, Clock, ManualClock, SkipReason, SystemClock, Throttle,
};
