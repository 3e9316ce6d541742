//! Throttled remote-data sensors for home automation hosts
//!
//! Two sensor platforms poll third-party web services and expose the last
//! known good value to the host:
//!
//! - Météo-France rain forecast for a location identifier
//! - Waze travel time between two locations, either of which may be a moving
//!   entity tracked by the host
//!
//! Every sensor is a [`sensor::PolledSensor`]: a throttle gate in front of
//! location resolution and a bounded remote fetch, feeding a cache that never
//! lets a failure overwrite a good reading.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod platforms;
pub mod sensor;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use error::{FetchError, Result, SensorError};
pub use sensor::{DataSource, PolledSensor, Reading, Sensor};
