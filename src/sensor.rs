//! Sensor facade and the polling cycle behind it
//!
//! A [`PolledSensor`] glues one [`DataSource`] to the shared machinery:
//! throttle gate, location resolution, bounded fetch and last-known-good
//! cache. The host only sees the [`Sensor`] trait.

use crate::error::{ErrorReporter, FetchError};
use crate::host::EntityLookup;
use crate::services::{
    Attempt, Attributes, Clock, DataCache, FetchResult, SensorSnapshot, SensorState, Throttle,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Normalized payload of one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Value,
    pub attributes: Attributes,
}

/// Platform-specific half of a sensor: how to turn configuration and host
/// state into request parameters, and how to fetch
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Params: Send + 'static;

    /// Platform identifier used in logs
    fn platform(&self) -> &'static str;

    fn unit(&self) -> Option<&'static str>;

    fn icon(&self) -> Option<&'static str>;

    /// Resolve dynamic inputs against the current host state
    fn resolve(&self, lookup: &dyn EntityLookup) -> Result<Self::Params, FetchError>;

    /// One request/response exchange with the remote service
    async fn fetch(&self, params: Self::Params) -> Result<Reading, FetchError>;
}

/// Read-only view of a sensor for the host
#[async_trait]
pub trait Sensor: Send + Sync {
    fn name(&self) -> String;

    /// Primary value; [`SensorState::Unknown`] until the first success
    fn state(&self) -> SensorState;

    fn unit_of_measurement(&self) -> Option<String>;

    fn icon(&self) -> Option<&str>;

    /// Attributes of the last success
    fn attributes(&self) -> Attributes;

    fn snapshot(&self) -> SensorSnapshot;

    /// Run one fetch cycle unless throttled
    async fn refresh(&self) -> Attempt<FetchResult>;

    /// Run one fetch cycle regardless of the throttle window
    async fn force_refresh(&self) -> Attempt<FetchResult>;
}

/// Sensor built from a [`DataSource`]
pub struct PolledSensor<S: DataSource> {
    name: String,
    source: S,
    lookup: Arc<dyn EntityLookup>,
    clock: Arc<dyn Clock>,
    throttle: Throttle,
    timeout: Duration,
    cache: DataCache,
}

impl<S: DataSource> PolledSensor<S> {
    pub fn new<N: Into<String>>(
        name: N,
        source: S,
        lookup: Arc<dyn EntityLookup>,
        clock: Arc<dyn Clock>,
        min_interval: Duration,
        timeout: Duration,
    ) -> Self {
        let name = name.into();
        let cache = DataCache::new(name.clone(), source.unit().map(str::to_string));
        Self {
            name,
            source,
            lookup,
            clock,
            throttle: Throttle::new(min_interval),
            timeout,
            cache,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    async fn fetch_once(&self) -> Result<Reading, FetchError> {
        let params = self.source.resolve(self.lookup.as_ref())?;
        match tokio::time::timeout(self.timeout, self.source.fetch(params)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::timeout(format!(
                "no response within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }

    async fn run_cycle(&self) -> FetchResult {
        let started = Instant::now();
        let result = match self.fetch_once().await {
            Ok(reading) => FetchResult::success(
                reading.value,
                self.source.unit().map(str::to_string),
                reading.attributes,
            ),
            Err(error) => {
                ErrorReporter::log_fetch_failure(&self.name, &error);
                FetchResult::failure(error)
            }
        };

        debug!(
            sensor = self.name.as_str(),
            platform = self.source.platform(),
            success = result.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch cycle finished"
        );
        self.cache.store(result.clone());
        result
    }
}

#[async_trait]
impl<S: DataSource> Sensor for PolledSensor<S> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn state(&self) -> SensorState {
        self.cache.current().state
    }

    fn unit_of_measurement(&self) -> Option<String> {
        self.cache.current().unit
    }

    fn icon(&self) -> Option<&str> {
        self.source.icon()
    }

    fn attributes(&self) -> Attributes {
        self.cache.current().attributes
    }

    fn snapshot(&self) -> SensorSnapshot {
        self.cache.current()
    }

    async fn refresh(&self) -> Attempt<FetchResult> {
        self.throttle
            .attempt(self.clock.now(), || self.run_cycle())
            .await
    }

    async fn force_refresh(&self) -> Attempt<FetchResult> {
        info!(sensor = self.name.as_str(), "Forced refresh");
        self.throttle
            .attempt_now(self.clock.now(), || self.run_cycle())
            .await
    }
}
