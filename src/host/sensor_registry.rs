//! Registration of finished sensors with the host

use crate::sensor::Sensor;
use crate::services::SensorSnapshot;
use crate::utils::safe_mutex_lock;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Host side of platform setup
#[async_trait]
pub trait SensorRegistrar: Send + Sync {
    /// Hand sensors to the host; with `update_before_add` each one is
    /// refreshed once before it becomes visible
    async fn add_sensors(&self, sensors: Vec<Arc<dyn Sensor>>, update_before_add: bool);
}

/// In-memory registrar
#[derive(Default)]
pub struct SensorRegistry {
    sensors: Mutex<Vec<Arc<dyn Sensor>>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sensors(&self) -> Vec<Arc<dyn Sensor>> {
        safe_mutex_lock(&self.sensors, "sensor registry").clone()
    }

    pub fn len(&self) -> usize {
        safe_mutex_lock(&self.sensors, "sensor registry").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of every registered sensor, in registration order
    pub fn snapshots(&self) -> Vec<SensorSnapshot> {
        self.sensors().iter().map(|sensor| sensor.snapshot()).collect()
    }

    /// Refresh every sensor once; throttled sensors are left alone
    pub async fn refresh_all(&self) {
        for sensor in self.sensors() {
            sensor.refresh().await;
        }
    }
}

#[async_trait]
impl SensorRegistrar for SensorRegistry {
    async fn add_sensors(&self, sensors: Vec<Arc<dyn Sensor>>, update_before_add: bool) {
        if update_before_add {
            for sensor in &sensors {
                sensor.refresh().await;
            }
        }

        let mut registered = safe_mutex_lock(&self.sensors, "sensor registry");
        for sensor in sensors {
            info!(sensor = sensor.name().as_str(), "Sensor registered");
            registered.push(sensor);
        }
    }
}
