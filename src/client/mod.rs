//! HTTP clients for the remote data services
//!
//! Both services are plain JSON-over-HTTP APIs without authentication. A
//! single `reqwest` client is shared by every sensor; it carries the request
//! timeout and the user agent.

pub mod meteo_france;
pub mod waze;

pub use meteo_france::{MeteoFranceClient, RainForecast};
pub use waze::WazeRouteCalculator;

use crate::config::HttpConfig;
use crate::error::{FetchError, Result, SensorError};
use crate::services::ResolvedLocation;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Routing service region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Us,
    Na,
    Eu,
    Il,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Na => "NA",
            Self::Eu => "EU",
            Self::Il => "IL",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "US" => Ok(Self::Us),
            "NA" => Ok(Self::Na),
            "EU" => Ok(Self::Eu),
            "IL" => Ok(Self::Il),
            other => Err(SensorError::invalid_input(format!(
                "Unknown region '{other}', expected one of US, NA, EU, IL"
            ))),
        }
    }
}

/// One candidate route, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    /// Route label as reported by the service
    pub name: String,
    pub duration_minutes: f64,
    pub distance_km: f64,
}

impl RouteInfo {
    pub fn new<S: Into<String>>(name: S, duration_minutes: f64, distance_km: f64) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
            distance_km,
        }
    }
}

/// Remote route calculation
#[async_trait]
pub trait RouteCalculator: Send + Sync {
    /// Ranked routes from `origin` to `destination`
    async fn calculate_routes(
        &self,
        origin: &ResolvedLocation,
        destination: &ResolvedLocation,
        region: Region,
    ) -> std::result::Result<Vec<RouteInfo>, FetchError>;
}

/// Build the shared HTTP client
pub fn build_http_client(config: &HttpConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| SensorError::config(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and hand back the response if its status is 2xx
pub(crate) async fn send_checked(
    request: RequestBuilder,
) -> std::result::Result<Response, FetchError> {
    let response = request.send().await?;
    debug!(status = response.status().as_u16(), url = %response.url(), "HTTP response");
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::connection(format!("HTTP error {status}")));
    }
    Ok(response)
}
