//! Common test utilities: WireMock servers for both remote APIs, a scripted
//! route calculator and host state fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use pollsense::client::{Region, RouteCalculator, RouteInfo};
use pollsense::config::HttpConfig;
use pollsense::host::{EntityLookup, EntityState, StateRegistry, ATTR_FRIENDLY_NAME};
use pollsense::platforms::PlatformContext;
use pollsense::services::{ManualClock, ResolvedLocation};
use pollsense::FetchError;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Request timeout used by test contexts
pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Mock Météo-France site
pub struct MockMeteoFrance {
    pub server: MockServer,
}

impl MockMeteoFrance {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> url::Url {
        self.server.uri().parse().unwrap()
    }

    fn forecast_path(location_id: &str) -> String {
        format!("/mf3-rpc-portlet/rest/pluie/{location_id}/")
    }

    /// Serve a JSON forecast, expecting exactly `hits` requests
    pub async fn mock_forecast(&self, location_id: &str, body: Value, hits: u64) {
        Mock::given(method("GET"))
            .and(path(Self::forecast_path(location_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary response
    pub async fn mock_response(&self, location_id: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(Self::forecast_path(location_id)))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

/// Mock Waze live map
pub struct MockWaze {
    pub server: MockServer,
}

impl MockWaze {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> url::Url {
        self.server.uri().parse().unwrap()
    }

    /// Geocoding answer for one address on the EU search server
    pub async fn mock_geocode(&self, address: &str, candidates: Value) {
        Mock::given(method("GET"))
            .and(path("/row-SearchServer/mozi"))
            .and(query_param("q", address))
            .and(query_param("origin", "livemap"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidates))
            .mount(&self.server)
            .await;
    }

    /// Geocoding must not be reached
    pub async fn forbid_geocode(&self) {
        Mock::given(method("GET"))
            .and(path("/row-SearchServer/mozi"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// Routing answer on the EU routing server
    pub async fn mock_routing(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path("/row-RoutingManager/routingRequest"))
            .and(query_param("nPaths", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

/// Route calculator that replays scripted answers and records its calls
#[derive(Default)]
pub struct FakeRouteCalculator {
    responses: Mutex<VecDeque<Result<Vec<RouteInfo>, FetchError>>>,
    calls: Mutex<Vec<(String, String, Region)>>,
}

impl FakeRouteCalculator {
    pub fn new(responses: Vec<Result<Vec<RouteInfo>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, String, Region)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteCalculator for FakeRouteCalculator {
    async fn calculate_routes(
        &self,
        origin: &ResolvedLocation,
        destination: &ResolvedLocation,
        region: Region,
    ) -> Result<Vec<RouteInfo>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((origin.to_string(), destination.to_string(), region));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::connection("no scripted response")))
    }
}

/// Zone "home" at 48.8,2.3 with a phone tracked inside it
pub fn home_states() -> StateRegistry {
    StateRegistry::from_states([
        EntityState::new("zone.home", "zoning")
            .with_location(48.8, 2.3)
            .with_attribute(ATTR_FRIENDLY_NAME, json!("Home")),
        EntityState::new("device_tracker.phone", "home"),
    ])
}

/// Context with a short timeout and a manual clock
pub fn test_context(lookup: Arc<dyn EntityLookup>, clock: Arc<ManualClock>) -> PlatformContext {
    let http_config = HttpConfig {
        timeout: TEST_TIMEOUT,
        ..HttpConfig::default()
    };
    PlatformContext::new(lookup, http_config)
        .unwrap()
        .with_clock(clock)
}
