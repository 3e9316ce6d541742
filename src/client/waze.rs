//! Waze live-map route calculator
//!
//! Two-step protocol: free-text addresses are geocoded through the region's
//! search server, then the routing server is asked for up to three
//! alternatives between the two coordinate pairs. Route duration and length
//! are the sums over the route's segments.

use super::{send_checked, Region, RouteCalculator, RouteInfo};
use crate::error::FetchError;
use crate::services::{Coordinates, Degrees, ResolvedLocation};
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Public Waze site, also sent as referer
pub const WAZE_URL: &str = "https://www.waze.com/";

const ROUTE_ALTERNATIVES: u32 = 3;
const ROUTING_TIMEOUT_MS: u32 = 60_000;

/// Server paths and geocoding bias for one region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionServers {
    pub coord_server: &'static str,
    pub routing_server: &'static str,
    pub base_coords: Coordinates,
}

impl RegionServers {
    /// `NA` is served by the `US` servers
    pub fn for_region(region: Region) -> Self {
        match region {
            Region::Us | Region::Na => Self {
                coord_server: "SearchServer/mozi",
                routing_server: "RoutingManager/routingRequest",
                base_coords: Coordinates::new(40.713, -74.006),
            },
            Region::Eu => Self {
                coord_server: "row-SearchServer/mozi",
                routing_server: "row-RoutingManager/routingRequest",
                base_coords: Coordinates::new(47.498, 19.040),
            },
            Region::Il => Self {
                coord_server: "il-SearchServer/mozi",
                routing_server: "il-RoutingManager/routingRequest",
                base_coords: Coordinates::new(31.768, 35.214),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeCandidate {
    #[serde(default)]
    location: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RoutingReply {
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    response: Option<RouteReply>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    response: RouteReply,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteReply {
    #[serde(default)]
    route_name: String,
    #[serde(default)]
    results: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    /// Seconds, including live traffic
    #[serde(default)]
    cross_time: f64,
    /// Metres
    #[serde(default)]
    length: f64,
}

impl RouteReply {
    fn summarize(&self) -> RouteInfo {
        let (seconds, metres) = self
            .results
            .iter()
            .fold((0.0, 0.0), |(t, d), segment| (t + segment.cross_time, d + segment.length));
        RouteInfo::new(self.route_name.clone(), seconds / 60.0, metres / 1000.0)
    }
}

/// Turn a routing reply body into ranked routes.
///
/// Routes sharing a name collapse into one entry that keeps the position of
/// the first and the figures of the last.
pub fn routes_from_reply(body: Value) -> Result<Vec<RouteInfo>, FetchError> {
    if let Some(error) = body.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::no_route(message));
    }

    let reply: RoutingReply = serde_json::from_value(body)?;
    let replies: Vec<RouteReply> = if reply.alternatives.is_empty() {
        reply.response.into_iter().collect()
    } else {
        reply.alternatives.into_iter().map(|alt| alt.response).collect()
    };

    let mut routes: Vec<RouteInfo> = Vec::with_capacity(replies.len());
    for route in replies.iter().map(RouteReply::summarize) {
        match routes.iter_mut().find(|existing| existing.name == route.name) {
            Some(existing) => *existing = route,
            None => routes.push(route),
        }
    }
    Ok(routes)
}

/// HTTP implementation of [`RouteCalculator`] against the Waze live map
#[derive(Debug, Clone)]
pub struct WazeRouteCalculator {
    client: Client,
    base_url: Url,
}

impl WazeRouteCalculator {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| FetchError::invalid_route_input(format!("Invalid URL path {path}: {e}")))
    }

    /// Coordinates for an address, or the address itself if it already is
    /// a coordinate pair
    pub async fn address_to_coords(
        &self,
        address: &str,
        region: Region,
    ) -> Result<Coordinates, FetchError> {
        if let Some(coordinates) = Coordinates::parse(address) {
            return Ok(coordinates);
        }

        let servers = RegionServers::for_region(region);
        let url = self.endpoint(servers.coord_server)?;
        let request = self
            .client
            .get(url)
            .header(REFERER, WAZE_URL)
            .query(&[
                ("q", address.to_string()),
                ("lang", "eng".to_string()),
                ("origin", "livemap".to_string()),
                ("lat", servers.base_coords.lat.to_string()),
                ("lon", servers.base_coords.lon.to_string()),
            ]);

        let candidates: Vec<GeocodeCandidate> =
            serde_json::from_str(&send_checked(request).await?.text().await?)?;
        let location = candidates
            .into_iter()
            .find_map(|candidate| candidate.location)
            .ok_or_else(|| {
                FetchError::invalid_route_input(format!("Cannot get coords for {address}"))
            })?;

        debug!(address = address, lat = location.lat, lon = location.lon, "Geocoded address");
        Ok(Coordinates::new(location.lat, location.lon))
    }

    /// Coordinates of a resolved location; only text is geocoded
    pub async fn locate(
        &self,
        location: &ResolvedLocation,
        region: Region,
    ) -> Result<Coordinates, FetchError> {
        match location {
            ResolvedLocation::Coordinates(coordinates) => Ok(*coordinates),
            ResolvedLocation::Text(address) => self.address_to_coords(address, region).await,
        }
    }

    async fn request_routes(
        &self,
        from: Coordinates,
        to: Coordinates,
        region: Region,
    ) -> Result<Vec<RouteInfo>, FetchError> {
        let servers = RegionServers::for_region(region);
        let url = self.endpoint(servers.routing_server)?;
        let request = self
            .client
            .get(url)
            .header(REFERER, WAZE_URL)
            .query(&[
                ("from", format!("x:{} y:{}", Degrees(from.lon), Degrees(from.lat))),
                ("to", format!("x:{} y:{}", Degrees(to.lon), Degrees(to.lat))),
                ("at", "0".to_string()),
                ("returnJSON", "true".to_string()),
                ("returnGeometries", "true".to_string()),
                ("returnInstructions", "true".to_string()),
                ("timeout", ROUTING_TIMEOUT_MS.to_string()),
                ("nPaths", ROUTE_ALTERNATIVES.to_string()),
                ("options", "AVOID_TRAILS:t".to_string()),
            ]);

        let body: Value = serde_json::from_str(&send_checked(request).await?.text().await?)?;
        routes_from_reply(body)
    }
}

#[async_trait]
impl RouteCalculator for WazeRouteCalculator {
    async fn calculate_routes(
        &self,
        origin: &ResolvedLocation,
        destination: &ResolvedLocation,
        region: Region,
    ) -> Result<Vec<RouteInfo>, FetchError> {
        let from = self.locate(origin, region).await?;
        let to = self.locate(destination, region).await?;
        let routes = self.request_routes(from, to, region).await?;
        debug!(
            origin = %origin,
            destination = %destination,
            region = %region,
            routes = routes.len(),
            "Routes calculated"
        );
        Ok(routes)
    }
}
