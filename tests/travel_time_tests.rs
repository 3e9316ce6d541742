//! Waze travel time platform: entity resolution, caching and the HTTP
//! route calculator

use pollsense::client::{Region, RouteCalculator, RouteInfo, WazeRouteCalculator};
use pollsense::config::WazeTravelTimeConfig;
use pollsense::error::{RoutingError, TransportError};
use pollsense::host::{EntityState, SensorRegistry};
use pollsense::platforms::waze_travel_time::{self, ATTRIBUTION};
use pollsense::services::{Coordinates, ManualClock, ResolvedLocation, SensorState};
use pollsense::{FetchError, Sensor};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{home_states, test_context, FakeRouteCalculator, MockWaze};

fn coords(lat: f64, lon: f64) -> ResolvedLocation {
    ResolvedLocation::Coordinates(Coordinates::new(lat, lon))
}

fn text(address: &str) -> ResolvedLocation {
    ResolvedLocation::Text(address.to_string())
}

fn commute_config() -> WazeTravelTimeConfig {
    WazeTravelTimeConfig::new("device_tracker.phone", "10 Downing St", Region::Eu)
}

#[tokio::test]
async fn test_travel_time_from_tracked_entity_in_zone() {
    let calculator = FakeRouteCalculator::new(vec![Ok(vec![
        RouteInfo::new("I-95", 42.0, 100.0),
        RouteInfo::new("US-1", 55.0, 90.0),
    ])]);
    let ctx = test_context(Arc::new(home_states()), Arc::new(ManualClock::new()));
    let registry = SensorRegistry::new();

    waze_travel_time::setup_with_calculator(&commute_config(), &ctx, calculator.clone(), &registry)
        .await
        .unwrap();

    assert_eq!(
        calculator.calls(),
        vec![("48.8,2.3".to_string(), "10 Downing St".to_string(), Region::Eu)]
    );

    let sensors = registry.sensors();
    let sensor = &sensors[0];
    assert_eq!(sensor.name(), "Waze Travel Time");
    assert_eq!(sensor.state(), SensorState::Value(json!(42)));
    assert_eq!(sensor.unit_of_measurement().as_deref(), Some("min"));
    assert_eq!(sensor.icon(), Some("mdi:car"));

    let attributes = sensor.attributes();
    assert_eq!(attributes["distance"], json!(100));
    assert_eq!(attributes["route"], json!("I-95"));
    assert_eq!(attributes["attribution"], json!(ATTRIBUTION));
    assert_eq!(attributes["origin"], json!("48.8,2.3"));
}

#[tokio::test]
async fn test_no_route_keeps_previous_value() {
    let calculator = FakeRouteCalculator::new(vec![
        Ok(vec![RouteInfo::new("I-95", 42.0, 100.0)]),
        Err(FetchError::no_route("routing server found nothing")),
    ]);
    let clock = Arc::new(ManualClock::new());
    let ctx = test_context(Arc::new(home_states()), clock.clone());
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator.clone());

    sensor.refresh().await;
    clock.advance(Duration::from_secs(300));
    sensor.refresh().await;

    let snapshot = sensor.snapshot();
    assert_eq!(snapshot.state, SensorState::Value(json!(42)));
    assert_eq!(snapshot.attributes["route"], json!("I-95"));
    assert!(matches!(
        snapshot.last_error,
        Some(FetchError::Routing(RoutingError::NoRouteFound(_)))
    ));
    assert_eq!(calculator.calls().len(), 2);
}

#[tokio::test]
async fn test_empty_route_set_is_no_route() {
    let calculator = FakeRouteCalculator::new(vec![Ok(vec![])]);
    let ctx = test_context(Arc::new(home_states()), Arc::new(ManualClock::new()));
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator);

    sensor.refresh().await;
    let snapshot = sensor.snapshot();
    assert!(snapshot.state.is_unknown());
    assert!(matches!(
        snapshot.last_error,
        Some(FetchError::Routing(RoutingError::NoRouteFound(_)))
    ));
}

#[tokio::test]
async fn test_throttled_refresh_does_not_call_router() {
    let calculator = FakeRouteCalculator::new(vec![Ok(vec![RouteInfo::new("A1", 10.0, 5.0)])]);
    let clock = Arc::new(ManualClock::new());
    let ctx = test_context(Arc::new(home_states()), clock.clone());
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator.clone());

    sensor.refresh().await;
    clock.advance(Duration::from_secs(299));
    assert!(sensor.refresh().await.is_skipped());
    assert_eq!(calculator.calls().len(), 1);
}

#[tokio::test]
async fn test_locations_are_resolved_every_cycle() {
    let states = Arc::new(home_states());
    let calculator = FakeRouteCalculator::new(vec![
        Ok(vec![RouteInfo::new("A1", 10.0, 5.0)]),
        Ok(vec![RouteInfo::new("A1", 12.0, 6.0)]),
    ]);
    let clock = Arc::new(ManualClock::new());
    let ctx = test_context(states.clone(), clock.clone());
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator.clone());

    sensor.refresh().await;
    states.set(EntityState::new("device_tracker.phone", "not_home").with_location(48.9, 2.4));
    clock.advance(Duration::from_secs(300));
    sensor.refresh().await;

    let origins: Vec<String> = calculator.calls().into_iter().map(|call| call.0).collect();
    assert_eq!(origins, vec!["48.8,2.3".to_string(), "48.9,2.4".to_string()]);
}

#[tokio::test]
async fn test_vanished_entity_is_reported_not_raised() {
    let states = Arc::new(home_states());
    states.remove("device_tracker.phone");
    let calculator = FakeRouteCalculator::new(vec![]);
    let ctx = test_context(states, Arc::new(ManualClock::new()));
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator.clone());

    sensor.refresh().await;
    assert!(sensor.snapshot().has_error());
    assert!(calculator.calls().is_empty());
}

#[rstest]
#[case(42.4, 99.5, 42, 100)]
#[case(42.5, 100.5, 42, 100)]
#[case(43.5, 0.4, 44, 0)]
#[tokio::test]
async fn test_values_round_half_to_even(
    #[case] duration: f64,
    #[case] distance: f64,
    #[case] expected_minutes: i64,
    #[case] expected_km: i64,
) {
    let calculator =
        FakeRouteCalculator::new(vec![Ok(vec![RouteInfo::new("A1", duration, distance)])]);
    let ctx = test_context(Arc::new(home_states()), Arc::new(ManualClock::new()));
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator);

    sensor.refresh().await;
    assert_eq!(sensor.state(), SensorState::Value(json!(expected_minutes)));
    assert_eq!(sensor.attributes()["distance"], json!(expected_km));
    assert_eq!(sensor.attributes()["duration"], json!(duration));
}

#[tokio::test]
async fn test_mojibake_route_label_is_repaired() {
    let calculator = FakeRouteCalculator::new(vec![Ok(vec![RouteInfo::new(
        "Stra\u{c3}\u{9f}e des 17. Juni",
        20.0,
        8.0,
    )])]);
    let ctx = test_context(Arc::new(home_states()), Arc::new(ManualClock::new()));
    let sensor = waze_travel_time::build_sensor(&commute_config(), &ctx, calculator);

    sensor.refresh().await;
    assert_eq!(sensor.attributes()["route"], json!("Straße des 17. Juni"));
}

#[tokio::test]
async fn test_waze_client_geocodes_and_sums_segments() {
    let waze = MockWaze::start().await;
    waze.mock_geocode(
        "10 Downing St",
        json!([
            {"name": "Downing Street"},
            {"name": "10 Downing St, London", "location": {"lat": 51.5, "lon": -0.12}}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/row-RoutingManager/routingRequest"))
        .and(query_param("from", "x:2.3 y:48.8"))
        .and(query_param("to", "x:-0.12 y:51.5"))
        .and(query_param("options", "AVOID_TRAILS:t"))
        .and(header("referer", "https://www.waze.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alternatives": [
                {"response": {"routeName": "A16 - M20", "results": [
                    {"crossTime": 1800, "length": 60000},
                    {"crossTime": 1200, "length": 40000}
                ]}},
                {"response": {"routeName": "A26 - M2", "results": [
                    {"crossTime": 3600, "length": 120000}
                ]}}
            ]
        })))
        .expect(1)
        .mount(&waze.server)
        .await;

    let calculator = WazeRouteCalculator::new(reqwest::Client::new(), waze.url());
    let routes = calculator
        .calculate_routes(&coords(48.8, 2.3), &text("10 Downing St"), Region::Eu)
        .await
        .unwrap();

    assert_eq!(
        routes,
        vec![
            RouteInfo::new("A16 - M20", 50.0, 100.0),
            RouteInfo::new("A26 - M2", 60.0, 120.0),
        ]
    );
}

#[tokio::test]
async fn test_waze_error_body_is_no_route() {
    let waze = MockWaze::start().await;
    waze.mock_routing(json!({"error": "No route found"})).await;

    let calculator = WazeRouteCalculator::new(reqwest::Client::new(), waze.url());
    let err = calculator
        .calculate_routes(&coords(48.8, 2.3), &coords(51.5, -0.12), Region::Eu)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FetchError::Routing(RoutingError::NoRouteFound("No route found".to_string()))
    );
}

#[tokio::test]
async fn test_waze_unknown_address_is_invalid_input() {
    let waze = MockWaze::start().await;
    waze.mock_geocode("Atlantis", json!([])).await;

    let calculator = WazeRouteCalculator::new(reqwest::Client::new(), waze.url());
    let err = calculator
        .calculate_routes(&text("Atlantis"), &coords(51.5, -0.12), Region::Eu)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Routing(RoutingError::InvalidInput(_))));
}

#[tokio::test]
async fn test_waze_platform_end_to_end() {
    let waze = MockWaze::start().await;
    waze.mock_routing(json!({
        "response": {"routeName": "I-95", "results": [{"crossTime": 2520, "length": 100000}]}
    }))
    .await;

    let mut config = WazeTravelTimeConfig::new("zone.home", "51.5,-0.12", Region::Eu);
    config.name = "Commute".to_string();
    config.base_url = waze.url();
    let ctx = test_context(Arc::new(home_states()), Arc::new(ManualClock::new()));
    let registry = SensorRegistry::new();

    waze_travel_time::setup_platform(&config, &ctx, &registry)
        .await
        .unwrap();

    let snapshots = registry.snapshots();
    assert_eq!(snapshots[0].name, "Commute");
    assert_eq!(snapshots[0].state, SensorState::Value(json!(42)));
    assert_eq!(snapshots[0].attributes["distance"], json!(100));
}

#[tokio::test]
async fn test_waze_server_error_is_transport_failure() {
    let waze = MockWaze::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&waze.server)
        .await;

    let calculator = WazeRouteCalculator::new(reqwest::Client::new(), waze.url());
    let err = calculator
        .calculate_routes(&coords(48.8, 2.3), &coords(51.5, -0.12), Region::Eu)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::Transport(TransportError::ConnectionFailed(_))
    ));
}

#[rstest]
#[case::tracked_entity("device_tracker.car")]
#[case::zone("zone.office")]
#[case::raw_coordinates("48.0,2.0")]
#[tokio::test]
async fn test_whole_degree_locations_skip_geocoding(#[case] origin: &str) {
    let waze = MockWaze::start().await;
    waze.forbid_geocode().await;
    Mock::given(method("GET"))
        .and(path("/row-RoutingManager/routingRequest"))
        .and(query_param("from", "x:2.0 y:48.0"))
        .and(query_param("to", "x:-0.12 y:51.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"routeName": "A1", "results": [{"crossTime": 1800, "length": 30000}]}
        })))
        .expect(1)
        .mount(&waze.server)
        .await;

    let states = home_states();
    states.set(EntityState::new("device_tracker.car", "not_home").with_location(48.0, 2.0));
    states.set(EntityState::new("zone.office", "zoning").with_location(48.0, 2.0));

    let mut config = WazeTravelTimeConfig::new(origin, "51.5,-0.12", Region::Eu);
    config.base_url = waze.url();
    let ctx = test_context(Arc::new(states), Arc::new(ManualClock::new()));
    let calculator = Arc::new(WazeRouteCalculator::new(ctx.http.clone(), waze.url()));
    let sensor = waze_travel_time::build_sensor(&config, &ctx, calculator);

    sensor.refresh().await;
    let snapshot = sensor.snapshot();
    assert_eq!(snapshot.last_error, None);
    assert_eq!(snapshot.state, SensorState::Value(json!(30)));
    assert_eq!(snapshot.attributes["origin"], json!("48.0,2.0"));
}
