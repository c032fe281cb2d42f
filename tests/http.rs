// sensebox_temperature - Average temperature service for openSenseMap stations
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

mod common;

use axum::http::StatusCode;
use common::MockStations;
use sensebox_temperature::http::{app, ErrorBody, RequestContext, TemperatureBody, VersionBody};
use sensebox_temperature::pipeline::FailurePolicy;
use std::net::SocketAddr;
use std::sync::Arc;

/// Serve the temperature API for `stations` backed by the API at `api_url`.
fn serve(api_url: &str, stations: &[&str], policy: FailurePolicy) -> String {
    let (pipeline, registry) = common::pipeline(api_url, stations, policy);
    let context = Arc::new(RequestContext::new("1.2.3", pipeline, registry));

    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(app(context).into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_version() {
    let url = serve(&common::unused_url(), &[], FailurePolicy::Abort);

    let res = reqwest::get(format!("{}/version", url)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(
        VersionBody {
            version: "1.2.3".to_owned()
        },
        res.json::<VersionBody>().await.unwrap()
    );
}

#[tokio::test]
async fn test_temperature() {
    let api = MockStations::default()
        .with_station("a", &[("Temperatur", "10.0")])
        .with_station("b", &[("Temperatur", "20.0")])
        .with_station("c", &[("Temperatur", "30.0")])
        .serve();
    let url = serve(&api, &["a", "b", "c"], FailurePolicy::Abort);

    let res = reqwest::get(format!("{}/temperature", url)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(
        TemperatureBody {
            temperature: 20.0,
            unit: "Celsius".to_owned()
        },
        res.json::<TemperatureBody>().await.unwrap()
    );
}

#[tokio::test]
async fn test_temperature_station_unavailable() {
    let api = MockStations::default()
        .with_station("a", &[("Temperatur", "10.0")])
        .with("b", StatusCode::INTERNAL_SERVER_ERROR, "")
        .serve();
    let url = serve(&api, &["a", "b"], FailurePolicy::Abort);

    let res = reqwest::get(format!("{}/temperature", url)).await.unwrap();
    assert_eq!(StatusCode::BAD_GATEWAY, res.status());

    let body = res.json::<ErrorBody>().await.unwrap();
    assert_eq!("station_unavailable", body.error);
    assert_eq!(Some("b".to_owned()), body.station);
}

#[tokio::test]
async fn test_temperature_invalid_station_response() {
    let api = MockStations::default()
        .with("a", StatusCode::OK, "<html></html>")
        .serve();
    let url = serve(&api, &["a"], FailurePolicy::Abort);

    let res = reqwest::get(format!("{}/temperature", url)).await.unwrap();
    assert_eq!(StatusCode::BAD_GATEWAY, res.status());

    let body = res.json::<ErrorBody>().await.unwrap();
    assert_eq!("invalid_station_response", body.error);
    assert_eq!(Some("a".to_owned()), body.station);
}

#[tokio::test]
async fn test_temperature_unavailable() {
    let api = MockStations::default()
        .with_station("a", &[("rel. Luftfeuchte", "81.2")])
        .serve();
    let url = serve(&api, &["a"], FailurePolicy::Abort);

    let res = reqwest::get(format!("{}/temperature", url)).await.unwrap();
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, res.status());

    let body = res.json::<ErrorBody>().await.unwrap();
    assert_eq!("temperature_unavailable", body.error);
    assert_eq!(None, body.station);
}

#[tokio::test]
async fn test_temperature_skip_policy() {
    let api = MockStations::default()
        .with_station("a", &[("Temperatur", "12.5")])
        .serve();
    let url = serve(&api, &["a", "missing"], FailurePolicy::Skip);

    let res = reqwest::get(format!("{}/temperature", url)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(12.5, res.json::<TemperatureBody>().await.unwrap().temperature);
}

#[tokio::test]
async fn test_metrics() {
    let api = MockStations::default()
        .with_station("a", &[("Temperatur", "12.5")])
        .serve();
    let url = serve(&api, &["a"], FailurePolicy::Abort);

    reqwest::get(format!("{}/temperature", url)).await.unwrap();
    let res = reqwest::get(format!("{}/metrics", url)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());

    let body = res.text().await.unwrap();
    assert!(body.contains(r#"sensebox_station_requests_total{station="a"} 1"#));
    assert!(body.contains("sensebox_temperature_degrees 12.5"));
}

#[tokio::test]
async fn test_not_found_and_method() {
    let url = serve(&common::unused_url(), &[], FailurePolicy::Abort);
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/nope", url)).send().await.unwrap();
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    let res = client.post(format!("{}/temperature", url)).send().await.unwrap();
    assert_eq!(StatusCode::METHOD_NOT_ALLOWED, res.status());
}
