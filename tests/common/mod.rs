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

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus_client::registry::Registry;
use reqwest::Client;
use sensebox_temperature::aggregate::DEFAULT_SENSOR_TITLE;
use sensebox_temperature::client::OpenSenseMapClient;
use sensebox_temperature::metrics::PipelineMetrics;
use sensebox_temperature::pipeline::{FailurePolicy, TemperaturePipeline};
use serde_json::json;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

/// Canned responses for `/boxes/{id}`, keyed by station ID. Unknown IDs get a 404.
#[derive(Debug, Default, Clone)]
pub struct MockStations {
    boxes: HashMap<String, (StatusCode, String)>,
}

impl MockStations {
    pub fn with(mut self, id: &str, status: StatusCode, body: impl Into<String>) -> Self {
        self.boxes.insert(id.to_owned(), (status, body.into()));
        self
    }

    pub fn with_station(self, id: &str, sensors: &[(&str, &str)]) -> Self {
        let body = station_json(id, sensors);
        self.with(id, StatusCode::OK, body)
    }

    /// Serve the canned stations on a random local port, returning the base URL.
    pub fn serve(self) -> String {
        let app = Router::new()
            .route("/boxes/:id", get(station_handler))
            .with_state(Arc::new(self));

        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        format!("http://{}/", addr)
    }
}

async fn station_handler(State(mock): State<Arc<MockStations>>, Path(id): Path<String>) -> impl IntoResponse {
    match mock.boxes.get(&id) {
        Some((status, body)) => (*status, [(CONTENT_TYPE, "application/json")], body.clone()),
        None => (
            StatusCode::NOT_FOUND,
            [(CONTENT_TYPE, "application/json")],
            r#"{"code":"NotFound","message":"Box not found"}"#.to_owned(),
        ),
    }
}

/// Station document in the shape openSenseMap returns, with one sensor per `(title, value)`.
pub fn station_json(id: &str, sensors: &[(&str, &str)]) -> String {
    let sensors: Vec<_> = sensors
        .iter()
        .enumerate()
        .map(|(i, (title, value))| {
            json!({
                "title": title,
                "unit": "°C",
                "sensorType": "HDC1080",
                "icon": "osem-thermometer",
                "_id": format!("{}-{}", id, i),
                "lastMeasurement": {
                    "createdAt": "2024-01-08T12:00:31.868Z",
                    "value": value,
                },
            })
        })
        .collect();

    json!({
        "_id": id,
        "name": format!("Station {}", id),
        "createdAt": "2017-08-14T07:32:14.361Z",
        "updatedAt": "2024-01-08T12:00:31.874Z",
        "exposure": "outdoor",
        "model": "homeWifi",
        "currentLocation": {"type": "Point", "coordinates": [7.596, 51.957], "timestamp": "2017-08-14T07:32:14.355Z"},
        "sensors": sensors,
    })
    .to_string()
}

/// Base URL of a port that nothing is listening on.
pub fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}/", addr)
}

pub fn client(base_url: &str) -> OpenSenseMapClient {
    OpenSenseMapClient::new(Client::new(), base_url).unwrap()
}

pub fn pipeline(base_url: &str, stations: &[&str], policy: FailurePolicy) -> (TemperaturePipeline, Registry) {
    let mut registry = Registry::default();
    let metrics = PipelineMetrics::new(&mut registry);
    let pipeline = TemperaturePipeline::new(
        client(base_url),
        stations.iter().map(|s| s.to_string()).collect(),
        DEFAULT_SENSOR_TITLE.to_owned(),
        policy,
        metrics,
    );

    (pipeline, registry)
}
