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

use crate::pipeline::{PipelineError, TemperaturePipeline};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const OPENMETRICS_TEXT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const UNIT_CELSIUS: &str = "Celsius";

/// Global state shared between all HTTP handlers.
#[derive(Debug)]
pub struct RequestContext {
    version: String,
    pipeline: TemperaturePipeline,
    registry: Registry,
}

impl RequestContext {
    pub fn new<S: Into<String>>(version: S, pipeline: TemperaturePipeline, registry: Registry) -> Self {
        RequestContext {
            version: version.into(),
            pipeline,
            registry,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct VersionBody {
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TemperatureBody {
    pub temperature: f64,
    pub unit: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub station: Option<String>,
}

/// Build the router for `/version`, `/temperature`, and `/metrics`.
pub fn app(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/temperature", get(temperature))
        .route("/metrics", get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn version(State(context): State<Arc<RequestContext>>) -> Json<VersionBody> {
    Json(VersionBody {
        version: context.version.clone(),
    })
}

async fn temperature(State(context): State<Arc<RequestContext>>) -> Result<Json<TemperatureBody>, PipelineError> {
    let report = context.pipeline.run().await?;
    tracing::info!(
        message = "computed average temperature",
        temperature = report.average.value,
        samples = report.average.samples,
        rejected = report.average.rejected,
        failed_stations = report.failures.len(),
    );

    Ok(Json(TemperatureBody {
        temperature: report.average.value,
        unit: UNIT_CELSIUS.to_owned(),
    }))
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let mut buf = String::new();

    match encode(&mut buf, &context.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, OPENMETRICS_TEXT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        tracing::error!(message = "failed to compute average temperature", error = %self);

        let (status, error, station) = match &self {
            Self::Station(f) if f.error.is_decode() => {
                (StatusCode::BAD_GATEWAY, "invalid_station_response", Some(f.station.clone()))
            }
            Self::Station(f) => (StatusCode::BAD_GATEWAY, "station_unavailable", Some(f.station.clone())),
            Self::NoData(_) | Self::Overflow => (StatusCode::SERVICE_UNAVAILABLE, "temperature_unavailable", None),
            Self::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let body = ErrorBody {
            error: error.to_owned(),
            message: self.to_string(),
            station,
        };

        (status, Json(body)).into_response()
    }
}
