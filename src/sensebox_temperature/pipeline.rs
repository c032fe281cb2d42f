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

use crate::aggregate::{self, AggregateError, Average};
use crate::client::{ClientError, OpenSenseMapClient, StationResponse};
use crate::metrics::PipelineMetrics;
use clap::ValueEnum;
use std::error;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::Instrument;

/// What to do when a single station can't be fetched or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Fail the whole request with the first failing station.
    #[default]
    Abort,
    /// Leave out failing stations and average the rest.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// A station that could not be fetched or decoded.
#[derive(Debug)]
pub struct StationFailure {
    pub station: String,
    pub error: ClientError,
}

impl fmt::Display for StationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station {}: {}", self.station, self.error)
    }
}

#[derive(Debug)]
pub enum PipelineError {
    Station(StationFailure),
    NoData(Vec<StationFailure>),
    Overflow,
    Task(JoinError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Station(s) => write!(f, "{}", s),
            Self::NoData(failures) if failures.is_empty() => write!(f, "{}", AggregateError::NoData),
            Self::NoData(failures) => write!(
                f,
                "{} ({} station(s) failed)",
                AggregateError::NoData,
                failures.len()
            ),
            Self::Overflow => write!(f, "{}", AggregateError::Overflow),
            Self::Task(e) => write!(f, "station request task failed: {}", e),
        }
    }
}

impl error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Station(s) => Some(&s.error),
            Self::NoData(_) | Self::Overflow => None,
            Self::Task(e) => Some(e),
        }
    }
}

/// Result of a successful pipeline run.
///
/// `failures` is only non-empty when running with `FailurePolicy::Skip`.
#[derive(Debug)]
pub struct TemperatureReport {
    pub average: Average,
    pub failures: Vec<StationFailure>,
}

/// Fetch every configured station, pick out the matching sensors, and average them.
///
/// Holds no mutable state and can be shared between concurrent requests.
#[derive(Debug, Clone)]
pub struct TemperaturePipeline {
    client: OpenSenseMapClient,
    stations: Arc<[String]>,
    sensor_title: String,
    policy: FailurePolicy,
    metrics: PipelineMetrics,
}

impl TemperaturePipeline {
    pub fn new(
        client: OpenSenseMapClient,
        stations: Vec<String>,
        sensor_title: String,
        policy: FailurePolicy,
        metrics: PipelineMetrics,
    ) -> Self {
        TemperaturePipeline {
            client,
            stations: stations.into(),
            sensor_title,
            policy,
            metrics,
        }
    }

    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    /// Fetch all stations concurrently, returning one result per station in configured order.
    pub async fn fetch(&self) -> Result<Vec<Result<StationResponse, ClientError>>, PipelineError> {
        let mut handles = Vec::with_capacity(self.stations.len());

        for station in self.stations.iter() {
            let client = self.client.clone();
            let station = station.clone();
            let span = tracing::debug_span!("opensensemap_station", station = %station);

            self.metrics.station_request(&station);
            handles.push(tokio::spawn(
                async move { client.station(&station).await }.instrument(span),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.map_err(PipelineError::Task)?);
        }

        Ok(results)
    }

    /// Run the whole pipeline once: fetch, extract, and average.
    pub async fn run(&self) -> Result<TemperatureReport, PipelineError> {
        let results = self.fetch().await?;
        let mut responses = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for (station, res) in self.stations.iter().zip(results) {
            match res {
                Ok(r) => responses.push(r),
                Err(e) => {
                    self.metrics.station_error(station, &e);
                    let failure = StationFailure {
                        station: station.clone(),
                        error: e,
                    };

                    match self.policy {
                        FailurePolicy::Abort => return Err(PipelineError::Station(failure)),
                        FailurePolicy::Skip => {
                            tracing::warn!(message = "skipping failed station", station = %station, error = %failure.error);
                            failures.push(failure);
                        }
                    }
                }
            }
        }

        let values = aggregate::extract_values(&responses, &self.sensor_title);
        tracing::debug!(message = "extracted readings", title = %self.sensor_title, values = ?values);

        match aggregate::average(&values) {
            Ok(average) => {
                self.metrics.rejected(average.rejected);
                self.metrics.temperature(average.value);
                Ok(TemperatureReport { average, failures })
            }
            Err(AggregateError::NoData) => {
                self.metrics.rejected(values.len());
                self.metrics.no_data();
                Err(PipelineError::NoData(failures))
            }
            Err(AggregateError::Overflow) => {
                self.metrics.no_data();
                Err(PipelineError::Overflow)
            }
        }
    }
}
