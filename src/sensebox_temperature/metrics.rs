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

use crate::client::ClientError;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StationLabels {
    pub station: String,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ErrorKind {
    Fetch,
    Decode,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StationErrorLabels {
    pub station: String,
    pub kind: ErrorKind,
}

/// Holder for metrics updated by each run of the temperature pipeline.
///
/// All metrics are created and registered upon call to `PipelineMetrics::new()` and
/// share the prefix "sensebox_". Cloning shares the underlying metrics.
///
/// `sensebox_temperature_degrees` holds the last average that was computed successfully and
/// is not reset by failed runs. Compare `sensebox_last_success_timestamp_seconds` against the
/// current time to tell how old it is.
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    station_requests: Family<StationLabels, Counter>,
    station_errors: Family<StationErrorLabels, Counter>,
    rejected_readings: Counter,
    no_data: Counter,
    temperature: Gauge<f64, AtomicU64>,
    last_success: Gauge<f64, AtomicU64>,
}

impl PipelineMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let station_requests = Family::<StationLabels, Counter>::default();
        let station_errors = Family::<StationErrorLabels, Counter>::default();
        let rejected_readings = Counter::default();
        let no_data = Counter::default();
        let temperature = Gauge::<f64, AtomicU64>::default();
        let last_success = Gauge::<f64, AtomicU64>::default();

        reg.register(
            "sensebox_station_requests",
            "Requests made for station information",
            station_requests.clone(),
        );
        reg.register(
            "sensebox_station_errors",
            "Failed requests for station information by kind",
            station_errors.clone(),
        );
        reg.register(
            "sensebox_rejected_readings",
            "Readings skipped because they were not numeric",
            rejected_readings.clone(),
        );
        reg.register(
            "sensebox_no_data",
            "Pipeline runs that ended without any numeric readings",
            no_data.clone(),
        );
        reg.register(
            "sensebox_temperature_degrees",
            "Last successfully computed average temperature in celsius",
            temperature.clone(),
        );
        reg.register(
            "sensebox_last_success_timestamp_seconds",
            "Unix time of the last successfully computed average temperature",
            last_success.clone(),
        );

        Self {
            station_requests,
            station_errors,
            rejected_readings,
            no_data,
            temperature,
            last_success,
        }
    }

    pub fn station_request(&self, station: &str) {
        self.station_requests
            .get_or_create(&StationLabels {
                station: station.to_owned(),
            })
            .inc();
    }

    pub fn station_error(&self, station: &str, err: &ClientError) {
        let kind = if err.is_decode() { ErrorKind::Decode } else { ErrorKind::Fetch };
        self.station_errors
            .get_or_create(&StationErrorLabels {
                station: station.to_owned(),
                kind,
            })
            .inc();
    }

    pub fn rejected(&self, count: usize) {
        self.rejected_readings.inc_by(count as u64);
    }

    pub fn no_data(&self) {
        self.no_data.inc();
    }

    /// Record a successfully computed average along with the time it was computed.
    pub fn temperature(&self, value: f64) {
        self.temperature.set(value);

        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => {
                self.last_success.set(d.as_secs_f64());
            }
            Err(e) => {
                tracing::warn!(message = "system clock is before the unix epoch", error = %e);
            }
        }
    }

    /// Unix time of the last successful average, zero if there hasn't been one.
    pub fn last_success(&self) -> f64 {
        self.last_success.get()
    }
}
