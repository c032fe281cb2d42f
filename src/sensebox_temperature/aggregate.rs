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

use crate::client::StationResponse;
use std::error;
use std::fmt;
use std::num::ParseFloatError;

/// Sensor title used by openSenseMap for temperature sensors.
pub const DEFAULT_SENSOR_TITLE: &str = "Temperatur";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    NoData,
    Overflow,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no numeric readings available"),
            Self::Overflow => write!(f, "average of readings is not a finite number"),
        }
    }
}

impl error::Error for AggregateError {}

/// A single reading that could not be used as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Invalid(String, ParseFloatError),
    NonFinite(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(v, e) => write!(f, "could not parse {:?} as a number: {}", v, e),
            Self::NonFinite(v) => write!(f, "reading {:?} is not a finite number", v),
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Invalid(_, e) => Some(e),
            Self::NonFinite(_) => None,
        }
    }
}

/// Mean of all readings that parsed, along with how many were used and skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Average {
    pub value: f64,
    pub samples: usize,
    pub rejected: usize,
}

/// Latest value of each sensor titled exactly `title`, in station order then sensor order.
///
/// Matching sensors without a latest measurement don't contribute a value.
pub fn extract_values<'a>(stations: &'a [StationResponse], title: &str) -> Vec<&'a str> {
    let mut values = Vec::new();

    for station in stations {
        for sensor in station.sensors.iter().filter(|s| s.title.as_deref() == Some(title)) {
            match sensor.last_measurement.as_ref().and_then(|m| m.value.as_deref()) {
                Some(v) => values.push(v),
                None => {
                    tracing::debug!(
                        message = "sensor has no latest measurement",
                        station = ?station.id,
                        sensor = ?sensor.id,
                    );
                }
            }
        }
    }

    values
}

pub fn parse_value(value: &str) -> Result<f64, ParseError> {
    let v = value
        .parse::<f64>()
        .map_err(|e| ParseError::Invalid(value.to_owned(), e))?;

    if v.is_finite() {
        Ok(v)
    } else {
        Err(ParseError::NonFinite(value.to_owned()))
    }
}

/// Arithmetic mean of every value that parses as a finite number.
///
/// Values that don't parse are logged and skipped. If nothing parses, `AggregateError::NoData`
/// is returned instead of a meaningless number. The result is always finite: if summing the
/// readings overflows, each reading is scaled down before summing.
pub fn average<S: AsRef<str>>(values: &[S]) -> Result<Average, AggregateError> {
    let mut parsed = Vec::with_capacity(values.len());
    let mut rejected = 0;

    for value in values {
        match parse_value(value.as_ref()) {
            Ok(v) => parsed.push(v),
            Err(e) => {
                tracing::warn!(message = "skipping unparseable reading", error = %e);
                rejected += 1;
            }
        }
    }

    if parsed.is_empty() {
        return Err(AggregateError::NoData);
    }

    let samples = parsed.len();
    let n = samples as f64;
    let mut mean = parsed.iter().sum::<f64>() / n;
    if !mean.is_finite() {
        mean = parsed.iter().map(|v| v / n).sum::<f64>();
    }

    if !mean.is_finite() {
        return Err(AggregateError::Overflow);
    }

    Ok(Average {
        value: mean,
        samples,
        rejected,
    })
}
