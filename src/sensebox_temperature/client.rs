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

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Deserializer, Serialize};
use std::error;
use std::fmt;

/// Error fetching or decoding a single station from the openSenseMap API.
///
/// `Network`, `InvalidStation`, and `Unexpected` are all failures to fetch the
/// station while `Decode` means the station answered but the body wasn't usable.
/// Use `is_fetch()` and `is_decode()` to tell the two apart.
#[derive(Debug)]
pub enum ClientError {
    InvalidUrl(String),
    Network(reqwest::Error),
    InvalidStation(String),
    Unexpected(StatusCode, Url),
    Decode(serde_json::Error, Url),
}

impl ClientError {
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::InvalidStation(_) | Self::Unexpected(_, _)
        )
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_, _))
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(s) => write!(f, "invalid API URL {}", s),
            Self::Network(e) => write!(f, "{}", e),
            Self::InvalidStation(s) => write!(f, "invalid station {}", s),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
            Self::Decode(e, url) => write!(f, "unable to decode response from {}: {}", url, e),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Decode(e, _) => Some(e),
            _ => None,
        }
    }
}

/// Client for the box (station) endpoint of the openSenseMap API.
///
/// Cloning is cheap, the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct OpenSenseMapClient {
    client: Client,
    base_url: Url,
}

impl OpenSenseMapClient {
    const USER_AGENT: &'static str =
        "sensebox_temperature (https://github.com/56quarters/sensebox_temperature)";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        Ok(OpenSenseMapClient { client, base_url })
    }

    /// Fetch and decode the current state of a single station.
    pub async fn station(&self, station: &str) -> Result<StationResponse, ClientError> {
        let station_url = self.station_url(station);
        tracing::debug!(message = "making station request", url = %station_url);

        let res = self.make_request(station, station_url.clone()).await?;
        let body = res.bytes().await.map_err(ClientError::Network)?;
        serde_json::from_slice::<StationResponse>(&body).map_err(|e| ClientError::Decode(e, station_url))
    }

    async fn make_request<S: Into<String>>(&self, station: S, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Network)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else if status == StatusCode::NOT_FOUND {
            Err(ClientError::InvalidStation(station.into()))
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn station_url(&self, station: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked for cannot-be-a-base URLs in the constructor.
        if let Ok(mut p) = url.path_segments_mut() {
            p.pop_if_empty().push("boxes").push(station);
        }

        url.query_pairs_mut().clear().append_pair("format", "json");
        url
    }
}

/// Treat an explicit `null` the same as a missing list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A station ("senseBox") as returned by `/boxes/{id}`.
///
/// The API doesn't promise any of these fields so all of them are optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StationResponse {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    #[serde(alias = "name")]
    pub name: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(alias = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(alias = "lastMeasurementAt")]
    pub last_measurement_at: Option<String>,
    #[serde(alias = "currentLocation")]
    pub current_location: Option<Location>,
    #[serde(alias = "exposure")]
    pub exposure: Option<String>,
    #[serde(alias = "sensors", default, deserialize_with = "null_as_empty")]
    pub sensors: Vec<SensorReading>,
    #[serde(alias = "model")]
    pub model: Option<String>,
    #[serde(alias = "grouptag", default, deserialize_with = "null_as_empty")]
    pub grouptag: Vec<String>,
    #[serde(alias = "weblink")]
    pub weblink: Option<String>,
    #[serde(alias = "loc", default, deserialize_with = "null_as_empty")]
    pub loc: Vec<Loc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Location {
    #[serde(alias = "type")]
    pub type_: Option<String>,
    #[serde(alias = "coordinates", default, deserialize_with = "null_as_empty")]
    pub coordinates: Vec<f64>,
    #[serde(alias = "timestamp")]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Loc {
    #[serde(alias = "geometry")]
    pub geometry: Option<Location>,
    #[serde(alias = "type")]
    pub type_: Option<String>,
}

/// One physical sensor attached to a station.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    #[serde(alias = "title")]
    pub title: Option<String>,
    #[serde(alias = "unit")]
    pub unit: Option<String>,
    #[serde(alias = "sensorType")]
    pub sensor_type: Option<String>,
    #[serde(alias = "icon")]
    pub icon: Option<String>,
    #[serde(alias = "_id")]
    pub id: Option<String>,
    #[serde(alias = "lastMeasurement")]
    pub last_measurement: Option<LatestMeasurement>,
}

/// Most recent value of a sensor. The value is text and isn't guaranteed to be numeric.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LatestMeasurement {
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(alias = "value")]
    pub value: Option<String>,
}
