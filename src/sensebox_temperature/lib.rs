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

//! Average temperature service for openSenseMap stations
//!
//! ## Features
//!
//! `sensebox_temperature` fetches the current state of a set of [senseBox] stations using the
//! [openSenseMap API], picks out every sensor titled `Temperatur`, and serves the average of
//! their latest readings over HTTP. The following endpoints are available.
//!
//! * `GET /version` - `{"version": "0.1.0"}`
//! * `GET /temperature` - `{"temperature": 20.25, "unit": "Celsius"}`
//! * `GET /metrics` - Prometheus metrics about requests made to openSenseMap.
//!
//! Readings that aren't numbers are skipped. If no readings are left, `/temperature` responds
//! with `503` and `{"error": "temperature_unavailable", ...}`. If a station can't be fetched
//! it responds with `502` and either `station_unavailable` or `invalid_station_response`,
//! unless `--failure-policy skip` is used in which case failed stations are left out of the
//! average.
//!
//! [senseBox]: https://sensebox.de/
//! [openSenseMap API]: https://docs.opensensemap.org/
//!
//! ## Build
//!
//! `sensebox_temperature` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/sensebox_temperature.git && cd sensebox_temperature
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Picking stations
//!
//! By default three stations are averaged. Other stations can be picked with one or more
//! `--station` flags. Station IDs can be found on the [openSenseMap](https://opensensemap.org/)
//! by selecting a box and copying the ID from the URL.
//!
//! ```text
//! ./sensebox_temperature --station 5991537e7e280a0010421ba7 --station 61ec1a8478ce14001bc634f1
//! ```
//!
//! ### Run
//!
//! The HTTP API is exposed on port `8080`.
//!
//! ```text
//! curl -sS 'http://localhost:8080/temperature'
//! ```
//!

pub mod aggregate;
pub mod client;
pub mod http;
pub mod metrics;
pub mod pipeline;
