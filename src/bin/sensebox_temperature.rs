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

use clap::Parser;
use prometheus_client::registry::Registry;
use reqwest::Client;
use sensebox_temperature::aggregate::DEFAULT_SENSOR_TITLE;
use sensebox_temperature::client::{ClientError, OpenSenseMapClient};
use sensebox_temperature::http::RequestContext;
use sensebox_temperature::metrics::PipelineMetrics;
use sensebox_temperature::pipeline::{FailurePolicy, TemperaturePipeline};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_API_URL: &str = "https://api.opensensemap.org/";
const DEFAULT_STATIONS: [&str; 3] = [
    "5991537e7e280a0010421ba7",
    "61ec1a8478ce14001bc634f1",
    "5c8d5386922ca90019e2959d",
];

#[derive(Debug, Parser)]
#[clap(name = "sensebox_temperature", version = clap::crate_version!())]
struct SenseboxTemperatureApplication {
    /// openSenseMap station (box) IDs to average the temperature of. May be given multiple
    /// times or as a comma separated list.
    #[clap(long = "station", value_delimiter = ',', default_values_t = DEFAULT_STATIONS.map(String::from))]
    stations: Vec<String>,

    /// Base URL for the openSenseMap API
    #[clap(long, default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// Exact (case sensitive) title of the sensors to average
    #[clap(long, default_value_t = DEFAULT_SENSOR_TITLE.into())]
    sensor_title: String,

    /// What to do when a station can't be fetched: fail the request ('abort') or leave
    /// the station out of the average ('skip')
    #[clap(long, value_enum, default_value_t = FailurePolicy::Abort)]
    failure_policy: FailurePolicy,

    /// Timeout for fetching each station from the openSenseMap API, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Address to bind to. By default, sensebox_temperature will bind to public address since
    /// the purpose is to expose the temperature API to other hosts.
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = SenseboxTemperatureApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    tracing::info!(message = "starting sensebox_temperature", version = clap::crate_version!());

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = OpenSenseMapClient::new(http_client, &opts.api_url).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize openSenseMap client", error = %e);
        process::exit(1)
    });

    // Make an initial request for each station. This allows us to verify that the stations
    // the user provided are valid before starting the HTTP server and running indefinitely.
    for station in opts.stations.iter() {
        match client.station(station).await {
            Err(ClientError::InvalidStation(station)) => {
                tracing::error!(message = "invalid station provided", station = %station);
                process::exit(1)
            }
            Err(e) => {
                tracing::warn!(message = "failed to fetch initial station information", station = %station, error = %e);
            }
            Ok(s) => {
                tracing::debug!(message = "verified station information", station = %station, name = ?s.name);
            }
        }
    }

    let mut registry = Registry::default();
    let metrics = PipelineMetrics::new(&mut registry);
    let pipeline = TemperaturePipeline::new(
        client,
        opts.stations.clone(),
        opts.sensor_title.clone(),
        opts.failure_policy,
        metrics,
    );

    tracing::info!(
        message = "temperature pipeline configured",
        api_url = %opts.api_url,
        stations = ?pipeline.stations(),
        sensor_title = %opts.sensor_title,
        failure_policy = %opts.failure_policy,
    );

    let context = Arc::new(RequestContext::new(clap::crate_version!(), pipeline, registry));
    let app = sensebox_temperature::http::app(context);
    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(app.into_make_service());

    tracing::info!(message = "server started", address = %server.local_addr());

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
