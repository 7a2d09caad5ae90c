// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::dispatcher::DEFAULT_MAX_TOKEN_RETRIES;
use crate::errors::ConfigError;
use crate::level::{Level, LevelFilter};

pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(2);
/// Intervals below this are replaced with [`DEFAULT_BATCH_INTERVAL`].
pub const MIN_BATCH_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub group_name: String,
    pub stream_name: String,
    pub level_filter: LevelFilter,
    /// How often the pending batch is sent when no size limit forces it earlier.
    pub batch_interval: Duration,
    pub queue_capacity: usize,
    /// How many times a batch is resent after the service reports a stale sequence token.
    pub max_token_retries: u32,
    pub endpoint: String,
    /// Value of the `Authorization` header sent with every request, if any.
    pub credentials: Option<String>,
    pub https_proxy: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        ShipperConfig {
            group_name: String::new(),
            stream_name: String::new(),
            level_filter: LevelFilter::all(),
            batch_interval: DEFAULT_BATCH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_token_retries: DEFAULT_MAX_TOKEN_RETRIES,
            endpoint: regional_endpoint(DEFAULT_REGION),
            credentials: None,
            https_proxy: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ShipperConfig {
    pub fn new(group_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        ShipperConfig {
            group_name: group_name.into(),
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Reads the configuration from `LOGSHIP_*` environment variables.
    pub fn from_env() -> Result<ShipperConfig, ConfigError> {
        let group_name = env::var("LOGSHIP_GROUP_NAME")
            .map_err(|_| ConfigError::MissingVar("LOGSHIP_GROUP_NAME"))?;
        let stream_name = env::var("LOGSHIP_STREAM_NAME")
            .map_err(|_| ConfigError::MissingVar("LOGSHIP_STREAM_NAME"))?;

        let level_filter = match env::var("LOGSHIP_LEVEL") {
            Ok(level) => LevelFilter::threshold(Level::from_str(&level)?),
            Err(_) => LevelFilter::all(),
        };

        // LOGSHIP_ENDPOINT overrides the regional endpoint, mostly for tests and proxies
        let endpoint = env::var("LOGSHIP_ENDPOINT").unwrap_or_else(|_| {
            let region = env::var("LOGSHIP_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
            regional_endpoint(&region)
        });

        Ok(ShipperConfig {
            group_name,
            stream_name,
            level_filter,
            batch_interval: parse_env("LOGSHIP_BATCH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BATCH_INTERVAL),
            queue_capacity: parse_env("LOGSHIP_QUEUE_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            max_token_retries: parse_env("LOGSHIP_MAX_TOKEN_RETRIES")
                .unwrap_or(DEFAULT_MAX_TOKEN_RETRIES),
            endpoint,
            credentials: env::var("LOGSHIP_CREDENTIALS").ok(),
            https_proxy: env::var("LOGSHIP_PROXY_HTTPS")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
            request_timeout: parse_env("LOGSHIP_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// The batch interval actually used by the worker.
    pub fn effective_batch_interval(&self) -> Duration {
        if self.batch_interval < MIN_BATCH_INTERVAL {
            DEFAULT_BATCH_INTERVAL
        } else {
            self.batch_interval
        }
    }
}

pub fn regional_endpoint(region: &str) -> String {
    format!("https://logs.{region}.amazonaws.com")
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring {name}={value}: not a valid number, using default");
            None
        }
    }
}
