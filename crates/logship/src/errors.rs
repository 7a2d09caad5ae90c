// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for shipping log records.

use thiserror::Error;

use crate::service::PutError;

/// Failure during the one-time setup of the destination group and stream.
#[derive(Debug, Error)]
pub enum Creation {
    #[error("failed to ensure log group {group}: {source}")]
    Group { group: String, source: PutError },
    #[error("failed to ensure log stream {group}/{stream}: {source}")]
    Stream {
        group: String,
        stream: String,
        source: PutError,
    },
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Terminal failure of a batch send. The batch is dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("batch of {events} events dropped: {source}")]
    Put { events: usize, source: PutError },
    #[error("batch of {events} events dropped: sequence token still rejected after {retries} retries")]
    TokenRetriesExhausted { events: usize, retries: u32 },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("failed to serialize record: {0}")]
    Serialize(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

/// Errors returned to callers of the shipper handle.
#[derive(Debug, Error)]
pub enum ShipError {
    /// A previous batch failed to deliver. Reported once, on the first call after the failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("event of {size} bytes exceeds the {max} byte batch limit")]
    EventTooLarge { size: usize, max: usize },
    #[error("shipper worker is no longer running")]
    WorkerStopped,
}
