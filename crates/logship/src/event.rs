// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed per-event overhead the remote service adds to each message when sizing a batch.
pub const EVENT_OVERHEAD_BYTES: usize = 26;
/// Maximum total size of one batch, overhead included.
pub const MAX_BATCH_BYTES: usize = 1_048_576;
/// Maximum number of events in one batch.
pub const MAX_BATCH_EVENTS: usize = 10_000;
/// Largest message that still fits in a batch on its own.
pub const MAX_MESSAGE_BYTES: usize = MAX_BATCH_BYTES - EVENT_OVERHEAD_BYTES;

/// A rendered log record waiting to be shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub message: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl LogEvent {
    pub fn new(message: String) -> Self {
        Self::with_timestamp(message, now_millis())
    }

    pub fn with_timestamp(message: String, timestamp: i64) -> Self {
        LogEvent { message, timestamp }
    }

    /// Bytes this event contributes to a batch.
    pub fn size(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
