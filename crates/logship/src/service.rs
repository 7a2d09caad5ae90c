// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote log service the dispatcher writes to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::LogEvent;

/// Opaque position in a remote stream. Each write must carry the token the stream expects next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceToken(pub String);

impl SequenceToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PutError {
    /// The token sent was stale. `expected` is the token the stream wants instead.
    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<SequenceToken> },
    /// The stream already holds this exact batch.
    #[error("batch already accepted, expected {expected:?}")]
    DataAlreadyAccepted { expected: Option<SequenceToken> },
    /// The service answered with an error it does not expect a client to recover from.
    #[error("{status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid payload: {0}")]
    Payload(String),
}

/// Operations the shipper needs from the remote log service.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Creates the log group if it does not exist yet.
    async fn ensure_group(&self, group: &str) -> Result<(), PutError>;

    /// Creates the stream if it does not exist yet and returns its current sequence token.
    /// A freshly created stream has no token.
    async fn ensure_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Option<SequenceToken>, PutError>;

    /// Appends `events` to the stream, in order. On success returns the token for the next write.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<SequenceToken>, PutError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct PutCall {
        pub events: Vec<LogEvent>,
        pub token: Option<SequenceToken>,
    }

    /// Records every put and answers from a script; once the script runs dry every put succeeds
    /// with a fresh token.
    #[derive(Clone, Default)]
    pub struct ScriptedLogService {
        pub calls: Arc<Mutex<Vec<PutCall>>>,
        pub responses: Arc<Mutex<VecDeque<Result<Option<SequenceToken>, PutError>>>>,
        pub initial_token: Option<SequenceToken>,
        /// Time each put takes to answer, after it has been recorded.
        pub put_delay: Option<Duration>,
    }

    impl ScriptedLogService {
        pub fn with_responses(
            responses: Vec<Result<Option<SequenceToken>, PutError>>,
        ) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<PutCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogService for ScriptedLogService {
        async fn ensure_group(&self, _group: &str) -> Result<(), PutError> {
            Ok(())
        }

        async fn ensure_stream(
            &self,
            _group: &str,
            _stream: &str,
        ) -> Result<Option<SequenceToken>, PutError> {
            Ok(self.initial_token.clone())
        }

        async fn put_log_events(
            &self,
            _group: &str,
            _stream: &str,
            events: &[LogEvent],
            token: Option<&SequenceToken>,
        ) -> Result<Option<SequenceToken>, PutError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(PutCall {
                    events: events.to_vec(),
                    token: token.cloned(),
                });
                calls.len()
            };
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Some(SequenceToken::new(format!("token-{n}")))))
        }
    }
}
