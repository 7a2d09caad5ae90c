// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends assembled batches to the remote stream and owns the stream's sequence token.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::errors::{Creation, DispatchError};
use crate::event::LogEvent;
use crate::service::{LogService, PutError, SequenceToken};

pub const DEFAULT_MAX_TOKEN_RETRIES: u32 = 1;

fn token_str(token: Option<&SequenceToken>) -> &str {
    token.map_or("none", SequenceToken::as_str)
}

/// Progress of a single batch send.
#[derive(Debug)]
enum SendState {
    Sending,
    RetryWithToken { attempt: u32 },
    Done(Option<SequenceToken>),
    Failed(DispatchError),
}

/// Writes batches to one destination stream.
///
/// Only the shipper worker holds a dispatcher, so the token needs no synchronization.
pub struct Dispatcher {
    service: Arc<dyn LogService>,
    group: String,
    stream: String,
    token: Option<SequenceToken>,
    max_token_retries: u32,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn LogService>,
        group: String,
        stream: String,
        max_token_retries: u32,
    ) -> Self {
        Dispatcher {
            service,
            group,
            stream,
            token: None,
            max_token_retries,
        }
    }

    /// Makes sure the destination group and stream exist and captures the stream's token.
    pub async fn initialize(&mut self) -> Result<(), Creation> {
        self.service
            .ensure_group(&self.group)
            .await
            .map_err(|source| Creation::Group {
                group: self.group.clone(),
                source,
            })?;

        self.token = self
            .service
            .ensure_stream(&self.group, &self.stream)
            .await
            .map_err(|source| Creation::Stream {
                group: self.group.clone(),
                stream: self.stream.clone(),
                source,
            })?;

        debug!(
            "Log stream {}/{} ready, sequence token {}",
            self.group,
            self.stream,
            token_str(self.token.as_ref())
        );
        Ok(())
    }

    pub fn token(&self) -> Option<&SequenceToken> {
        self.token.as_ref()
    }

    /// Sends `events` as one write, in order.
    ///
    /// A stale token is replaced with the one the service expects and the identical batch is
    /// resent, at most `max_token_retries` times. Any other failure drops the batch.
    pub async fn send(&mut self, events: &[LogEvent]) -> Result<(), DispatchError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = SendState::Sending;
        loop {
            state = match state {
                SendState::Sending => self.put(events, 0).await,
                SendState::RetryWithToken { attempt } => self.put(events, attempt).await,
                SendState::Done(next_token) => {
                    self.token = next_token;
                    return Ok(());
                }
                SendState::Failed(err) => {
                    error!("Failed to send log batch: {err}");
                    return Err(err);
                }
            };
        }
    }

    async fn put(&mut self, events: &[LogEvent], attempt: u32) -> SendState {
        debug!(
            "Sending {} log events to {}/{} (attempt {})",
            events.len(),
            self.group,
            self.stream,
            attempt + 1
        );

        let result = self
            .service
            .put_log_events(&self.group, &self.stream, events, self.token.as_ref())
            .await;

        match result {
            Ok(next_token) => SendState::Done(next_token),
            Err(PutError::InvalidSequenceToken { expected }) => {
                warn!(
                    "Sequence token rejected, service expects {}",
                    token_str(expected.as_ref())
                );
                self.token = expected;
                if attempt < self.max_token_retries {
                    SendState::RetryWithToken {
                        attempt: attempt + 1,
                    }
                } else {
                    SendState::Failed(DispatchError::TokenRetriesExhausted {
                        events: events.len(),
                        retries: self.max_token_retries,
                    })
                }
            }
            Err(PutError::DataAlreadyAccepted { expected }) => {
                debug!(
                    "Batch already accepted by the service, adopting token {}",
                    token_str(expected.as_ref())
                );
                SendState::Done(expected)
            }
            Err(source) => SendState::Failed(DispatchError::Put {
                events: events.len(),
                source,
            }),
        }
    }
}
