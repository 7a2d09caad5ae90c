// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory log service enforcing sequence tokens the way the remote service does

use async_trait::async_trait;
use logship::event::LogEvent;
use logship::service::{LogService, PutError, SequenceToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Stream {
    events: Vec<LogEvent>,
    next_token: u64,
    batches: usize,
}

impl Stream {
    fn expected(&self) -> Option<SequenceToken> {
        (self.next_token > 0).then(|| SequenceToken::new(self.next_token.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryLogService {
    groups: Arc<Mutex<Vec<String>>>,
    streams: Arc<Mutex<HashMap<(String, String), Stream>>>,
    fail_next_puts: Arc<Mutex<usize>>,
}

#[allow(dead_code)]
impl MemoryLogService {
    /// Appends an event as another writer would, moving the stream's token on.
    pub fn write_behind_the_back(&self, group: &str, stream: &str) {
        let mut streams = self.streams.lock().unwrap();
        let s = streams
            .entry((group.to_string(), stream.to_string()))
            .or_default();
        s.events
            .push(LogEvent::with_timestamp("other writer".to_string(), 0));
        s.next_token += 1;
    }

    pub fn fail_next_puts(&self, n: usize) {
        *self.fail_next_puts.lock().unwrap() = n;
    }

    pub fn messages(&self, group: &str, stream: &str) -> Vec<String> {
        self.streams
            .lock()
            .unwrap()
            .get(&(group.to_string(), stream.to_string()))
            .map(|s| s.events.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn batches(&self, group: &str, stream: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(&(group.to_string(), stream.to_string()))
            .map(|s| s.batches)
            .unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<String> {
        self.groups.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogService for MemoryLogService {
    async fn ensure_group(&self, group: &str) -> Result<(), PutError> {
        let mut groups = self.groups.lock().unwrap();
        if !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
        Ok(())
    }

    async fn ensure_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Option<SequenceToken>, PutError> {
        let mut streams = self.streams.lock().unwrap();
        let s = streams
            .entry((group.to_string(), stream.to_string()))
            .or_default();
        Ok(s.expected())
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<SequenceToken>, PutError> {
        {
            let mut failures = self.fail_next_puts.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PutError::Rejected {
                    status: 503,
                    message: "ServiceUnavailableException: try again".to_string(),
                });
            }
        }

        let mut streams = self.streams.lock().unwrap();
        let s = streams
            .get_mut(&(group.to_string(), stream.to_string()))
            .ok_or_else(|| PutError::Rejected {
                status: 400,
                message: "ResourceNotFoundException: stream does not exist".to_string(),
            })?;
        if token.cloned() != s.expected() {
            return Err(PutError::InvalidSequenceToken {
                expected: s.expected(),
            });
        }
        s.events.extend_from_slice(events);
        s.next_token += 1;
        s.batches += 1;
        Ok(s.expected())
    }
}
