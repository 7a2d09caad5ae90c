// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};

use crate::errors::DispatchError;

/// Single-slot mailbox carrying the latest dispatch failure from the worker to callers.
///
/// The worker overwrites the slot; the first caller to [`ErrorRelay::take`] it clears it, so each
/// failure is reported at most once.
#[derive(Debug, Clone, Default)]
pub struct ErrorRelay {
    slot: Arc<Mutex<Option<DispatchError>>>,
}

impl ErrorRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, err: DispatchError) {
        #[allow(clippy::expect_used)]
        let mut slot = self.slot.lock().expect("lock poisoned");
        *slot = Some(err);
    }

    #[allow(clippy::expect_used)]
    pub fn take(&self) -> Option<DispatchError> {
        self.slot.lock().expect("lock poisoned").take()
    }

    #[allow(clippy::expect_used)]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().expect("lock poisoned").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::PutError;

    fn failure(events: usize) -> DispatchError {
        DispatchError::Put {
            events,
            source: PutError::Transport("connection reset".to_string()),
        }
    }

    #[test]
    fn test_take_clears_slot() {
        let relay = ErrorRelay::new();
        assert!(relay.take().is_none());

        relay.record(failure(1));
        assert!(!relay.is_empty());
        assert_eq!(relay.take(), Some(failure(1)));
        assert!(relay.is_empty());
        assert!(relay.take().is_none());
    }

    #[test]
    fn test_keeps_most_recent_failure() {
        let relay = ErrorRelay::new();
        relay.record(failure(1));
        relay.record(failure(2));
        assert_eq!(relay.take(), Some(failure(2)));
    }

    #[test]
    fn test_each_failure_reported_once_across_threads() {
        let relay = ErrorRelay::new();
        relay.record(failure(3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let relay = relay.clone();
                std::thread::spawn(move || relay.take().is_some())
            })
            .collect();
        let reported = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|taken| *taken)
            .count();
        assert_eq!(reported, 1);
    }
}
