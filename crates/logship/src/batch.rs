// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::{LogEvent, MAX_BATCH_BYTES, MAX_BATCH_EVENTS};

/// Ordered run of events being assembled into a single send.
///
/// Never holds more than [`MAX_BATCH_EVENTS`] events or more than [`MAX_BATCH_BYTES`] bytes,
/// provided callers check [`Batch::would_overflow`] before every [`Batch::push`].
#[derive(Debug, Default)]
pub struct Batch {
    events: Vec<LogEvent>,
    size: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `event` must start a new batch instead of joining this one.
    pub fn would_overflow(&self, event: &LogEvent) -> bool {
        self.size + event.size() >= MAX_BATCH_BYTES || self.events.len() == MAX_BATCH_EVENTS
    }

    pub fn push(&mut self, event: LogEvent) {
        self.size += event.size();
        self.events.push(event);
    }

    /// Drains the batch, leaving it empty.
    pub fn take(&mut self) -> Vec<LogEvent> {
        self.size = 0;
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EVENT_OVERHEAD_BYTES, MAX_MESSAGE_BYTES};
    use proptest::prelude::*;

    fn event(len: usize) -> LogEvent {
        LogEvent::with_timestamp("x".repeat(len), 0)
    }

    #[test]
    fn test_push_and_take() {
        let mut batch = Batch::new();
        batch.push(event(10));
        batch.push(event(20));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 30 + 2 * EVENT_OVERHEAD_BYTES);

        let events = batch.take();
        assert_eq!(events.len(), 2);
        assert!(batch.is_empty());
        assert_eq!(batch.size_bytes(), 0);
    }

    #[test]
    fn test_overflow_when_byte_ceiling_reached_exactly() {
        let mut batch = Batch::new();
        // Three events of 262_144 bytes each (with overhead) leave exactly one event's room.
        let len = MAX_BATCH_BYTES / 4 - EVENT_OVERHEAD_BYTES;
        for _ in 0..3 {
            let e = event(len);
            assert!(!batch.would_overflow(&e));
            batch.push(e);
        }
        assert!(batch.would_overflow(&event(len)));
        assert!(!batch.would_overflow(&event(len - 1)));
    }

    #[test]
    fn test_overflow_at_event_count_ceiling() {
        let mut batch = Batch::new();
        for _ in 0..MAX_BATCH_EVENTS {
            let e = event(0);
            assert!(!batch.would_overflow(&e));
            batch.push(e);
        }
        assert!(batch.would_overflow(&event(0)));
    }

    #[test]
    fn test_largest_message_fits_alone() {
        let batch = Batch::new();
        let e = event(MAX_MESSAGE_BYTES);
        // Overflow is reported, but flushing an empty batch is a no-op and the event starts a
        // fresh batch that sits exactly on the ceiling.
        assert!(batch.would_overflow(&e));
        let mut fresh = Batch::new();
        fresh.push(e);
        assert_eq!(fresh.size_bytes(), MAX_BATCH_BYTES);
    }

    proptest! {
        #[test]
        fn test_batches_respect_ceilings(lens in proptest::collection::vec(0usize..400_000, 1..200)) {
            let mut batch = Batch::new();
            let mut emitted: Vec<Vec<LogEvent>> = Vec::new();
            for len in &lens {
                let e = event(*len);
                if batch.would_overflow(&e) && !batch.is_empty() {
                    emitted.push(batch.take());
                }
                batch.push(e);
                prop_assert!(batch.size_bytes() <= MAX_BATCH_BYTES);
                prop_assert!(batch.len() <= MAX_BATCH_EVENTS);
            }
            emitted.push(batch.take());

            let flattened: Vec<usize> = emitted.iter().flatten().map(|e| e.message.len()).collect();
            prop_assert_eq!(flattened, lens);
        }
    }
}
