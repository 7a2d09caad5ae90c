// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The batching worker and the handle callers submit records through.
//!
//! Events and flush requests travel through one bounded channel, so a flush is processed after
//! every event queued before it. A full channel makes `write` wait: a slow destination throttles
//! producers instead of dropping events or growing memory.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::batch::Batch;
use crate::config::ShipperConfig;
use crate::dispatcher::Dispatcher;
use crate::encoder::{Encoder, Record};
use crate::errors::{Creation, ShipError};
use crate::event::{now_millis, LogEvent, MAX_BATCH_BYTES};
use crate::level::{Level, LevelFilter};
use crate::relay::ErrorRelay;
use crate::service::LogService;

#[derive(Debug)]
pub enum ShipperCommand {
    Event(LogEvent),
    /// Send the pending batch, then acknowledge.
    Flush(oneshot::Sender<()>),
    /// Stop accepting commands, drain what is queued, send the pending batch, then acknowledge.
    Shutdown(oneshot::Sender<()>),
}

/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct ShipperHandle {
    tx: mpsc::Sender<ShipperCommand>,
    level_filter: Arc<LevelFilter>,
    relay: ErrorRelay,
    stopped: watch::Receiver<bool>,
}

impl ShipperHandle {
    /// Queues `message` stamped with the current time.
    ///
    /// Returns the most recent unreported delivery failure, which may belong to an earlier,
    /// unrelated batch.
    pub async fn write(&self, level: Level, message: String) -> Result<(), ShipError> {
        self.write_at(level, message, now_millis()).await
    }

    pub async fn write_at(
        &self,
        level: Level,
        message: String,
        timestamp: i64,
    ) -> Result<(), ShipError> {
        let Some(event) = self.accept(level, message, timestamp)? else {
            return Ok(());
        };
        self.tx
            .send(ShipperCommand::Event(event))
            .await
            .map_err(|_| ShipError::WorkerStopped)?;
        self.take_error()
    }

    /// Encodes `record` and queues it. Encoding failures are returned before anything is queued.
    pub async fn write_record(
        &self,
        record: &Record,
        encoder: &dyn Encoder,
    ) -> Result<(), ShipError> {
        if !self.level_filter.is_accepted(record.level) {
            return Ok(());
        }
        let message = encoder.encode(record)?;
        self.write_at(record.level, message, record.timestamp).await
    }

    /// Same as [`ShipperHandle::write`], for callers outside the async runtime.
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_write(&self, level: Level, message: String) -> Result<(), ShipError> {
        let Some(event) = self.accept(level, message, now_millis())? else {
            return Ok(());
        };
        self.tx
            .blocking_send(ShipperCommand::Event(event))
            .map_err(|_| ShipError::WorkerStopped)?;
        self.take_error()
    }

    /// Waits until every event queued before this call has been handed to the remote service,
    /// then reports the most recent unreported delivery failure.
    pub async fn flush(&self) -> Result<(), ShipError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(ShipperCommand::Flush(ack_tx))
            .await
            .map_err(|_| ShipError::WorkerStopped)?;
        ack_rx.await.map_err(|_| ShipError::WorkerStopped)?;
        self.take_error()
    }

    /// Same as [`ShipperHandle::flush`], for callers outside the async runtime.
    pub fn blocking_flush(&self) -> Result<(), ShipError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .blocking_send(ShipperCommand::Flush(ack_tx))
            .map_err(|_| ShipError::WorkerStopped)?;
        ack_rx.blocking_recv().map_err(|_| ShipError::WorkerStopped)?;
        self.take_error()
    }

    /// Sends everything still queued and stops the worker. Writes and flushes on any clone of
    /// this handle fail with [`ShipError::WorkerStopped`] afterwards.
    ///
    /// Calling it again, from any clone, waits for the worker to finish and succeeds.
    pub async fn shutdown(&self) -> Result<(), ShipError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .tx
            .send(ShipperCommand::Shutdown(ack_tx))
            .await
            .is_err()
        {
            self.wait_stopped().await;
            return self.take_error();
        }
        if ack_rx.await.is_err() {
            self.wait_stopped().await;
        }
        self.take_error()
    }

    async fn wait_stopped(&self) {
        let mut stopped = self.stopped.clone();
        // An error means the worker is gone, which is just as final.
        let _ = stopped.wait_for(|done| *done).await;
    }

    fn accept(
        &self,
        level: Level,
        message: String,
        timestamp: i64,
    ) -> Result<Option<LogEvent>, ShipError> {
        if !self.level_filter.is_accepted(level) {
            return Ok(None);
        }
        let event = LogEvent::with_timestamp(message, timestamp);
        if event.size() > MAX_BATCH_BYTES {
            return Err(ShipError::EventTooLarge {
                size: event.size(),
                max: MAX_BATCH_BYTES,
            });
        }
        Ok(Some(event))
    }

    fn take_error(&self) -> Result<(), ShipError> {
        match self.relay.take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// Owns the batch and the dispatcher; the only place batches are assembled and sent.
pub struct ShipperService {
    dispatcher: Dispatcher,
    rx: mpsc::Receiver<ShipperCommand>,
    relay: ErrorRelay,
    batch: Batch,
    batch_interval: Duration,
    stopped: watch::Sender<bool>,
}

impl ShipperService {
    pub fn new(config: &ShipperConfig, dispatcher: Dispatcher) -> (Self, ShipperHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let relay = ErrorRelay::new();
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let service = Self {
            dispatcher,
            rx,
            relay: relay.clone(),
            batch: Batch::new(),
            batch_interval: config.effective_batch_interval(),
            stopped: stopped_tx,
        };

        let handle = ShipperHandle {
            tx,
            level_filter: Arc::new(config.level_filter.clone()),
            relay,
            stopped: stopped_rx,
        };

        (service, handle)
    }

    /// Prepares the destination stream and spawns the worker on the current runtime.
    pub async fn start(
        config: &ShipperConfig,
        log_service: Arc<dyn LogService>,
    ) -> Result<(ShipperHandle, JoinHandle<()>), Creation> {
        let mut dispatcher = Dispatcher::new(
            log_service,
            config.group_name.clone(),
            config.stream_name.clone(),
            config.max_token_retries,
        );
        dispatcher.initialize().await?;

        let (service, handle) = Self::new(config, dispatcher);
        let task = tokio::spawn(service.run());
        Ok((handle, task))
    }

    pub async fn run(mut self) {
        debug!(
            "Shipper service started, batch interval {:?}",
            self.batch_interval
        );

        let mut ticker = interval(self.batch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        let mut shutdown_acks = Vec::new();
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(ShipperCommand::Event(event)) => self.add_event(event).await,
                    Some(ShipperCommand::Flush(ack)) => {
                        self.send_batch().await;
                        if ack.send(()).is_err() {
                            error!("Failed to acknowledge flush - receiver dropped");
                        }
                    }
                    Some(ShipperCommand::Shutdown(ack)) => {
                        debug!("Shipper service shutting down");
                        self.rx.close();
                        shutdown_acks.push(ack);
                    }
                    None => break,
                },
                _ = ticker.tick() => self.send_batch().await,
            }
        }

        self.send_batch().await;
        self.stopped.send_replace(true);
        for ack in shutdown_acks {
            let _ = ack.send(());
        }
        debug!("Shipper service stopped");
    }

    async fn add_event(&mut self, event: LogEvent) {
        if self.batch.would_overflow(&event) {
            self.send_batch().await;
        }
        self.batch.push(event);
    }

    async fn send_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        debug!(
            "Sending batch of {} events ({} bytes)",
            self.batch.len(),
            self.batch.size_bytes()
        );
        let events = self.batch.take();
        if let Err(err) = self.dispatcher.send(&events).await {
            self.relay.record(err);
        }
    }
}
