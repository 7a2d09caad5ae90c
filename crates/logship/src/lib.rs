// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ships structured log records to a remote log stream in size- and time-bounded batches.
//!
//! Callers submit records one at a time through a [`shipper_service::ShipperHandle`]. A single
//! background worker assembles them into batches, sends each batch with the stream's current
//! sequence token and reports delivery failures back on the next caller operation.
//!
//! Delivery failures are asynchronous: a `write` can succeed even though its event is later lost
//! in a failed batch send. Call `flush` (or `shutdown`) before exiting and check its result to
//! learn about the final batch.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod encoder;
pub mod errors;
pub mod event;
pub mod http;
pub mod level;
pub mod relay;
pub mod service;
pub mod shipper_service;
