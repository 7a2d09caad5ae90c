// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logship::{
    config::ShipperConfig,
    encoder::{JsonEncoder, Record},
    event::now_millis,
    http::HttpLogService,
    level::Level,
    shipper_service::ShipperService,
};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGSHIP_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ShipperConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating logship config: {e}");
            return;
        }
    };

    let log_service = match HttpLogService::from_config(&config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Can't initialize log service client: {e}");
            return;
        }
    };

    let (shipper, worker) = match ShipperService::start(&config, log_service).await {
        Ok(started) => started,
        Err(e) => {
            error!("Can't initialize log shipper: {e}");
            return;
        }
    };
    info!(
        "Shipping to {}/{} via {}",
        config.group_name, config.stream_name, config.endpoint
    );

    let encoder = JsonEncoder;
    let records = std::iter::once(Record::new(
        Level::Debug,
        "don't need to send a message",
        now_millis(),
    ))
    .chain((1..=5).flat_map(|i| {
        [
            Record::new(Level::Info, format!("E{i}"), now_millis()).with_field("seq", i),
            Record::new(Level::Error, format!("E{i}"), now_millis()).with_field("seq", i),
        ]
    }));

    for record in records {
        if let Err(e) = shipper.write_record(&record, &encoder).await {
            error!("Failed to ship record: {e}");
        }
    }

    // Records are sent in batches: the last one is only delivered, and its failure only
    // reported, by an explicit flush.
    match shipper.shutdown().await {
        Ok(()) => info!("All records shipped"),
        Err(e) => error!("Final batch was not delivered: {e}"),
    }

    if let Err(e) = worker.await {
        error!("Shipper worker ended abnormally: {e}");
    }
}
