// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogService`] over HTTP, speaking the JSON protocol of the CloudWatch Logs API.
//!
//! Every operation is a `POST /` with the operation named in the `X-Amz-Target` header. Request
//! signing is not handled here: the `Authorization` header comes from a [`CredentialFactory`],
//! so the endpoint is expected to accept that value (a signing proxy, a local emulator, ...).

use async_trait::async_trait;
use core::time::Duration;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::{debug, error};

use crate::config::ShipperConfig;
use crate::credentials::CredentialFactory;
use crate::errors::Creation;
use crate::event::LogEvent;
use crate::service::{LogService, PutError, SequenceToken};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Logs_20140328";
// Upper bound on describe pages walked while looking for an exact name match
const MAX_DESCRIBE_PAGES: usize = 20;

/// Builds a reqwest client with optional proxy configuration and timeout.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsRequest<'a> {
    log_group_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogGroupsResponse {
    #[serde(default)]
    log_groups: Vec<LogGroup>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogGroup {
    log_group_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    log_stream_name: String,
    upload_sequence_token: Option<SequenceToken>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    log_group_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_stream_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [LogEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a SequenceToken>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<SequenceToken>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<SequenceToken>,
}

impl ServiceErrorBody {
    /// Exception name without the optional `namespace#` prefix.
    fn name(&self) -> &str {
        self.kind.rsplit('#').next().unwrap_or_default()
    }
}

enum Fault {
    Service { status: u16, body: ServiceErrorBody },
    Put(PutError),
}

impl From<Fault> for PutError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Put(err) => err,
            Fault::Service { status, body } => match body.name() {
                "InvalidSequenceTokenException" => PutError::InvalidSequenceToken {
                    expected: body.expected_sequence_token,
                },
                "DataAlreadyAcceptedException" => PutError::DataAlreadyAccepted {
                    expected: body.expected_sequence_token,
                },
                name => PutError::Rejected {
                    status,
                    message: format!("{name}: {}", body.message),
                },
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpLogService {
    client: reqwest::Client,
    endpoint: String,
    credentials: CredentialFactory,
}

impl HttpLogService {
    pub fn new(client: reqwest::Client, endpoint: String, credentials: CredentialFactory) -> Self {
        HttpLogService {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn from_config(config: &ShipperConfig) -> Result<Self, Creation> {
        let client = build_client(config.https_proxy.as_deref(), config.request_timeout)
            .map_err(|e| Creation::Client(e.to_string()))?;
        Ok(Self::new(
            client,
            config.endpoint.clone(),
            CredentialFactory::from(config.credentials.clone()),
        ))
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, Fault>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| Fault::Put(PutError::Payload(e.to_string())))?;

        let mut builder = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(body);
        if let Some(credentials) = self.credentials.get().await {
            builder = builder.header("Authorization", credentials);
        }

        let time = std::time::Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| Fault::Put(PutError::Transport(e.to_string())))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Fault::Put(PutError::Transport(e.to_string())))?;
        debug!(
            "{operation} answered {status} in {} ms",
            time.elapsed().as_millis()
        );

        if status.is_success() {
            let text = if text.trim().is_empty() { "{}" } else { &text };
            serde_json::from_str(text).map_err(|e| {
                Fault::Put(PutError::Payload(format!(
                    "unexpected {operation} response: {e}"
                )))
            })
        } else {
            let body = serde_json::from_str::<ServiceErrorBody>(&text).unwrap_or_else(|_| {
                ServiceErrorBody {
                    message: text,
                    ..Default::default()
                }
            });
            Err(Fault::Service {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Runs a create operation, treating an already existing resource as success.
    async fn create(&self, operation: &str, request: &CreateRequest<'_>) -> Result<(), PutError> {
        match self.call::<_, IgnoredAny>(operation, request).await {
            Ok(_) => Ok(()),
            Err(Fault::Service { body, .. }) if body.name() == "ResourceAlreadyExistsException" => {
                debug!("{operation}: resource already exists");
                Ok(())
            }
            Err(fault) => Err(fault.into()),
        }
    }

    async fn group_exists(&self, group: &str) -> Result<bool, PutError> {
        let mut next_token = None;
        for _ in 0..MAX_DESCRIBE_PAGES {
            let response: DescribeLogGroupsResponse = self
                .call(
                    "DescribeLogGroups",
                    &DescribeLogGroupsRequest {
                        log_group_name_prefix: group,
                        next_token,
                    },
                )
                .await?;
            if response.log_groups.iter().any(|g| g.log_group_name == group) {
                return Ok(true);
            }
            match response.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(false),
            }
        }
        Ok(false)
    }

    async fn find_stream(&self, group: &str, stream: &str) -> Result<Option<LogStream>, PutError> {
        let mut next_token = None;
        for _ in 0..MAX_DESCRIBE_PAGES {
            let response: DescribeLogStreamsResponse = self
                .call(
                    "DescribeLogStreams",
                    &DescribeLogStreamsRequest {
                        log_group_name: group,
                        log_stream_name_prefix: stream,
                        next_token,
                    },
                )
                .await?;
            if let Some(found) = response
                .log_streams
                .into_iter()
                .find(|s| s.log_stream_name == stream)
            {
                return Ok(Some(found));
            }
            match response.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(None),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl LogService for HttpLogService {
    async fn ensure_group(&self, group: &str) -> Result<(), PutError> {
        if self.group_exists(group).await? {
            return Ok(());
        }
        debug!("Creating log group {group}");
        self.create(
            "CreateLogGroup",
            &CreateRequest {
                log_group_name: group,
                log_stream_name: None,
            },
        )
        .await
    }

    async fn ensure_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Option<SequenceToken>, PutError> {
        if let Some(existing) = self.find_stream(group, stream).await? {
            return Ok(existing.upload_sequence_token);
        }
        debug!("Creating log stream {group}/{stream}");
        self.create(
            "CreateLogStream",
            &CreateRequest {
                log_group_name: group,
                log_stream_name: Some(stream),
            },
        )
        .await?;
        Ok(None)
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<SequenceToken>, PutError> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: events,
            sequence_token: token,
        };
        match self
            .call::<_, PutLogEventsResponse>("PutLogEvents", &request)
            .await
        {
            Ok(response) => Ok(response.next_sequence_token),
            Err(fault) => {
                let err = PutError::from(fault);
                if !matches!(
                    err,
                    PutError::InvalidSequenceToken { .. } | PutError::DataAlreadyAccepted { .. }
                ) {
                    error!("PutLogEvents to {group}/{stream} failed: {err}");
                }
                Err(err)
            }
        }
    }
}
