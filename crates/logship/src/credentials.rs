// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};
use tokio::sync::OnceCell;

pub type CredentialResolverFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Option<String>> + Send>> + Send + Sync>;

/// Supplies the `Authorization` header value for requests to the log service.
///
/// A dynamic factory runs its resolver once, on first use, so credential lookup is deferred
/// until the first request.
#[derive(Clone)]
pub enum CredentialFactory {
    None,
    Static(String),
    Dynamic {
        resolver_fn: CredentialResolverFn,
        value: Arc<OnceCell<Option<String>>>,
    },
}

impl CredentialFactory {
    pub fn new_from_resolver(resolver_fn: CredentialResolverFn) -> Self {
        Self::Dynamic {
            resolver_fn,
            value: Arc::new(OnceCell::new()),
        }
    }

    pub fn new_from_static(value: &str) -> Self {
        Self::Static(value.to_string())
    }

    pub async fn get(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Static(value) => Some(value),
            Self::Dynamic { resolver_fn, value } => value
                .get_or_init(|| async { (resolver_fn)().await })
                .await
                .as_deref(),
        }
    }
}

impl From<Option<String>> for CredentialFactory {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(value) => Self::Static(value),
            None => Self::None,
        }
    }
}

impl Debug for CredentialFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialFactory")
    }
}
