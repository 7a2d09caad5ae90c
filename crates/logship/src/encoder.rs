// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rendering of structured records into the message strings that get shipped.

use serde_json::{Map, Value};

use crate::errors::EncodeError;
use crate::level::Level;

/// A structured record before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>, timestamp: i64) -> Self {
        Record {
            level,
            message: message.into(),
            timestamp,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record) -> Result<String, EncodeError>;
}

/// One JSON object per record holding `level`, `ts`, `msg` and the record's fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, record: &Record) -> Result<String, EncodeError> {
        let mut object = Map::with_capacity(record.fields.len() + 3);
        object.insert("level".to_string(), Value::from(record.level.as_str()));
        object.insert("ts".to_string(), Value::from(record.timestamp));
        object.insert("msg".to_string(), Value::from(record.message.as_str()));
        for (key, value) in &record.fields {
            object.insert(key.clone(), value.clone());
        }
        serde_json::to_string(&Value::Object(object))
            .map_err(|e| EncodeError::Serialize(e.to_string()))
    }
}

/// `LEVEL message key=value ...`, for humans reading the stream directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEncoder;

impl Encoder for PlainEncoder {
    fn encode(&self, record: &Record) -> Result<String, EncodeError> {
        let mut line = format!(
            "{} {}",
            record.level.as_str().to_uppercase(),
            record.message
        );
        for (key, value) in &record.fields {
            match value {
                Value::String(s) => line.push_str(&format!(" {key}={s}")),
                other => line.push_str(&format!(" {key}={other}")),
            }
        }
        Ok(line)
    }
}
