// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Severity levels and the filter deciding which records are shipped.

use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

/// Every supported level, in severity order.
pub static ALL_LEVELS: [Level; 6] = [
    Level::Debug,
    Level::Info,
    Level::Warn,
    Level::Error,
    Level::Fatal,
    Level::Panic,
];

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "panic" => Ok(Level::Panic),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

/// Returns `min` and every level more severe than it.
pub fn level_threshold(min: Level) -> Vec<Level> {
    ALL_LEVELS.iter().copied().filter(|l| *l >= min).collect()
}

/// Decides whether a record is eligible for shipment.
///
/// With no accepted set configured every level passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelFilter {
    accepted: Option<Vec<Level>>,
}

impl LevelFilter {
    pub fn all() -> Self {
        Self { accepted: None }
    }

    pub fn threshold(min: Level) -> Self {
        Self {
            accepted: Some(level_threshold(min)),
        }
    }

    pub fn from_levels(levels: &[Level]) -> Self {
        Self {
            accepted: Some(levels.to_vec()),
        }
    }

    /// The accepted levels, or [`ALL_LEVELS`] when no set was configured.
    pub fn levels(&self) -> &[Level] {
        match &self.accepted {
            Some(levels) => levels.as_slice(),
            None => &ALL_LEVELS[..],
        }
    }

    pub fn is_accepted(&self, level: Level) -> bool {
        self.levels().contains(&level)
    }
}
