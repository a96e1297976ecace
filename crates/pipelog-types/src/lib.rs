//! Shared types for pipelog
//!
//! This crate contains the log level and record types used across the
//! pipelog crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Log Levels
// ============================================================================

/// Log severity level, ordered from least to most important
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Recognized by the parser, but writers have no dedicated call for it
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// Every level, in ascending order
    pub const ALL: [Level; 7] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
        Self::Panic,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known level
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("not a valid log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parse a level name, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "panic" => Ok(Self::Panic),
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A single delivered log entry, as retained by in-memory sinks
#[derive(Clone, Debug)]
pub struct Record {
    /// Unique sequential ID, assigned by the buffer that stores the record
    pub id: u64,

    /// Severity the entry was emitted at (`None` for a generic print)
    pub level: Option<Level>,

    /// Message text, without trailing line delimiter
    pub message: String,

    /// Fields bound to the emitting entry, in insertion order
    pub fields: Vec<(String, serde_json::Value)>,

    /// When the record was emitted
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Create a new record stamped with the current time
    pub fn new(level: Option<Level>, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            level,
            message: message.into(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach bound fields
    pub fn with_fields(mut self, fields: Vec<(String, serde_json::Value)>) -> Self {
        self.fields = fields;
        self
    }

    /// Level used for comparisons; a generic print counts as info
    pub fn effective_level(&self) -> Level {
        self.level.unwrap_or(Level::Info)
    }
}
