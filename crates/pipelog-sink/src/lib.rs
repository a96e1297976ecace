//! Logging sinks for pipelog
//!
//! This crate provides the logging collaborator that pipelog writers deliver
//! lines to: the [`LogSink`] trait, a tracing-backed [`Logger`] with bound
//! [`Entry`] contexts, and an in-memory [`LogBuffer`].

mod buffer;
mod logger;
mod sink;

pub use buffer::{LevelCounts, LogBuffer};
pub use logger::{Entry, Logger};
pub use sink::LogSink;

// Re-export types used in our public API
pub use pipelog_types::{Level, ParseLevelError, Record};
