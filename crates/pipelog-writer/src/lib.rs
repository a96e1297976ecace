//! Line-scanning log writers for pipelog
//!
//! This crate turns any byte producer into leveled log output. A
//! [`LogWriter`] is an [`std::io::Write`] whose lines are scanned on a
//! background thread and emitted through a [`LogSink`], either all at one
//! level or each at the level named by its `[level]` tag.
//!
//! ```no_run
//! use std::io::Write;
//! use pipelog_writer::{Logger, WriterExt, WriterOptions};
//!
//! # fn main() -> std::io::Result<()> {
//! let logger = Logger::new();
//! let mut out = logger.try_writer_with(WriterOptions::dynamic())?;
//! writeln!(out, "[warn] disk almost full")?;
//! out.wait()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`WriterExt::writer`] and [`WriterExt::writer_level`] are shorthands
//! that panic if the scanner thread cannot be spawned.

mod level;
mod pipe;
mod scanner;
mod writer;

pub use level::{EmitFn, LevelMode, emitter_for, level_from_line};
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use scanner::{MAX_SCAN_TOKEN_SIZE, ScanError, ScanSession, active_scanners};
pub use writer::{LogWriter, WriterExt, WriterOptions};

// Re-export types used in our public API
pub use pipelog_sink::{Entry, LogBuffer, LogSink, Logger};
pub use pipelog_types::{Level, ParseLevelError, Record};
