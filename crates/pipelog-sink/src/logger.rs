use std::fmt::Write as _;

use serde_json::Value;

use pipelog_types::{Level, Record};

use crate::{LogBuffer, LogSink};

/// Root logger that emits through `tracing`
///
/// Messages below the logger's level are discarded. Fatal and panic
/// messages are logged at tracing's `ERROR` with a `severity` field; they
/// never terminate the process.
#[derive(Clone, Debug)]
pub struct Logger {
    /// Minimum level that gets emitted
    level: Level,

    /// Recently emitted records, if retention is enabled
    history: Option<LogBuffer>,
}

impl Logger {
    /// Create a logger that emits info and above
    pub fn new() -> Self {
        Self {
            level: Level::Info,
            history: None,
        }
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Retain the last `capacity` emitted records
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history = Some(LogBuffer::new(capacity));
        self
    }

    /// Minimum level that gets emitted
    pub fn level(&self) -> Level {
        self.level
    }

    /// Retained records, if retention is enabled
    pub fn history(&self) -> Option<&LogBuffer> {
        self.history.as_ref()
    }

    /// Check whether a message at `level` passes the threshold
    pub fn is_enabled(&self, level: Option<Level>) -> bool {
        level.unwrap_or(Level::Info) >= self.level
    }

    fn log(&self, level: Option<Level>, message: &str, fields: &[(String, Value)]) {
        if !self.is_enabled(level) {
            return;
        }

        if fields.is_empty() {
            dispatch(level, message);
        } else {
            dispatch(level, &render_fields(message, fields));
        }

        if let Some(history) = &self.history {
            history.push(Record::new(level, message).with_fields(fields.to_vec()));
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for Logger {
    fn emit(&self, level: Option<Level>, message: &str) {
        self.log(level, message, &[]);
    }
}

/// Logging context bound to a logger and a set of fields
#[derive(Clone, Debug)]
pub struct Entry {
    logger: Logger,
    fields: Vec<(String, Value)>,
}

impl Entry {
    pub fn new(logger: &Logger) -> Self {
        Self {
            logger: logger.clone(),
            fields: Vec::new(),
        }
    }

    /// Bind a field; a repeated key replaces the earlier value in place
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl LogSink for Entry {
    fn emit(&self, level: Option<Level>, message: &str) {
        self.logger.log(level, message, &self.fields);
    }
}

/// Append `key=value` pairs to a message
fn render_fields(message: &str, fields: &[(String, Value)]) -> String {
    let mut out = String::from(message);
    for (key, value) in fields {
        // Strings render bare; everything else as JSON
        let _ = match value {
            Value::String(s) => write!(out, " {}={}", key, s),
            other => write!(out, " {}={}", key, other),
        };
    }
    out
}

fn dispatch(level: Option<Level>, message: &str) {
    match level {
        Some(Level::Trace) => tracing::trace!(target: "pipelog", "{}", message),
        Some(Level::Debug) => tracing::debug!(target: "pipelog", "{}", message),
        Some(Level::Info) | None => tracing::info!(target: "pipelog", "{}", message),
        Some(Level::Warn) => tracing::warn!(target: "pipelog", "{}", message),
        Some(Level::Error) => tracing::error!(target: "pipelog", "{}", message),
        Some(Level::Fatal) => {
            tracing::error!(target: "pipelog", severity = "fatal", "{}", message)
        }
        Some(Level::Panic) => {
            tracing::error!(target: "pipelog", severity = "panic", "{}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_discards_lower_levels() {
        let logger = Logger::new().with_level(Level::Warn).with_history(8);
        logger.info("dropped");
        logger.print("also dropped");
        logger.warn("kept");
        logger.panic("kept too");

        let history = logger.history().unwrap();
        assert_eq!(history.messages(), vec!["kept", "kept too"]);
    }

    #[test]
    fn test_entry_shares_logger_history() {
        let logger = Logger::new().with_history(8);
        let entry = Entry::new(&logger).with_field("component", "db");
        entry.error("connection lost");

        let records = logger.history().unwrap().all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Some(Level::Error));
        assert_eq!(records[0].message, "connection lost");
        assert_eq!(records[0].fields[0].0, "component");
    }

    #[test]
    fn test_with_field_replaces_existing_key() {
        let entry = Entry::new(&Logger::new())
            .with_field("attempt", 1)
            .with_field("host", "a")
            .with_field("attempt", 2);

        assert_eq!(entry.fields().len(), 2);
        assert_eq!(entry.fields()[0], ("attempt".to_string(), Value::from(2)));
    }

    #[test]
    fn test_render_fields() {
        let fields = vec![
            ("host".to_string(), Value::from("db1")),
            ("port".to_string(), Value::from(5432)),
        ];
        assert_eq!(render_fields("up", &fields), "up host=db1 port=5432");
    }
}
