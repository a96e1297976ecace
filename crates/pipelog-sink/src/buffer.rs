use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use pipelog_types::{Level, Record};

use crate::LogSink;

/// Thread-safe ring buffer of emitted records
#[derive(Clone, Debug)]
pub struct LogBuffer {
    /// Internal storage
    records: Arc<RwLock<VecDeque<Record>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next record ID
    next_id: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new record, evicting oldest if at capacity
    pub fn push(&self, mut record: Record) {
        if self.capacity == 0 {
            return;
        }
        record.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Get all records (cloned)
    pub fn all(&self) -> Vec<Record> {
        self.records.read().iter().cloned().collect()
    }

    /// Get the messages of all records, in delivery order
    pub fn messages(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    /// Get records at or above a minimum level (prints count as info)
    pub fn by_level(&self, min_level: Level) -> Vec<Record> {
        self.records
            .read()
            .iter()
            .filter(|r| r.effective_level() >= min_level)
            .cloned()
            .collect()
    }

    /// Get record count per level
    pub fn level_counts(&self) -> LevelCounts {
        let records = self.records.read();
        let mut counts = LevelCounts::default();

        for record in records.iter() {
            match record.level {
                Some(Level::Trace) => counts.trace += 1,
                Some(Level::Debug) => counts.debug += 1,
                Some(Level::Info) => counts.info += 1,
                Some(Level::Warn) => counts.warn += 1,
                Some(Level::Error) => counts.error += 1,
                Some(Level::Fatal) => counts.fatal += 1,
                Some(Level::Panic) => counts.panic += 1,
                None => counts.print += 1,
            }
        }

        counts
    }

    /// Total record count
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clear all records
    pub fn clear(&self) {
        self.records.write().clear();
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Get the last N records
    pub fn tail(&self, n: usize) -> Vec<Record> {
        let records = self.records.read();
        let start = records.len().saturating_sub(n);
        records.iter().skip(start).cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl LogSink for LogBuffer {
    fn emit(&self, level: Option<Level>, message: &str) {
        self.push(Record::new(level, message));
    }
}

/// Counts per level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub trace: usize,
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
    pub panic: usize,
    /// Generic prints, which carry no level
    pub print: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.trace
            + self.debug
            + self.info
            + self.warn
            + self.error
            + self.fatal
            + self.panic
            + self.print
    }
}
