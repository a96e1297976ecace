//! Line scanning loop behind every writer
//!
//! A [`ScanSession`] tokenizes a buffered reader into lines, bounded by a
//! maximum line size. The loop in [`scan`] replaces a session whenever it
//! fails and only returns on a clean end-of-stream.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

use pipelog_sink::LogSink;

use crate::level::Router;

/// Default maximum length of a single line, in bytes
pub const MAX_SCAN_TOKEN_SIZE: usize = 256 * 1024;

const READ_BUFFER_SIZE: usize = 8 * 1024;

static ACTIVE_SCANNERS: AtomicUsize = AtomicUsize::new(0);

/// Number of scanner loops currently running in this process
pub fn active_scanners() -> usize {
    ACTIVE_SCANNERS.load(Ordering::SeqCst)
}

/// Counts a scanner as active for as long as it is alive
pub(crate) struct ActiveScanner(());

impl ActiveScanner {
    pub(crate) fn register() -> Self {
        ACTIVE_SCANNERS.fetch_add(1, Ordering::SeqCst);
        Self(())
    }
}

impl Drop for ActiveScanner {
    fn drop(&mut self) {
        ACTIVE_SCANNERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Why a scan session stopped early
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("token too long (limit {limit} bytes)")]
    TooLong { limit: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One tokenizer pass over a reader
pub struct ScanSession<'a, R> {
    reader: &'a mut R,
    max_line_size: usize,

    /// Bytes of the line being assembled
    line: Vec<u8>,

    /// Dropping input up to the next newline
    skipping: bool,
}

impl<'a, R: BufRead> ScanSession<'a, R> {
    pub fn new(reader: &'a mut R, max_line_size: usize) -> Self {
        Self {
            reader,
            max_line_size,
            line: Vec::new(),
            skipping: false,
        }
    }

    /// Start by discarding the rest of a line a previous session gave up on
    pub fn resuming_mid_line(mut self) -> Self {
        self.skipping = true;
        self
    }

    /// Whether the session stopped partway through a line
    pub fn is_mid_line(&self) -> bool {
        self.skipping || !self.line.is_empty()
    }

    /// Next line without its `\n` (or `\r\n`); `Ok(None)` at end of stream
    pub fn next_line(&mut self) -> Result<Option<String>, ScanError> {
        loop {
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if chunk.is_empty() {
                self.skipping = false;
                if self.line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    if self.skipping {
                        self.reader.consume(newline + 1);
                        self.skipping = false;
                        continue;
                    }
                    // The newline itself must fit within the limit
                    if self.line.len() + newline >= self.max_line_size {
                        // The whole line is consumed, so the next session starts clean
                        self.reader.consume(newline + 1);
                        self.line.clear();
                        return Err(ScanError::TooLong {
                            limit: self.max_line_size,
                        });
                    }
                    self.line.extend_from_slice(&chunk[..newline]);
                    self.reader.consume(newline + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = chunk.len();
                    if self.skipping {
                        self.reader.consume(len);
                        continue;
                    }
                    if self.line.len() + len >= self.max_line_size {
                        self.reader.consume(len);
                        self.line.clear();
                        self.skipping = true;
                        return Err(ScanError::TooLong {
                            limit: self.max_line_size,
                        });
                    }
                    self.line.extend_from_slice(chunk);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        line
    }
}

/// Scan `reader` until a clean end-of-stream, routing every line to `sink`
///
/// A failed session is reported as one error entry through the sink and
/// replaced by a fresh one over the same reader; there is no retry limit.
/// The reader is dropped before returning.
pub(crate) fn scan<R: Read, S: LogSink>(
    reader: R,
    sink: &S,
    router: &Router<S>,
    max_line_size: usize,
) {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    let mut resume_mid_line = false;
    let mut lines: u64 = 0;
    let mut restarts: u64 = 0;

    loop {
        let mut session = ScanSession::new(&mut reader, max_line_size);
        if resume_mid_line {
            session = session.resuming_mid_line();
        }

        let result = loop {
            match session.next_line() {
                Ok(Some(line)) => {
                    router.route(sink, &line);
                    lines += 1;
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        match result {
            Ok(()) => break,
            Err(e) => {
                sink.error(&format!("Error while reading from Writer: {}", e));
                resume_mid_line = session.is_mid_line();
                restarts += 1;
                tracing::debug!(restarts, error = %e, "restarting scan session");
            }
        }
    }

    drop(reader);
    tracing::debug!(lines, restarts, "scanner reached end of stream");
}
