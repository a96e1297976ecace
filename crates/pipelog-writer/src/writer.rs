use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use pipelog_sink::LogSink;
use pipelog_types::Level;

use crate::level::{LevelMode, Router};
use crate::pipe::{PipeWriter, pipe};
use crate::scanner::{self, ActiveScanner, MAX_SCAN_TOKEN_SIZE};

/// Settings for a new writer
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// How each line's level is chosen
    pub mode: LevelMode,

    /// Line buffer size in bytes; a line plus its newline must fit
    pub max_line_size: usize,

    /// Name of the scanner thread
    pub thread_name: String,
}

impl WriterOptions {
    /// Per-line levels from `[level]` tags
    pub fn dynamic() -> Self {
        Self::default()
    }

    /// Every line at `level`
    pub fn fixed(level: Level) -> Self {
        Self {
            mode: LevelMode::Fixed(level),
            ..Self::default()
        }
    }

    pub fn with_max_line_size(mut self, max_line_size: usize) -> Self {
        self.max_line_size = max_line_size;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mode: LevelMode::Dynamic,
            max_line_size: MAX_SCAN_TOKEN_SIZE,
            thread_name: "pipelog-scanner".to_string(),
        }
    }
}

/// Write end of a log pipe
///
/// Every `\n`-terminated line written here becomes one entry on the sink the
/// writer was made from. Writes block until the scanner thread has taken the
/// bytes.
///
/// Call [`close`](LogWriter::close) or [`wait`](LogWriter::wait) when done.
/// Dropping an unclosed writer closes it as well, but that is a fallback:
/// the scanner thread only exits once the writer is closed one way or the
/// other, and only `wait` guarantees every line has been emitted.
pub struct LogWriter {
    pipe: PipeWriter,
    scanner: Option<JoinHandle<()>>,
}

impl LogWriter {
    /// Close the write end. The scanner emits any buffered partial line and
    /// exits. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.pipe.close();
    }

    /// Close and block until the scanner thread has exited
    pub fn wait(mut self) -> io::Result<()> {
        self.pipe.close();
        match self.scanner.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| io::Error::other("log scanner thread panicked")),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.is_closed()
    }

    /// Whether the scanner thread has exited
    pub fn is_finished(&self) -> bool {
        self.scanner.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pipe.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pipe.flush()
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if !self.pipe.is_closed() {
            tracing::debug!("log writer dropped without close, closing it");
            self.pipe.close();
        }
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("closed", &self.is_closed())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Writers for any cloneable sink
///
/// Each call starts one scanner thread bound to the returned writer.
pub trait WriterExt: LogSink + Clone + 'static {
    /// Writer whose lines take their level from a `[level]` tag
    ///
    /// Panics if the scanner thread cannot be spawned.
    fn writer(&self) -> LogWriter {
        self.writer_with(WriterOptions::dynamic())
    }

    /// Writer whose lines all go out at `level`
    ///
    /// Panics if the scanner thread cannot be spawned.
    fn writer_level(&self, level: Level) -> LogWriter {
        self.writer_with(WriterOptions::fixed(level))
    }

    /// Writer with explicit options
    ///
    /// Panics if the scanner thread cannot be spawned; see
    /// [`try_writer_with`](WriterExt::try_writer_with).
    fn writer_with(&self, options: WriterOptions) -> LogWriter {
        self.try_writer_with(options)
            .expect("failed to spawn log scanner thread")
    }

    /// Writer with explicit options, reporting a failed thread spawn
    fn try_writer_with(&self, options: WriterOptions) -> io::Result<LogWriter> {
        spawn_writer(self.clone(), options)
    }
}

impl<S: LogSink + Clone + 'static> WriterExt for S {}

fn spawn_writer<S: LogSink + 'static>(sink: S, options: WriterOptions) -> io::Result<LogWriter> {
    let (reader, pipe) = pipe();
    let router = Router::<S>::new(options.mode);
    let max_line_size = options.max_line_size;
    let active = ActiveScanner::register();

    let scanner = thread::Builder::new()
        .name(options.thread_name)
        .spawn(move || {
            let _active = active;
            scanner::scan(reader, &sink, &router, max_line_size);
        })?;

    Ok(LogWriter {
        pipe,
        scanner: Some(scanner),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipelog_sink::LogBuffer;

    #[test]
    fn test_fixed_writer_routes_every_line() {
        let buffer = LogBuffer::new(16);
        let mut writer = buffer.writer_level(Level::Warn);
        writer.write_all(b"[error] tagged\nplain\n").unwrap();
        writer.wait().unwrap();

        let records = buffer.all();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.level == Some(Level::Warn)));
    }

    #[test]
    fn test_dynamic_writer_reads_tags() {
        let buffer = LogBuffer::new(16);
        let mut writer = buffer.writer();
        writer
            .write_all(b"[warn] disk low\nplain line, no tag\n[bogus] text\n")
            .unwrap();
        writer.wait().unwrap();

        let levels: Vec<_> = buffer.all().into_iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            vec![Some(Level::Warn), Some(Level::Info), Some(Level::Info)]
        );
        assert_eq!(buffer.messages()[0], "[warn] disk low");
    }

    #[test]
    fn test_write_after_close_is_broken_pipe() {
        let buffer = LogBuffer::new(4);
        let mut writer = buffer.writer();
        writer.close();
        writer.close();
        let err = writer.write(b"late\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        writer.wait().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wait_flushes_partial_line() {
        let buffer = LogBuffer::new(4);
        let mut writer = buffer.writer_level(Level::Error);
        write!(writer, "no newline at end").unwrap();
        writer.wait().unwrap();
        assert_eq!(buffer.messages(), vec!["no newline at end"]);
    }

    #[test]
    fn test_try_writer_with_delivers_lines() {
        let buffer = LogBuffer::new(4);
        let mut writer = buffer
            .try_writer_with(WriterOptions::fixed(Level::Info).with_thread_name("child-stdout"))
            .unwrap();
        writeln!(writer, "hello").unwrap();
        assert!(!writer.is_finished());
        writer.wait().unwrap();
        assert_eq!(buffer.messages(), vec!["hello"]);
    }

    #[test]
    fn test_options_builder() {
        let options = WriterOptions::fixed(Level::Debug)
            .with_max_line_size(1024)
            .with_thread_name("child-stdout");
        assert_eq!(options.mode, LevelMode::Fixed(Level::Debug));
        assert_eq!(options.max_line_size, 1024);
        assert_eq!(options.thread_name, "child-stdout");
        assert_eq!(WriterOptions::default().max_line_size, 262_144);
    }
}
