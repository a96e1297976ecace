//! Synchronous in-process byte pipe
//!
//! A write hands its bytes to the reader and blocks until every byte has been
//! read (or the reader goes away). There is no buffering beyond the write in
//! flight, so a slow reader throttles the writer.

use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct State {
    /// Bytes of the write currently in flight
    data: Vec<u8>,

    /// How much of `data` the reader has taken
    pos: usize,

    writer_closed: bool,
    reader_closed: bool,
}

impl State {
    fn pending(&self) -> usize {
        self.data.len() - self.pos
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,

    /// Signalled when data arrives or the writer closes
    readable: Condvar,

    /// Signalled when the in-flight write is drained or the reader closes
    drained: Condvar,
}

/// Create a connected reader/writer pair
pub fn pipe() -> (PipeReader, PipeWriter) {
    let shared = Arc::new(Shared::default());
    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

/// Read half of a [`pipe`]
///
/// Reads return `Ok(0)` once the writer has closed and all written data has
/// been consumed. Dropping the reader makes pending and later writes fail.
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        loop {
            let pending = state.pending();
            if pending > 0 {
                let n = pending.min(out.len());
                let start = state.pos;
                out[..n].copy_from_slice(&state.data[start..start + n]);
                state.pos += n;
                if state.pending() == 0 {
                    self.shared.drained.notify_one();
                }
                return Ok(n);
            }

            if state.writer_closed {
                return Ok(0);
            }

            self.shared.readable.wait(&mut state);
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.state.lock().reader_closed = true;
        self.shared.drained.notify_all();
    }
}

/// Write half of a [`pipe`]
///
/// Dropping the writer closes it.
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Close the write half; the reader sees end-of-stream once drained.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        let mut state = self.shared.state.lock();
        if !state.writer_closed {
            state.writer_closed = true;
            self.shared.readable.notify_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().writer_closed
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        if state.writer_closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write on closed pipe",
            ));
        }
        if state.reader_closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader is gone",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        state.data.clear();
        state.data.extend_from_slice(buf);
        state.pos = 0;
        self.shared.readable.notify_one();

        while state.pending() > 0 && !state.reader_closed {
            self.shared.drained.wait(&mut state);
        }

        let written = state.pos;
        state.data.clear();
        state.pos = 0;

        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader is gone",
            ));
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}
