//! Kept in its own test binary: the scanner count is process-wide.

use std::io::Write;

use pipelog_writer::{Level, LogBuffer, WriterExt, active_scanners};

#[test]
fn test_scanners_exit_after_close() {
    let baseline = active_scanners();
    let buffer = LogBuffer::new(16);

    let mut writers: Vec<_> = (0..4).map(|_| buffer.writer_level(Level::Info)).collect();
    assert_eq!(active_scanners(), baseline + 4);

    for (i, writer) in writers.iter_mut().enumerate() {
        writeln!(writer, "writer {}", i).unwrap();
    }
    for writer in writers {
        writer.wait().unwrap();
    }

    assert_eq!(active_scanners(), baseline);
    assert_eq!(buffer.len(), 4);
}
