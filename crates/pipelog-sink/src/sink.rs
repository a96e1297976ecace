use std::sync::Arc;

use pipelog_types::Level;

/// Destination for leveled log messages
///
/// One emitting call per level, plus a generic [`print`](LogSink::print)
/// that carries no severity of its own. Implementors only need
/// [`emit`](LogSink::emit); the per-level calls delegate to it.
pub trait LogSink: Send + Sync {
    /// Emit a message at `level`, or as a generic print when `None`
    fn emit(&self, level: Option<Level>, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Some(Level::Debug), message);
    }

    fn info(&self, message: &str) {
        self.emit(Some(Level::Info), message);
    }

    fn warn(&self, message: &str) {
        self.emit(Some(Level::Warn), message);
    }

    fn error(&self, message: &str) {
        self.emit(Some(Level::Error), message);
    }

    fn fatal(&self, message: &str) {
        self.emit(Some(Level::Fatal), message);
    }

    fn panic(&self, message: &str) {
        self.emit(Some(Level::Panic), message);
    }

    fn print(&self, message: &str) {
        self.emit(None, message);
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, level: Option<Level>, message: &str) {
        (**self).emit(level, message);
    }

    fn debug(&self, message: &str) {
        (**self).debug(message);
    }

    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }

    fn fatal(&self, message: &str) {
        (**self).fatal(message);
    }

    fn panic(&self, message: &str) {
        (**self).panic(message);
    }

    fn print(&self, message: &str) {
        (**self).print(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Option<Level>, String)>>);

    impl LogSink for Recorder {
        fn emit(&self, level: Option<Level>, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_default_calls_delegate_to_emit() {
        let sink = Recorder::default();
        sink.debug("a");
        sink.warn("b");
        sink.panic("c");
        sink.print("d");

        let seen = sink.0.lock().clone();
        assert_eq!(
            seen,
            vec![
                (Some(Level::Debug), "a".to_string()),
                (Some(Level::Warn), "b".to_string()),
                (Some(Level::Panic), "c".to_string()),
                (None, "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_arc_forwards() {
        let sink = Arc::new(Recorder::default());
        let shared: Arc<dyn LogSink> = sink.clone();
        shared.error("boom");
        assert_eq!(sink.0.lock()[0], (Some(Level::Error), "boom".to_string()));
    }
}
