use pipelog_sink::LogSink;
use pipelog_types::Level;

/// A sink's emitting call for one level
pub type EmitFn<S> = fn(&S, &str);

/// How a writer picks the level for each line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LevelMode {
    /// Every line goes out at this level
    Fixed(Level),

    /// Each line is tagged by its first `[level]`, defaulting to info
    #[default]
    Dynamic,
}

/// Map a level to the sink call that emits it
///
/// `Trace` has no dedicated call and falls back to the generic print.
pub fn emitter_for<S: LogSink>(level: Level) -> EmitFn<S> {
    match level {
        Level::Debug => S::debug,
        Level::Info => S::info,
        Level::Warn => S::warn,
        Level::Error => S::error,
        Level::Fatal => S::fatal,
        Level::Panic => S::panic,
        Level::Trace => S::print,
    }
}

/// Read the level tag out of a line
///
/// Looks at the text between the first `[` and the first `]` after it.
/// Lines without such a pair, or whose tag is not a level name, are info.
pub fn level_from_line(line: &str) -> Level {
    line.find('[')
        .and_then(|open| {
            let rest = &line[open + 1..];
            rest.find(']').map(|close| &rest[..close])
        })
        .and_then(|tag| tag.parse().ok())
        .unwrap_or(Level::Info)
}

/// Resolved dispatch for one writer
pub(crate) enum Router<S> {
    /// Resolved once, when the writer was created
    Fixed(EmitFn<S>),
    Dynamic,
}

impl<S: LogSink> Router<S> {
    pub(crate) fn new(mode: LevelMode) -> Self {
        match mode {
            LevelMode::Fixed(level) => Self::Fixed(emitter_for::<S>(level)),
            LevelMode::Dynamic => Self::Dynamic,
        }
    }

    pub(crate) fn route(&self, sink: &S, line: &str) {
        match self {
            Self::Fixed(emit) => emit(sink, line),
            Self::Dynamic => emitter_for::<S>(level_from_line(line))(sink, line),
        }
    }
}
