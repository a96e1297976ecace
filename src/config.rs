//! Settings for the pipelog CLI
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command line flags, each layer overriding the previous one.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use pipelog_writer::{Level, LevelMode, MAX_SCAN_TOKEN_SIZE, ParseLevelError};

/// Errors while loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid stream level {0:?}, expected \"dynamic\" or a level name")]
    InvalidMode(String),

    #[error("max_line_size must be greater than zero")]
    ZeroLineSize,
}

impl From<ParseLevelError> for ConfigError {
    fn from(err: ParseLevelError) -> Self {
        Self::InvalidMode(err.0)
    }
}

/// Parse a stream level: `dynamic` or a level name
pub fn parse_mode(s: &str) -> Result<LevelMode, ConfigError> {
    if s.eq_ignore_ascii_case("dynamic") {
        return Ok(LevelMode::Dynamic);
    }
    Ok(LevelMode::Fixed(s.parse::<Level>()?))
}

/// Contents of a config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Level mode for the child's stdout
    pub stdout: Option<String>,

    /// Level mode for the child's stderr
    pub stderr: Option<String>,

    /// Minimum level that gets emitted
    pub min_level: Option<Level>,

    /// Longest accepted line, in bytes
    pub max_line_size: Option<usize>,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: Option<String>,

    /// Print per-level counts when the command exits
    pub summary: Option<bool>,

    /// Records retained for the summary
    pub history: Option<usize>,
}

impl FileConfig {
    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub stdout: LevelMode,
    pub stderr: LevelMode,
    pub min_level: Level,
    pub max_line_size: usize,
    pub log_filter: String,
    pub summary: bool,
    pub history: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stdout: LevelMode::Dynamic,
            stderr: LevelMode::Fixed(Level::Error),
            min_level: Level::Debug,
            max_line_size: MAX_SCAN_TOKEN_SIZE,
            log_filter: "debug".to_string(),
            summary: false,
            history: 10_000,
        }
    }
}

impl Settings {
    /// Apply a config file over the current values
    pub fn merge_file(mut self, file: FileConfig) -> Result<Self, ConfigError> {
        if let Some(mode) = file.stdout {
            self.stdout = parse_mode(&mode)?;
        }
        if let Some(mode) = file.stderr {
            self.stderr = parse_mode(&mode)?;
        }
        if let Some(level) = file.min_level {
            self.min_level = level;
        }
        if let Some(size) = file.max_line_size {
            self.max_line_size = size;
        }
        if let Some(filter) = file.log_filter {
            self.log_filter = filter;
        }
        if let Some(summary) = file.summary {
            self.summary = summary;
        }
        if let Some(history) = file.history {
            self.history = history;
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_line_size == 0 {
            return Err(ConfigError::ZeroLineSize);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("dynamic").unwrap(), LevelMode::Dynamic);
        assert_eq!(parse_mode("Dynamic").unwrap(), LevelMode::Dynamic);
        assert_eq!(
            parse_mode("warning").unwrap(),
            LevelMode::Fixed(Level::Warn)
        );
        assert!(matches!(
            parse_mode("loud"),
            Err(ConfigError::InvalidMode(s)) if s == "loud"
        ));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = FileConfig::parse(
            r#"
            stdout = "info"
            stderr = "dynamic"
            min_level = "warn"
            max_line_size = 4096
            summary = true
            "#,
        )
        .unwrap();

        let settings = Settings::default().merge_file(file).unwrap();
        assert_eq!(settings.stdout, LevelMode::Fixed(Level::Info));
        assert_eq!(settings.stderr, LevelMode::Dynamic);
        assert_eq!(settings.min_level, Level::Warn);
        assert_eq!(settings.max_line_size, 4096);
        assert!(settings.summary);
        // untouched keys keep their defaults
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.history, 10_000);
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let file = FileConfig::parse("").unwrap();
        assert_eq!(
            Settings::default().merge_file(file).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_size() {
        assert!(matches!(
            FileConfig::parse("colour = true"),
            Err(ConfigError::Parse(_))
        ));

        let file = FileConfig::parse("max_line_size = 0").unwrap();
        assert!(matches!(
            Settings::default().merge_file(file),
            Err(ConfigError::ZeroLineSize)
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/pipelog.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
