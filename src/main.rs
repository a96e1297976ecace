use std::io;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus, Stdio};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;

use pipelog_writer::{Entry, Level, LevelMode, Logger, WriterExt, WriterOptions};

mod config;

use config::{FileConfig, Settings, parse_mode};

/// pipelog - run a command and log each line of its output
#[derive(Parser, Debug)]
#[command(name = "pipelog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Level for stdout lines, or "dynamic" to read `[level]` tags
    #[arg(long, value_name = "LEVEL", value_parser = parse_mode)]
    stdout: Option<LevelMode>,

    /// Level for stderr lines, or "dynamic" to read `[level]` tags
    #[arg(long, value_name = "LEVEL", value_parser = parse_mode)]
    stderr: Option<LevelMode>,

    /// Discard lines below this level
    #[arg(long, value_name = "LEVEL")]
    min_level: Option<Level>,

    /// Longest accepted line in bytes
    #[arg(long, value_name = "BYTES")]
    max_line_size: Option<usize>,

    /// TOML config file
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log per-level line counts when the command exits
    #[arg(long)]
    summary: bool,

    /// Command to run, with its arguments
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Args {
    /// Defaults, then config file, then flags
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        if let Some(path) = &self.config {
            let file = FileConfig::load(path)?;
            settings = settings.merge_file(file)?;
        }

        if let Some(mode) = self.stdout {
            settings.stdout = mode;
        }
        if let Some(mode) = self.stderr {
            settings.stderr = mode;
        }
        if let Some(level) = self.min_level {
            settings.min_level = level;
        }
        if let Some(size) = self.max_line_size {
            settings.max_line_size = size;
        }
        if self.summary {
            settings.summary = true;
        }

        Ok(settings.validate()?)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let settings = args.settings()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut logger = Logger::new().with_level(settings.min_level);
    if settings.summary {
        logger = logger.with_history(settings.history);
    }

    let result = run(&args.command, &settings, &logger).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }
    let status = result?;

    if settings.summary {
        log_summary(&logger);
    }

    let code = status.code().unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Run `command`, logging its stdout and stderr until both close
async fn run(command: &[String], settings: &Settings, logger: &Logger) -> Result<ExitStatus> {
    let (program, args) = command.split_first().context("No command given")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {}", program))?;

    let stdout = child
        .stdout
        .take()
        .context("Child stdout was not captured")?;
    let stderr = child
        .stderr
        .take()
        .context("Child stderr was not captured")?;

    let entry = Entry::new(logger).with_field("cmd", program.as_str());
    let stdout_task = forward(
        stdout,
        entry.clone().with_field("stream", "stdout"),
        stream_options(settings.stdout, settings, "stdout"),
    );
    let stderr_task = forward(
        stderr,
        entry.with_field("stream", "stderr"),
        stream_options(settings.stderr, settings, "stderr"),
    );

    let status = tokio::select! {
        status = child.wait() => status.context("Failed to wait for command")?,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!(program = %program, "interrupted, stopping command");
            child.kill().await.context("Failed to stop command")?;
            child.wait().await.context("Failed to wait for command")?
        }
    };

    let (stdout_lines, stderr_lines) = tokio::try_join!(stdout_task, stderr_task)?;
    let stdout_bytes = stdout_lines.context("Failed to forward stdout")?;
    let stderr_bytes = stderr_lines.context("Failed to forward stderr")?;

    tracing::debug!(
        program = %program,
        %status,
        stdout_bytes,
        stderr_bytes,
        "command finished"
    );

    Ok(status)
}

fn stream_options(mode: LevelMode, settings: &Settings, stream: &str) -> WriterOptions {
    WriterOptions {
        mode,
        max_line_size: settings.max_line_size,
        thread_name: format!("pipelog-{}", stream),
    }
}

/// Copy a child pipe into a log writer on a blocking thread
fn forward<R>(source: R, entry: Entry, options: WriterOptions) -> JoinHandle<io::Result<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut source = SyncIoBridge::new(source);
        let mut writer = entry.try_writer_with(options)?;
        let copied = io::copy(&mut source, &mut writer)?;
        writer.wait()?;
        Ok(copied)
    })
}

fn log_summary(logger: &Logger) {
    let Some(history) = logger.history() else {
        return;
    };
    let counts = history.level_counts();
    tracing::info!(
        total = counts.total(),
        debug = counts.debug,
        info = counts.info,
        warn = counts.warn,
        error = counts.error,
        fatal = counts.fatal,
        panic = counts.panic,
        print = counts.print,
        "line summary"
    );
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pipelog_writer::Record;

    fn stream_of(record: &Record) -> Option<&str> {
        record
            .fields
            .iter()
            .find(|(k, _)| k == "stream")
            .and_then(|(_, v)| v.as_str())
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_run_logs_both_streams() {
        let logger = Logger::new().with_level(Level::Debug).with_history(64);
        let settings = Settings::default();

        let status = run(
            &sh("echo '[warn] disk low'; echo 'plain'; echo 'oops' >&2"),
            &settings,
            &logger,
        )
        .await
        .unwrap();
        assert!(status.success());

        let records = logger.history().unwrap().all();

        let stdout: Vec<_> = records
            .iter()
            .filter(|r| stream_of(r) == Some("stdout"))
            .map(|r| (r.level, r.message.as_str()))
            .collect();
        assert_eq!(
            stdout,
            vec![(Some(Level::Warn), "[warn] disk low"), (Some(Level::Info), "plain")]
        );

        let stderr: Vec<_> = records
            .iter()
            .filter(|r| stream_of(r) == Some("stderr"))
            .map(|r| (r.level, r.message.as_str()))
            .collect();
        assert_eq!(stderr, vec![(Some(Level::Error), "oops")]);
    }

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let logger = Logger::new();
        let status = run(&sh("exit 3"), &Settings::default(), &logger)
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let logger = Logger::new();
        let command = vec!["/nonexistent/pipelog-test-binary".to_string()];
        assert!(run(&command, &Settings::default(), &logger).await.is_err());
    }

    #[test]
    fn test_stream_and_threshold_flags() {
        let args = Args::parse_from([
            "pipelog",
            "--stderr",
            "dynamic",
            "--min-level",
            "warn",
            "--",
            "make",
        ]);

        let settings = args.settings().unwrap();
        assert_eq!(settings.stdout, LevelMode::Dynamic);
        assert_eq!(settings.stderr, LevelMode::Dynamic);
        assert_eq!(settings.min_level, Level::Warn);
        assert!(Args::try_parse_from(["pipelog", "--stdout", "loud", "--", "ls"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "pipelog",
            "--stdout",
            "error",
            "--max-line-size",
            "512",
            "--summary",
            "--",
            "ls",
            "-l",
        ]);
        assert_eq!(args.command, vec!["ls", "-l"]);

        let settings = args.settings().unwrap();
        assert_eq!(settings.stdout, LevelMode::Fixed(Level::Error));
        assert_eq!(settings.stderr, LevelMode::Fixed(Level::Error));
        assert_eq!(settings.max_line_size, 512);
        assert!(settings.summary);
    }
}
