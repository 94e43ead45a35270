use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

pub const PROGRESS_FILENAME: &str = "progress.md";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Sink for operator-facing activity records. The migration engine only
/// talks to this trait so tests can swap in an in-memory recorder.
pub trait Journal {
    fn log(&self, level: Level, message: &str);
    fn progress(&self, category: &str, message: &str);

    fn action(&self, message: &str) {
        self.log(Level::Info, message);
    }
}

/// Append-only daily log file plus a newest-first Markdown progress journal,
/// both under one directory.
#[derive(Debug, Clone)]
pub struct OperationLog {
    dir: PathBuf,
}

impl OperationLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Daily log file for `date`, named `MMDDYYYY.log`.
    pub fn log_path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.log", date.format("%m%d%Y")))
    }

    pub fn current_log_path(&self) -> PathBuf {
        self.log_path_for(Local::now().date_naive())
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILENAME)
    }

    pub fn write(&self, level: Level, message: &str) -> Result<()> {
        let now = Local::now();
        let line = format_log_line(&now.format(TIMESTAMP_FORMAT).to_string(), level, message);
        let path = self.log_path_for(now.date_naive());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;

        match level {
            Level::Info => tracing::info!("{message}"),
            Level::Warning => tracing::warn!("{message}"),
            Level::Error => tracing::error!("{message}"),
        }
        Ok(())
    }

    /// Prepend a dated entry to the progress journal.
    pub fn record_progress(&self, category: &str, message: &str) -> Result<()> {
        let path = self.progress_path();
        let existing = if path.exists() {
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?
        } else {
            String::new()
        };
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let entry = format_progress_entry(&timestamp, category, message);
        fs::write(&path, format!("{entry}{existing}"))
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Create the progress journal with a header if it does not exist yet.
    /// Returns `true` when the file was created.
    pub fn initialize(&self) -> Result<bool> {
        let path = self.progress_path();
        if path.exists() {
            return Ok(false);
        }
        let started = Local::now().format(TIMESTAMP_FORMAT);
        fs::write(
            &path,
            format!("# Progress\n\nStarted: {started}\n\n---\n\n"),
        )
        .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }

    pub fn error(&self, message: &str, cause: Option<&anyhow::Error>) {
        let full = match cause {
            Some(cause) => format!("{message} - Exception: {cause:#}"),
            None => message.to_string(),
        };
        self.log(Level::Error, &full);
        self.progress("ERROR", &format!("ERROR: {full}"));
    }

    pub fn file_operation(&self, operation: &str, path: &Path, success: bool) {
        let status = if success { "SUCCESS" } else { "FAILED" };
        let level = if success { Level::Info } else { Level::Error };
        self.log(
            level,
            &format!("File {operation}: {} - {status}", path.display()),
        );
    }
}

impl Journal for OperationLog {
    fn log(&self, level: Level, message: &str) {
        if let Err(err) = self.write(level, message) {
            tracing::warn!("failed to write log line: {err:#}");
        }
    }

    fn progress(&self, category: &str, message: &str) {
        if let Err(err) = self.record_progress(category, message) {
            self.log(Level::Error, &format!("Failed to update progress: {err:#}"));
        }
    }
}

/// Discards log lines but still mirrors them to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJournal;

impl Journal for TracingJournal {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{message}"),
            Level::Warning => tracing::warn!("{message}"),
            Level::Error => tracing::error!("{message}"),
        }
    }

    fn progress(&self, category: &str, message: &str) {
        tracing::info!(category, "{message}");
    }
}

pub fn format_log_line(timestamp: &str, level: Level, message: &str) -> String {
    format!("{timestamp} - {} - {message}\n", level.as_str())
}

pub fn format_progress_entry(timestamp: &str, category: &str, message: &str) -> String {
    format!("### {timestamp} - {category}\n{message}\n\n---\n\n")
}
