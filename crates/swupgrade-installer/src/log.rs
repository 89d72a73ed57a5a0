use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Ok,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Secondary destination for log events, such as the terminal.
pub trait LogSink {
    fn emit(&mut self, level: LogLevel, message: &str);
}

/// Append-only run log. Every event is written to the log file as one
/// timestamped line and forwarded to the sink, if any.
pub struct UpgradeLog {
    path: PathBuf,
    file: File,
    sink: Option<Box<dyn LogSink>>,
    write_failed: bool,
}

impl UpgradeLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        Ok(Self::from_file(path.to_path_buf(), file))
    }

    pub(crate) fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file,
            sink: None,
            write_failed: false,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once a line could not be written to the log file.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.record(LogLevel::Info, message.as_ref());
    }

    pub fn ok(&mut self, message: impl AsRef<str>) {
        self.record(LogLevel::Ok, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.record(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.record(LogLevel::Error, message.as_ref());
    }

    pub fn record(&mut self, level: LogLevel, message: &str) {
        let line = format_log_line(&Local::now(), level, message);
        let written = writeln!(self.file, "{line}").and_then(|()| self.file.flush());
        if let Err(err) = written {
            // Losing the file must not stop the upgrade; say so once.
            if !self.write_failed {
                self.write_failed = true;
                eprintln!(
                    "failed to write log file {}: {err}; continuing without it",
                    self.path.display()
                );
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.emit(level, message);
        }
    }
}

pub fn format_log_line(timestamp: &DateTime<Local>, level: LogLevel, message: &str) -> String {
    let single_line = message.replace(['\r', '\n'], " ");
    format!(
        "{} [{}] {}",
        timestamp.format(TIMESTAMP_FORMAT),
        level.as_str(),
        single_line
    )
}

pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
