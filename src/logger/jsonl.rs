//! JSONL audit log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object assembled in memory and written
//! with a single `write_all`, so a tailing reader never sees a partial line.
//!
//! Fallback chain when the primary file cannot be written:
//! 1. Primary file path
//! 2. Fallback path
//! 3. stderr with `[IGD-JSONL]` prefix
//! 4. Silent discard (a scan must never fail because auditing failed)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{IgdError, Result};

/// Severity of an audit event, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Notice,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanCompleted,
    ScanSkipped,
    ScanFailed,
    FileRestored,
    FileDeleted,
    FileAccepted,
    SuppressionRemoved,
    SuppressionReset,
    ChangeNotification,
}

/// One JSONL line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogEntry {
    pub fn new(
        at: DateTime<Utc>,
        event: EventType,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            message: message.into(),
            paths: Vec::new(),
            error_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Size that triggers rotation. Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Rotated files kept as `<path>.1` .. `<path>.N`. Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Primary at `path`, falling back to the system temp directory.
    #[must_use]
    pub fn for_path(path: PathBuf) -> Self {
        Self {
            path,
            fallback_path: Some(std::env::temp_dir().join("igd-audit.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL writer with size rotation and fallback.
///
/// Lines are flushed as they are written; igd processes are short-lived.
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<File>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log. Never fails: degrades through the fallback chain instead.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        match open_append(&writer.config.path) {
            Ok((file, size)) => {
                writer.file = Some(file);
                writer.state = WriterState::Normal;
                writer.bytes_written = size;
            }
            Err(_) => writer.open_fallback(),
        }
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[IGD-JSONL] serialize error: {e}");
            }
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// File currently being appended to, if any.
    pub fn active_path(&self) -> Option<&Path> {
        match self.state {
            WriterState::Normal => Some(&self.config.path),
            WriterState::Fallback => self.config.fallback_path.as_deref(),
            WriterState::Stderr | WriterState::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.bytes_written > 0 && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                let written = self
                    .file
                    .as_mut()
                    .is_some_and(|file| file.write_all(line.as_bytes()).is_ok());
                if written {
                    self.bytes_written += len;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[IGD-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn open_fallback(&mut self) {
        self.file = None;
        let opened = self
            .config
            .fallback_path
            .as_deref()
            .and_then(|fallback| open_append(fallback).ok());
        if let Some((file, size)) = opened {
            let _ = writeln!(
                io::stderr(),
                "[IGD-JSONL] primary audit log unavailable, using fallback"
            );
            self.file = Some(file);
            self.state = WriterState::Fallback;
            self.bytes_written = size;
        } else {
            let _ = writeln!(
                io::stderr(),
                "[IGD-JSONL] audit log files unavailable, using stderr"
            );
            self.state = WriterState::Stderr;
        }
    }

    fn degrade(&mut self) {
        match self.state {
            WriterState::Normal => self.open_fallback(),
            WriterState::Fallback => {
                self.file = None;
                self.state = WriterState::Stderr;
            }
            WriterState::Stderr => self.state = WriterState::Discard,
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        let Some(base) = self.active_path().map(Path::to_path_buf) else {
            return;
        };
        self.file = None;

        // .N is dropped, .N-1 → .N, …, current → .1
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        if self.config.max_rotated_files > 0 {
            let _ = fs::rename(&base, rotated_name(&base, 1));
        } else {
            let _ = fs::remove_file(&base);
        }

        match open_append(&base) {
            Ok((file, _)) => {
                self.file = Some(file);
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

/// Read back every parseable entry of a JSONL file, oldest first.
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(IgdError::io(path, source)),
    };
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IgdError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| IgdError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `audit.jsonl` → `audit.jsonl.2`
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
