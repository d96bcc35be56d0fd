//! JSONL audit log: one self-contained JSON object per destructive action.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent tail never sees a partial record. Logging must never fail a
//! shred, so write failures degrade through a chain instead of erroring:
//! primary file, then fallback file, then stderr with an `[FSH-AUDIT]`
//! prefix, then silent discard.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{FshError, Result};

/// Severity level for audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Audit event types for the destruction protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    FileShredded,
    FileShredFailed,
    TreeDestroyed,
    Error,
}

/// A single audit record — optional fields are omitted from the JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: AuditEvent,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Bytes overwritten (file) or total bytes destroyed (tree).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Durable overwrite passes performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_shredded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directories_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditRecord {
    /// New record stamped with the current UTC time.
    #[must_use]
    pub fn new(event: AuditEvent, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            path: None,
            size: None,
            passes: None,
            duration_ms: None,
            files_shredded: None,
            files_failed: None,
            directories_removed: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Where writes currently land in the degradation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Append-only audit writer with rotation and multi-level fallback.
pub struct AuditLogger {
    config: LoggingConfig,
    writer: Option<BufWriter<File>>,
    sink: Sink,
    bytes_written: u64,
    last_fsync: SystemTime,
}

impl AuditLogger {
    /// Open the audit log, falling through the degradation chain on failure.
    #[must_use]
    pub fn open(config: LoggingConfig) -> Self {
        let mut logger = Self {
            config,
            writer: None,
            sink: Sink::Discard,
            bytes_written: 0,
            last_fsync: SystemTime::now(),
        };
        match open_append(&logger.config.path) {
            Ok((file, size)) => {
                logger.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                logger.sink = Sink::Primary;
                logger.bytes_written = size;
            }
            Err(_) => logger.fall_back(),
        }
        logger
    }

    /// Write one record as a single JSONL line. Never fails.
    pub fn record(&mut self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[FSH-AUDIT] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffered lines to the OS.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Flush and fsync the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
            self.last_fsync = SystemTime::now();
        }
    }

    /// Label of the current degradation level (for status output).
    #[must_use]
    pub fn sink_label(&self) -> &'static str {
        match self.sink {
            Sink::Primary => "primary",
            Sink::Fallback => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    // ──────────────────── internals ────────────────────

    fn write_line(&mut self, line: &str) {
        if matches!(self.sink, Sink::Primary | Sink::Fallback)
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.sink {
            Sink::Primary | Sink::Fallback => {
                let write_failed = match self.writer.as_mut() {
                    Some(w) => w.write_all(line.as_bytes()).is_err(),
                    None => true,
                };
                if write_failed {
                    self.degrade();
                    self.write_line(line);
                    return;
                }
                self.bytes_written += line.len() as u64;
                self.maybe_fsync();
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[FSH-AUDIT] {line}");
            }
            Sink::Discard => {}
        }
    }

    fn maybe_fsync(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO);
        if elapsed.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    fn fall_back(&mut self) {
        if let Some(fb) = self.config.fallback_path.clone()
            && let Ok((file, size)) = open_append(&fb)
        {
            let _ = writeln!(
                io::stderr(),
                "[FSH-AUDIT] primary log unwritable, using fallback: {}",
                fb.display()
            );
            self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
            self.sink = Sink::Fallback;
            self.bytes_written = size;
            return;
        }
        self.sink = Sink::Stderr;
        let _ = writeln!(io::stderr(), "[FSH-AUDIT] no writable log path, using stderr");
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.sink {
            Sink::Primary => self.fall_back(),
            Sink::Fallback => {
                self.sink = Sink::Stderr;
                let _ = writeln!(io::stderr(), "[FSH-AUDIT] fallback write failed, using stderr");
            }
            Sink::Stderr => self.sink = Sink::Discard,
            Sink::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = match self.sink {
            Sink::Primary => self.config.path.clone(),
            Sink::Fallback => match self.config.fallback_path.clone() {
                Some(p) => p,
                None => return,
            },
            _ => return,
        };

        // Shift rotations upward, dropping the oldest: current→.1, .1→.2, ...
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

/// Open or create a file for appending. Returns `(file, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FshError::from_io(parent, "create_dir", e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FshError::from_io(path, "open", e))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Build a rotated filename: `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
