//! FSH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FshError>;

/// Top-level error type for the file shredder.
///
/// Every filesystem operation surfaces a structured variant instead of a
/// caught-and-printed exception; callers decide per failure mode whether to
/// abort or continue.
#[derive(Debug, Error)]
pub enum FshError {
    #[error("[FSH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FSH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FSH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FSH-2001] path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("[FSH-2002] not a regular file: {path}")]
    NotARegularFile { path: PathBuf },

    #[error("[FSH-2003] not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("[FSH-2004] directory not empty: {path}")]
    DirectoryNotEmpty { path: PathBuf },

    #[error("[FSH-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[FSH-3002] {step} failed at {path}: {source}")]
    Io {
        path: PathBuf,
        /// The protocol step that failed: `open`, `overwrite`, `flush`,
        /// `truncate`, `rename`, `unlink`, `read_dir`, `remove_dir`, ...
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("[FSH-3003] gave up renaming {path} after {attempts} attempts")]
    RenameExhausted { path: PathBuf, attempts: u32 },
}

impl FshError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FSH-1001",
            Self::MissingConfig { .. } => "FSH-1002",
            Self::ConfigParse { .. } => "FSH-1003",
            Self::NotFound { .. } => "FSH-2001",
            Self::NotARegularFile { .. } => "FSH-2002",
            Self::NotADirectory { .. } => "FSH-2003",
            Self::DirectoryNotEmpty { .. } => "FSH-2004",
            Self::PermissionDenied { .. } => "FSH-3001",
            Self::Io { .. } => "FSH-3002",
            Self::RenameExhausted { .. } => "FSH-3003",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::RenameExhausted { .. } | Self::DirectoryNotEmpty { .. }
        )
    }

    /// Classify an `io::Error` from a known protocol step.
    ///
    /// `NotFound` and `PermissionDenied` kinds become their dedicated
    /// variants; everything else keeps the failing step on `Io`.
    #[must_use]
    pub fn from_io(path: impl AsRef<Path>, step: &'static str, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            ErrorKind::NotFound => Self::NotFound { path },
            ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, step, source },
        }
    }
}

impl From<toml::de::Error> for FshError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
