//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FshError, Result};
use crate::shred::pattern::{DEFAULT_CYCLE, PassPattern};

/// Full fshred configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub shred: ShredConfig,
    pub tree: TreeConfig,
    pub logging: LoggingConfig,
}

/// Per-file destruction protocol knobs.
///
/// Immutable once a shred begins; the pattern cycle is consulted per pass as
/// `patterns[i % len]`, and one mandatory random pass is appended on top of
/// `passes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShredConfig {
    /// Configured overwrite passes (the mandatory final random pass is extra).
    pub passes: usize,
    /// Ordered pattern cycle for the configured passes.
    pub patterns: Vec<PassPattern>,
    /// Randomized renames applied before the final unlink.
    pub rename_rounds: u32,
    /// Fresh-name attempts per rename round before giving up.
    pub rename_retry_limit: u32,
    /// Fsync the containing directory after each rename and the unlink (Unix).
    ///
    /// The rename obfuscation is only crash-durable if the directory entry
    /// updates reach disk; without this a crash can resurrect the last
    /// pre-rename name.
    pub fsync_directory: bool,
}

impl Default for ShredConfig {
    fn default() -> Self {
        Self {
            passes: 3,
            patterns: DEFAULT_CYCLE.to_vec(),
            rename_rounds: 3,
            rename_retry_limit: 8,
            fsync_directory: true,
        }
    }
}

/// Tree destruction knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Worker threads for the cross-file shred phase. 1 = fully sequential.
    /// The per-file pass sequence is never parallelized.
    pub parallelism: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

/// Audit log destination and rotation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Primary JSONL audit log path.
    pub path: PathBuf,
    /// Optional fallback path when the primary is unwritable.
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation (bytes).
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls on the log.
    pub fsync_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[FSH-CONFIG] WARNING: HOME not set, falling back to /tmp for log paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            enabled: true,
            path: home_dir
                .join(".local")
                .join("share")
                .join("fshred")
                .join("activity.jsonl"),
            fallback_path: Some(PathBuf::from("/tmp/fshred-activity.jsonl")),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

impl Config {
    /// Default configuration path (`~/.config/fshred/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home_dir.join(".config").join("fshred").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| FshError::from_io(&path_buf, "read_config", source))?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FshError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the destruction protocol cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.shred.passes == 0 {
            return Err(invalid("shred.passes must be >= 1"));
        }
        if self.shred.patterns.is_empty() {
            return Err(invalid("shred.patterns must not be empty"));
        }
        if self.shred.rename_rounds == 0 {
            return Err(invalid("shred.rename_rounds must be >= 1"));
        }
        if self.shred.rename_retry_limit == 0 {
            return Err(invalid("shred.rename_retry_limit must be >= 1"));
        }
        if self.tree.parallelism == 0 {
            return Err(invalid("tree.parallelism must be >= 1"));
        }
        if self.logging.max_size_bytes == 0 {
            return Err(invalid("logging.max_size_bytes must be > 0"));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_usize("FSHRED_PASSES", &mut self.shred.passes)?;
        set_env_u32("FSHRED_RENAME_ROUNDS", &mut self.shred.rename_rounds)?;
        set_env_bool("FSHRED_FSYNC_DIRECTORY", &mut self.shred.fsync_directory)?;
        set_env_usize("FSHRED_PARALLELISM", &mut self.tree.parallelism)?;
        set_env_bool("FSHRED_LOG_ENABLED", &mut self.logging.enabled)?;
        if let Some(raw) = env::var_os("FSHRED_LOG_PATH") {
            self.logging.path = PathBuf::from(raw);
        }
        Ok(())
    }
}

fn invalid(details: &str) -> FshError {
    FshError::InvalidConfig {
        details: details.to_string(),
    }
}

fn set_env_usize(key: &'static str, target: &mut usize) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| FshError::InvalidConfig {
            details: format!("{key} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_u32(key: &'static str, target: &mut u32) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| FshError::InvalidConfig {
            details: format!("{key} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_bool(key: &'static str, target: &mut bool) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = match raw.as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                return Err(FshError::InvalidConfig {
                    details: format!("{key} must be a boolean, got {other:?}"),
                });
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.shred.passes, 3);
        assert_eq!(cfg.shred.patterns, DEFAULT_CYCLE.to_vec());
        assert_eq!(cfg.shred.rename_rounds, 3);
        assert_eq!(cfg.tree.parallelism, 1);
    }

    #[test]
    fn zero_passes_is_rejected() {
        let mut cfg = Config::default();
        cfg.shred.passes = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "FSH-1001");
    }

    #[test]
    fn empty_pattern_cycle_is_rejected() {
        let mut cfg = Config::default();
        cfg.shred.patterns.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut cfg = Config::default();
        cfg.tree.parallelism = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert_eq!(err.code(), "FSH-1002");
    }

    #[test]
    fn load_parses_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[shred]\npasses = 7\npatterns = [\"random\"]\n\n[tree]\nparallelism = 4\n",
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.shred.passes, 7);
        assert_eq!(cfg.shred.patterns, vec![PassPattern::Random]);
        assert_eq!(cfg.tree.parallelism, 4);
        // Untouched sections keep defaults.
        assert_eq!(cfg.shred.rename_rounds, 3);
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn load_rejects_invalid_toml_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[shred]\npasses = 0\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "FSH-1001");
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "= not toml").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "FSH-1003");
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let cfg = Config::default();
        let raw = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert_eq!(cfg, back);
    }
}
