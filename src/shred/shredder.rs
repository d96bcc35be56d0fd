//! Per-file destruction: multi-pass overwrite, truncate, rename obfuscation,
//! unlink.
//!
//! Protocol per file: resolve symlinks, overwrite the full length once per
//! planned pass with a durable flush between passes, truncate to zero, rename
//! to randomized names a fixed number of rounds, then unlink. Content is
//! unrecoverable after the first flushed pass; everything later is directory-
//! entry hygiene.
//!
//! A failed flush aborts immediately — there are no retries across passes and
//! a partially processed file is an accepted outcome. Rename rounds are the
//! exception: each round retries with a fresh random name up to a small bound
//! before surfacing an error.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::rngs::ThreadRng;
use rand::{Rng, RngCore};

use crate::core::config::ShredConfig;
use crate::core::errors::{FshError, Result};
use crate::shred::pattern::{PassPattern, pattern_plan};

/// Write granularity for overwrite passes.
const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Length of each randomized rename target, drawn from `[A-Za-z0-9]`.
const RANDOM_NAME_LEN: usize = 16;

/// Callback invoked at the start of each overwrite pass:
/// `(resolved_path, pass_number, total_passes, pattern)`.
pub type PassObserver = Box<dyn Fn(&Path, usize, usize, PassPattern) + Send>;

/// Outcome of one successful shred.
#[derive(Debug, Clone)]
pub struct ShredReport {
    /// Path as supplied by the caller.
    pub path: PathBuf,
    /// Resolved target actually destroyed (differs for symlinks).
    pub resolved: PathBuf,
    /// File size at the start of the first pass.
    pub bytes: u64,
    /// Total durable overwrite passes, including the mandatory final random one.
    pub passes: usize,
    /// Rename rounds performed before the unlink.
    pub renames: u32,
    pub duration: Duration,
}

/// Destroys one regular file's content irrecoverably, then removes its name
/// from the directory.
///
/// The random-byte source is an explicit dependency so tests can inject a
/// seeded [`rand::rngs::StdRng`].
pub struct Shredder<R: RngCore = ThreadRng> {
    config: ShredConfig,
    rng: R,
    observer: Option<PassObserver>,
}

impl Shredder<ThreadRng> {
    /// Shredder backed by the thread-local RNG.
    #[must_use]
    pub fn new(config: ShredConfig) -> Self {
        Self::with_rng(config, rand::rng())
    }
}

impl<R: RngCore> Shredder<R> {
    /// Shredder with an explicit random-byte source.
    #[must_use]
    pub fn with_rng(config: ShredConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            observer: None,
        }
    }

    /// Attach a per-pass progress callback.
    #[must_use]
    pub fn with_observer(mut self, observer: PassObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ShredConfig {
        &self.config
    }

    /// Destroy one regular file.
    ///
    /// Symbolic links are resolved first; the target's content is destroyed,
    /// not the link itself. A nonexistent path returns [`FshError::NotFound`]
    /// without touching the filesystem.
    pub fn shred(&mut self, path: &Path) -> Result<ShredReport> {
        let start = Instant::now();

        let meta = fs::symlink_metadata(path).map_err(|e| FshError::from_io(path, "stat", e))?;
        let resolved = if meta.file_type().is_symlink() {
            fs::canonicalize(path).map_err(|e| FshError::from_io(path, "resolve", e))?
        } else {
            path.to_path_buf()
        };

        let target_meta =
            fs::metadata(&resolved).map_err(|e| FshError::from_io(&resolved, "stat", e))?;
        if !target_meta.is_file() {
            return Err(FshError::NotARegularFile { path: resolved });
        }
        let initial_len = target_meta.len();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&resolved)
            .map_err(|e| FshError::from_io(&resolved, "open", e))?;

        let plan = pattern_plan(&self.config.patterns, self.config.passes);
        let total = plan.len();

        // One buffer for all passes; per-pass length comes from a fresh stat so
        // the stream always covers the file's current on-disk size.
        let chunk_len = usize::try_from(initial_len.min(CHUNK_SIZE as u64))
            .unwrap_or(CHUNK_SIZE)
            .max(1);
        let mut chunk = vec![0u8; chunk_len];

        for (i, pattern) in plan.iter().enumerate() {
            if let Some(observer) = &self.observer {
                observer(&resolved, i + 1, total, *pattern);
            }
            let len = file
                .metadata()
                .map_err(|e| FshError::from_io(&resolved, "stat", e))?
                .len();
            Self::overwrite_pass(&mut file, &resolved, *pattern, len, &mut chunk, &mut self.rng)?;
        }

        // Hide the prior length from the directory entry before the renames.
        file.set_len(0)
            .map_err(|e| FshError::from_io(&resolved, "truncate", e))?;
        file.sync_all()
            .map_err(|e| FshError::from_io(&resolved, "flush", e))?;
        drop(file);

        let renames = self.obscure_and_unlink(&resolved)?;

        Ok(ShredReport {
            path: path.to_path_buf(),
            resolved,
            bytes: initial_len,
            passes: total,
            renames,
            duration: start.elapsed(),
        })
    }

    /// Write `len` bytes of `pattern` from offset 0, then flush durably.
    fn overwrite_pass(
        file: &mut File,
        path: &Path,
        pattern: PassPattern,
        len: u64,
        chunk: &mut [u8],
        rng: &mut R,
    ) -> Result<()> {
        file.seek(SeekFrom::Start(0))
            .map_err(|e| FshError::from_io(path, "overwrite", e))?;

        let mut remaining = len;
        while remaining > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let n = remaining.min(chunk.len() as u64) as usize;
            pattern.fill(&mut chunk[..n], rng);
            file.write_all(&chunk[..n])
                .map_err(|e| FshError::from_io(path, "overwrite", e))?;
            remaining -= n as u64;
        }

        // Durable flush: the pass is not done until storage acknowledges it.
        file.sync_all()
            .map_err(|e| FshError::from_io(path, "flush", e))
    }

    /// Rename through `rename_rounds` random names, then unlink the last one.
    fn obscure_and_unlink(&mut self, resolved: &Path) -> Result<u32> {
        let dir = resolved
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let mut current = resolved.to_path_buf();
        for _ in 0..self.config.rename_rounds {
            current = self.rename_round(&current, &dir)?;
            if self.config.fsync_directory {
                sync_dir(&dir)?;
            }
        }

        fs::remove_file(&current).map_err(|e| FshError::from_io(&current, "unlink", e))?;
        if self.config.fsync_directory {
            sync_dir(&dir)?;
        }
        Ok(self.config.rename_rounds)
    }

    /// One rename round: fresh random names until one sticks or the retry
    /// bound is exhausted. An existing entry under the candidate name counts
    /// as a failed attempt.
    fn rename_round(&mut self, current: &Path, dir: &Path) -> Result<PathBuf> {
        let limit = self.config.rename_retry_limit;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let candidate = dir.join(random_name(&mut self.rng));

            if candidate.symlink_metadata().is_ok() {
                if attempts >= limit {
                    return Err(FshError::RenameExhausted {
                        path: current.to_path_buf(),
                        attempts,
                    });
                }
                continue;
            }

            match fs::rename(current, &candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if attempts >= limit => {
                    return Err(FshError::from_io(current, "rename", e));
                }
                Err(_) => {}
            }
        }
    }
}

/// Generate a 16-character alphanumeric name for rename obfuscation.
pub(crate) fn random_name(rng: &mut impl RngCore) -> String {
    std::iter::repeat_with(|| rng.sample(rand::distr::Alphanumeric))
        .take(RANDOM_NAME_LEN)
        .map(char::from)
        .collect()
}

/// Flush directory-entry metadata to stable storage (Unix).
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let handle = File::open(dir).map_err(|e| FshError::from_io(dir, "open_dir", e))?;
    handle
        .sync_all()
        .map_err(|e| FshError::from_io(dir, "fsync_dir", e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
