//! Recursive tree destruction: shred every regular file under a root, then
//! remove the emptied directory structure bottom-up.
//!
//! Post-order contract: every file in a directory is shredded and every
//! subdirectory fully processed before that directory's removal is attempted;
//! the root goes last. Each entry is visited exactly once and ends terminal —
//! destroyed, or recorded as a failure in the outcome ledger. Per-entry
//! failures never abort sibling processing.
//!
//! Symlinks are never followed for recursion. A link to a regular file has
//! its target destroyed (then the link entry is unlinked so the parent can be
//! removed); a link to a directory, or a dangling link, is recorded as a
//! failed entry and left in place.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use parking_lot::Mutex;
use rand::RngCore;

use crate::core::config::ShredConfig;
use crate::core::errors::{FshError, Result};
use crate::logger::jsonl::{AuditEvent, AuditLogger, AuditRecord, Severity};
use crate::shred::shredder::{ShredReport, Shredder};

/// A single failed entry recorded during a tree operation.
#[derive(Debug, Clone)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error_code: String,
    pub error: String,
    pub recoverable: bool,
}

impl EntryFailure {
    fn new(path: &Path, err: &FshError) -> Self {
        Self {
            path: path.to_path_buf(),
            error_code: err.code().to_string(),
            error: err.to_string(),
            recoverable: err.is_retryable(),
        }
    }
}

/// Aggregate result of one tree destruction.
#[derive(Debug, Clone, Default)]
pub struct DirectoryOutcome {
    pub files_shredded: usize,
    pub files_failed: usize,
    /// Removed directories, the root included when its removal succeeded.
    pub directories_removed: usize,
    pub directories_failed: usize,
    pub bytes_shredded: u64,
    pub root_removed: bool,
    pub failures: Vec<EntryFailure>,
    pub duration: Duration,
}

impl DirectoryOutcome {
    /// Whether every entry, the root included, was destroyed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.files_failed == 0 && self.directories_failed == 0 && self.root_removed
    }
}

/// Applies the shredder to every regular file under a directory, then removes
/// the directory structure itself.
pub struct TreeDestroyer {
    shred_config: ShredConfig,
    parallelism: usize,
    logger: Option<Arc<Mutex<AuditLogger>>>,
}

impl TreeDestroyer {
    #[must_use]
    pub fn new(shred_config: ShredConfig) -> Self {
        Self {
            shred_config,
            parallelism: 1,
            logger: None,
        }
    }

    /// Worker threads for the cross-file shred phase. Passes within one file
    /// stay strictly sequential regardless.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Attach a shared audit logger for per-file and aggregate events.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<Mutex<AuditLogger>>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Destroy every file under `root`, then the directories, then `root`.
    pub fn destroy_tree(&self, root: &Path) -> Result<DirectoryOutcome> {
        let start = Instant::now();

        let meta = fs::symlink_metadata(root).map_err(|e| FshError::from_io(root, "stat", e))?;
        if meta.file_type().is_symlink() || !meta.is_dir() {
            return Err(FshError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut outcome = DirectoryOutcome::default();

        // Phase 1: discover. `dirs` ends up deepest-first, so the removal
        // phase below is post-order by construction.
        let mut files: Vec<PathBuf> = Vec::new();
        let mut dirs: Vec<PathBuf> = Vec::new();
        discover(root, &mut files, &mut dirs, &mut outcome.failures);

        // Phase 2: shred all files, optionally fanned out across workers.
        if self.parallelism > 1 && files.len() > 1 {
            self.shred_parallel(&files, &mut outcome);
        } else {
            let mut shredder = Shredder::new(self.shred_config.clone());
            for path in &files {
                let result = shred_entry(&mut shredder, path);
                self.absorb_file_result(path, result, &mut outcome);
            }
        }

        // Phase 3: remove directories, children before parents, root last.
        for dir in &dirs {
            self.remove_dir_entry(dir, &mut outcome);
        }
        match fs::remove_dir(root) {
            Ok(()) => {
                outcome.directories_removed += 1;
                outcome.root_removed = true;
            }
            Err(e) => {
                outcome.directories_failed += 1;
                let err = classify_rmdir(root, e);
                outcome.failures.push(EntryFailure::new(root, &err));
            }
        }

        outcome.duration = start.elapsed();
        self.log_tree(root, &outcome);
        Ok(outcome)
    }

    fn shred_parallel(&self, files: &[PathBuf], outcome: &mut DirectoryOutcome) {
        let workers = self.parallelism.min(files.len());
        let (work_tx, work_rx) = channel::bounded::<PathBuf>(1024);
        let (result_tx, result_rx) = channel::unbounded::<(PathBuf, Result<ShredReport>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let config = self.shred_config.clone();
                scope.spawn(move || {
                    // One shredder (and one RNG) per worker; a file's pass
                    // sequence never crosses threads.
                    let mut shredder = Shredder::new(config);
                    while let Ok(path) = work_rx.recv() {
                        let result = shred_entry(&mut shredder, &path);
                        let _ = result_tx.send((path, result));
                    }
                });
            }
            drop(work_rx);
            drop(result_tx);

            for path in files {
                let _ = work_tx.send(path.clone());
            }
            drop(work_tx);

            for (path, result) in result_rx {
                self.absorb_file_result(&path, result, outcome);
            }
        });
    }

    fn absorb_file_result(
        &self,
        path: &Path,
        result: Result<ShredReport>,
        outcome: &mut DirectoryOutcome,
    ) {
        match result {
            Ok(report) => {
                outcome.files_shredded += 1;
                outcome.bytes_shredded += report.bytes;
                self.log_file_shredded(&report);
            }
            Err(err) => {
                outcome.files_failed += 1;
                self.log_file_failed(path, &err);
                outcome.failures.push(EntryFailure::new(path, &err));
            }
        }
    }

    fn remove_dir_entry(&self, dir: &Path, outcome: &mut DirectoryOutcome) {
        match fs::remove_dir(dir) {
            Ok(()) => outcome.directories_removed += 1,
            Err(e) => {
                outcome.directories_failed += 1;
                let err = classify_rmdir(dir, e);
                outcome.failures.push(EntryFailure::new(dir, &err));
            }
        }
    }

    // ──────────────────── audit events ────────────────────

    fn log_file_shredded(&self, report: &ShredReport) {
        if let Some(logger) = &self.logger {
            let mut record = AuditRecord::new(AuditEvent::FileShredded, Severity::Info);
            record.path = Some(report.resolved.to_string_lossy().to_string());
            record.size = Some(report.bytes);
            record.passes = Some(report.passes);
            record.duration_ms = Some(u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX));
            logger.lock().record(&record);
        }
    }

    fn log_file_failed(&self, path: &Path, err: &FshError) {
        if let Some(logger) = &self.logger {
            let mut record = AuditRecord::new(AuditEvent::FileShredFailed, Severity::Warning);
            record.path = Some(path.to_string_lossy().to_string());
            record.error_code = Some(err.code().to_string());
            record.error_message = Some(err.to_string());
            logger.lock().record(&record);
        }
    }

    fn log_tree(&self, root: &Path, outcome: &DirectoryOutcome) {
        if let Some(logger) = &self.logger {
            let severity = if outcome.is_complete() {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut record = AuditRecord::new(AuditEvent::TreeDestroyed, severity);
            record.path = Some(root.to_string_lossy().to_string());
            record.size = Some(outcome.bytes_shredded);
            record.files_shredded = Some(outcome.files_shredded);
            record.files_failed = Some(outcome.files_failed);
            record.directories_removed = Some(outcome.directories_removed);
            record.duration_ms =
                Some(u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX));
            logger.lock().record(&record);
        }
    }
}

/// Recursively enumerate `dir`. Subdirectories are appended to `dirs` after
/// their own contents, which yields the deepest-first removal order. Symlinks
/// land in `files` as leaf entries regardless of target.
fn discover(
    dir: &Path,
    files: &mut Vec<PathBuf>,
    dirs: &mut Vec<PathBuf>,
    failures: &mut Vec<EntryFailure>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            let err = FshError::from_io(dir, "read_dir", e);
            failures.push(EntryFailure::new(dir, &err));
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() && !file_type.is_symlink() {
            discover(&path, files, dirs, failures);
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
}

/// Shred one discovered entry, including the symlink leaf rules.
fn shred_entry<R: RngCore>(shredder: &mut Shredder<R>, path: &Path) -> Result<ShredReport> {
    let meta = fs::symlink_metadata(path).map_err(|e| FshError::from_io(path, "stat", e))?;
    if meta.file_type().is_symlink() {
        // Dangling links surface NotFound here; directory targets are refused.
        let target = fs::metadata(path).map_err(|e| FshError::from_io(path, "resolve", e))?;
        if target.is_dir() {
            return Err(FshError::NotARegularFile {
                path: path.to_path_buf(),
            });
        }
        let report = shredder.shred(path)?;
        // Clear the link entry itself so the parent directory can be removed.
        fs::remove_file(path).map_err(|e| FshError::from_io(path, "unlink", e))?;
        return Ok(report);
    }
    shredder.shred(path)
}

fn classify_rmdir(path: &Path, source: std::io::Error) -> FshError {
    if source.kind() == ErrorKind::DirectoryNotEmpty {
        FshError::DirectoryNotEmpty {
            path: path.to_path_buf(),
        }
    } else {
        FshError::from_io(path, "remove_dir", source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LoggingConfig;

    fn destroyer() -> TreeDestroyer {
        TreeDestroyer::new(ShredConfig::default())
    }

    #[test]
    fn file_plus_empty_subdir_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("victim");
        fs::create_dir_all(root.join("empty_sub")).unwrap();
        fs::write(root.join("doc.txt"), b"sensitive").unwrap();

        let outcome = destroyer().destroy_tree(&root).unwrap();
        assert_eq!(outcome.files_shredded, 1);
        assert_eq!(outcome.files_failed, 0);
        assert_eq!(outcome.directories_removed, 2); // empty_sub + root
        assert!(outcome.root_removed);
        assert!(outcome.is_complete());
        assert!(!root.exists());
    }

    #[test]
    fn nested_tree_is_fully_destroyed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("deep");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("a/d")).unwrap();
        fs::write(root.join("top.bin"), vec![1u8; 512]).unwrap();
        fs::write(root.join("a/mid.bin"), vec![2u8; 256]).unwrap();
        fs::write(root.join("a/b/c/leaf.bin"), vec![3u8; 128]).unwrap();

        let outcome = destroyer().destroy_tree(&root).unwrap();
        assert_eq!(outcome.files_shredded, 3);
        assert_eq!(outcome.directories_removed, 5); // a, b, c, d + root
        assert_eq!(outcome.bytes_shredded, 512 + 256 + 128);
        assert!(outcome.is_complete());
        assert!(!root.exists());
    }

    #[test]
    fn parallel_destruction_matches_sequential_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("wide");
        fs::create_dir_all(&root).unwrap();
        for i in 0..12 {
            fs::write(root.join(format!("f{i}.dat")), vec![i as u8; 64]).unwrap();
        }

        let outcome = destroyer()
            .with_parallelism(4)
            .destroy_tree(&root)
            .unwrap();
        assert_eq!(outcome.files_shredded, 12);
        assert_eq!(outcome.files_failed, 0);
        assert!(outcome.root_removed);
        assert!(!root.exists());
    }

    #[test]
    fn parallelism_larger_than_file_count_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tiny");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("one.txt"), b"x").unwrap();
        fs::write(root.join("two.txt"), b"y").unwrap();

        let outcome = destroyer()
            .with_parallelism(16)
            .destroy_tree(&root)
            .unwrap();
        assert_eq!(outcome.files_shredded, 2);
        assert!(outcome.root_removed);
    }

    #[test]
    fn nonexistent_root_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = destroyer()
            .destroy_tree(&tmp.path().join("ghost"))
            .unwrap_err();
        assert_eq!(err.code(), "FSH-2001");
    }

    #[test]
    fn file_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, b"not a dir").unwrap();

        let err = destroyer().destroy_tree(&file).unwrap_err();
        assert_eq!(err.code(), "FSH-2003");
        assert!(file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_directory_is_recorded_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("survivor.txt"), b"keep me").unwrap();

        let root = tmp.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("doomed.txt"), b"gone").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();

        let outcome = destroyer().destroy_tree(&root).unwrap();
        // The regular file is shredded despite the failed link entry.
        assert_eq!(outcome.files_shredded, 1);
        assert_eq!(outcome.files_failed, 1);
        // The dangling entry keeps the root from being removed.
        assert!(!outcome.root_removed);
        assert!(outcome.directories_failed >= 1);
        // Nothing beyond the link was touched.
        assert!(outside.join("survivor.txt").exists());
        assert!(
            outcome
                .failures
                .iter()
                .any(|f| f.error_code == "FSH-2002" || f.error_code == "FSH-2004")
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_file_destroys_target_and_clears_link() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target.dat");
        fs::write(&target, b"linked secret").unwrap();

        let root = tmp.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&target, root.join("link")).unwrap();

        let outcome = destroyer().destroy_tree(&root).unwrap();
        assert_eq!(outcome.files_shredded, 1);
        assert!(!target.exists(), "link target must be destroyed");
        assert!(outcome.root_removed, "cleared link entry allows removal");
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_a_recorded_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("never-existed"), root.join("dangling"))
            .unwrap();

        let outcome = destroyer().destroy_tree(&root).unwrap();
        assert_eq!(outcome.files_failed, 1);
        assert!(outcome.failures.iter().any(|f| f.error_code == "FSH-2001"));
        assert!(!outcome.root_removed);
    }

    #[test]
    fn audit_logger_receives_per_file_and_tree_events() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("audit.jsonl");
        let logger = Arc::new(Mutex::new(AuditLogger::open(LoggingConfig {
            enabled: true,
            path: log_path.clone(),
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 1,
            fsync_interval_secs: 60,
        })));

        let root = tmp.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();

        let outcome = destroyer()
            .with_logger(Arc::clone(&logger))
            .destroy_tree(&root)
            .unwrap();
        assert!(outcome.is_complete());
        logger.lock().flush();

        let contents = fs::read_to_string(&log_path).unwrap();
        let events: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            events
                .iter()
                .filter(|e| e["event"] == "file_shredded")
                .count(),
            2
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| e["event"] == "tree_destroyed")
                .count(),
            1
        );
    }
}
