//! Convenience re-exports for the common library surface.

pub use crate::core::config::{Config, LoggingConfig, ShredConfig, TreeConfig};
pub use crate::core::errors::{FshError, Result};
pub use crate::logger::jsonl::{AuditEvent, AuditLogger, AuditRecord, Severity};
pub use crate::shred::pattern::{DEFAULT_CYCLE, PassPattern, pattern_plan};
pub use crate::shred::shredder::{ShredReport, Shredder};
pub use crate::shred::tree::{DirectoryOutcome, EntryFailure, TreeDestroyer};
