//! Append-only JSONL audit logging with graceful degradation.

pub mod jsonl;
