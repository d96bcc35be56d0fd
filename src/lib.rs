//! file_shredder — secure destruction of files and directory trees.
//!
//! The core protocol overwrites a file's contents with multiple durable
//! passes (a configured cycle of zeros, ones, and random data, plus one
//! mandatory final random pass), truncates it, renames it several times to
//! scrub the original name from directory entries, and finally unlinks it.
//! [`shred::tree::TreeDestroyer`] applies the same protocol post-order to a
//! whole directory tree with per-entry failure isolation.
//!
//! The crate is usable as a library; the `cli` feature adds the `fshred`
//! binary on top.

#![forbid(unsafe_code)]

pub mod core;
pub mod logger;
pub mod prelude;
pub mod shred;
