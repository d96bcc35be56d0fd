//! Destruction protocol: overwrite patterns, the per-file shredder, and the
//! recursive tree destroyer.

pub mod pattern;
pub mod shredder;
pub mod tree;
