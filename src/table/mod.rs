//! Canonical table assembly.

pub mod merge;

pub use merge::*;
