//! Input/output helpers.
//!
//! - output rendering and writing (`export`)
//! - merged-table read-back (`merged`)

pub mod export;
pub mod merged;

pub use export::*;
pub use merged::*;
