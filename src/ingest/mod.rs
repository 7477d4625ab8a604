//! Source extraction: raw StatFin exports → one `MetricSeries` per metric.
//!
//! - decoding + header discovery (`raw`)
//! - declarative per-source matching rules (`rules`)
//! - the generic extract-and-aggregate routine (`extract`)

pub mod extract;
pub mod raw;
pub mod rules;

pub use extract::*;
pub use raw::*;
pub use rules::*;
