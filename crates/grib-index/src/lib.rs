//! GRIB2 inventory (`.idx`) parsing.
//!
//! An inventory lists every message of a GRIB2 file with its starting byte
//! offset. This crate turns that text into [`IndexRecord`]s with resolved
//! byte ranges, and selects the one message a reference manifest needs.

pub mod error;
pub mod parser;
pub mod record;
pub mod selector;

pub use error::IndexError;
pub use parser::parse_index;
pub use record::{ByteLength, IndexRecord};
pub use selector::MessageSelector;
