//! Common types and utilities shared across the reference builder crates.

pub mod error;
pub mod grid;
pub mod time;
pub mod variable;

pub use error::{RefError, RefResult, SlotError};
pub use grid::{CoordinateGrid, Member, SlotKey, SlotPosition};
pub use time::{ForecastWindow, WindowMode, REFORECAST_YEARS};
pub use variable::{lookup_variable, VariableSpec};
